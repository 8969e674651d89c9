//! Per-backend option schemas and validation.
//!
//! A backend declares every tunable it accepts as a fixed table of
//! (name, type, default, documentation). At instance construction the
//! caller-supplied map is validated against that table and merged with the
//! defaults into an immutable [`ResolvedOptions`]. Validation runs before
//! any backend-native allocation, so a bad option never leaks a partially
//! constructed instance.

use std::collections::BTreeMap;

use crate::error::{Result, SolverError};

/// Declared type of a tunable, including the allowed domain for
/// string-valued options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionType {
    /// Boolean flag.
    Bool,
    /// Signed integer.
    Int,
    /// Real number. Integer values supplied by the caller are promoted.
    Real,
    /// String drawn from a fixed set of allowed values.
    Enum(&'static [&'static str]),
}

impl OptionType {
    fn name(&self) -> &'static str {
        match self {
            OptionType::Bool => "bool",
            OptionType::Int => "int",
            OptionType::Real => "real",
            OptionType::Enum(_) => "enum",
        }
    }
}

/// A single option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Real number.
    Real(f64),
    /// String, for enumerated options.
    Str(String),
}

impl OptionValue {
    fn type_name(&self) -> &'static str {
        match self {
            OptionValue::Bool(_) => "bool",
            OptionValue::Int(_) => "int",
            OptionValue::Real(_) => "real",
            OptionValue::Str(_) => "string",
        }
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        OptionValue::Real(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Str(v.to_string())
    }
}

/// Caller-supplied configuration map, prior to validation.
pub type Options = BTreeMap<String, OptionValue>;

/// One row of a backend's option table.
#[derive(Debug, Clone)]
pub struct OptionSpec {
    /// Option name, unique within the schema.
    pub name: &'static str,
    /// Declared type and, for enums, allowed domain.
    pub ty: OptionType,
    /// Value used when the caller does not supply one.
    pub default: OptionValue,
    /// Documentation text, exposed through the registry.
    pub doc: &'static str,
}

/// Ordered option table declared by one backend.
#[derive(Debug, Clone, Default)]
pub struct OptionSchema {
    entries: Vec<OptionSpec>,
}

impl OptionSchema {
    /// Empty schema, for backends without tunables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one option declaration. Duplicate names are a schema bug.
    pub fn add(
        mut self,
        name: &'static str,
        ty: OptionType,
        default: impl Into<OptionValue>,
        doc: &'static str,
    ) -> Self {
        assert!(
            self.entries.iter().all(|e| e.name != name),
            "duplicate option '{}' in schema",
            name
        );
        self.entries.push(OptionSpec {
            name,
            ty,
            default: default.into(),
            doc,
        });
        self
    }

    /// All declared options, in declaration order.
    pub fn entries(&self) -> &[OptionSpec] {
        &self.entries
    }

    /// Render the schema as user-facing documentation lines.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for e in &self.entries {
            let domain = match e.ty {
                OptionType::Enum(values) => format!(" [{}]", values.join("|")),
                _ => String::new(),
            };
            out.push_str(&format!(
                "  {} ({}{}, default {:?}): {}\n",
                e.name,
                e.ty.name(),
                domain,
                e.default,
                e.doc
            ));
        }
        out
    }

    /// Validate a caller-supplied map against this schema and merge with
    /// defaults.
    ///
    /// Unknown keys and type/domain mismatches are configuration errors;
    /// nothing is allocated on the backend side before this returns.
    pub fn resolve(&self, supplied: &Options) -> Result<ResolvedOptions> {
        for (key, value) in supplied {
            let spec = self.entries.iter().find(|e| e.name == key).ok_or_else(|| {
                let known: Vec<&str> = self.entries.iter().map(|e| e.name).collect();
                SolverError::config(format!(
                    "unknown option '{}' (known options: {})",
                    key,
                    known.join(", ")
                ))
            })?;
            check_value(spec, value)?;
        }

        let mut values = BTreeMap::new();
        for spec in &self.entries {
            let value = match supplied.get(spec.name) {
                Some(v) => coerce(&spec.ty, v),
                None => spec.default.clone(),
            };
            values.insert(spec.name, value);
        }
        Ok(ResolvedOptions { values })
    }
}

fn check_value(spec: &OptionSpec, value: &OptionValue) -> Result<()> {
    let ok = match (&spec.ty, value) {
        (OptionType::Bool, OptionValue::Bool(_)) => true,
        (OptionType::Int, OptionValue::Int(_)) => true,
        (OptionType::Real, OptionValue::Real(_)) => true,
        // Integer literals are fine where a real is expected.
        (OptionType::Real, OptionValue::Int(_)) => true,
        (OptionType::Enum(domain), OptionValue::Str(s)) => {
            if domain.contains(&s.as_str()) {
                true
            } else {
                return Err(SolverError::config(format!(
                    "invalid value '{}' for option '{}' (allowed: {})",
                    s,
                    spec.name,
                    domain.join("|")
                )));
            }
        }
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(SolverError::config(format!(
            "invalid value for option '{}': expected {}, got {}",
            spec.name,
            spec.ty.name(),
            value.type_name()
        )))
    }
}

fn coerce(ty: &OptionType, value: &OptionValue) -> OptionValue {
    match (ty, value) {
        (OptionType::Real, OptionValue::Int(i)) => OptionValue::Real(*i as f64),
        _ => value.clone(),
    }
}

/// Validated, defaulted configuration bound to one solver instance.
///
/// Immutable after construction. Accessors panic on a name or type the
/// schema never declared; a backend reading an undeclared option is a bug,
/// not a data problem.
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    values: BTreeMap<&'static str, OptionValue>,
}

impl ResolvedOptions {
    /// Read a boolean option.
    pub fn bool(&self, name: &str) -> bool {
        match self.values.get(name) {
            Some(OptionValue::Bool(v)) => *v,
            other => panic!("option '{}' is not a declared bool (found {:?})", name, other),
        }
    }

    /// Read an integer option.
    pub fn int(&self, name: &str) -> i64 {
        match self.values.get(name) {
            Some(OptionValue::Int(v)) => *v,
            other => panic!("option '{}' is not a declared int (found {:?})", name, other),
        }
    }

    /// Read a real option.
    pub fn real(&self, name: &str) -> f64 {
        match self.values.get(name) {
            Some(OptionValue::Real(v)) => *v,
            other => panic!("option '{}' is not a declared real (found {:?})", name, other),
        }
    }

    /// Read an enumerated string option.
    pub fn str(&self, name: &str) -> &str {
        match self.values.get(name) {
            Some(OptionValue::Str(v)) => v,
            other => panic!("option '{}' is not a declared enum (found {:?})", name, other),
        }
    }
}
