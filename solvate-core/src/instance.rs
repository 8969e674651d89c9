//! Solver instances: the unit of ownership.
//!
//! An instance exclusively owns its resolved configuration, its workspace
//! and the backend-native state behind the capability trait. Instances are
//! independent of each other and must not be shared across concurrent
//! solves; the caller serializes access to a single instance.
//!
//! The QP instance also runs the hot-start state machine: the first solve
//! is always a cold initialization, every later solve is a warm restart
//! when the backend supports one, and `reset` discards cached state when
//! the sparsity pattern itself has changed.

use crate::backend::{Budget, LinearBackend, QpBackend, QpOutputs, QpViews};
use crate::error::{Result, SolverError};
use crate::marshal;
use crate::options::ResolvedOptions;
use crate::problem::{LinearLayout, QpLayout, Solution, SolveStatus};
use crate::sparse::SparseCsc;
use crate::status::{Classified, StatusClass};
use crate::workspace::{SlotId, Workspace, WorkspacePlan};

/// Hot-start state of a QP instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotstartState {
    /// No prior solve has produced state worth reusing.
    Virgin,
    /// At least one solve succeeded; backend-native state is cached.
    Primed,
}

fn check_undocumented(name: &str, classified: &Classified) {
    if classified.message.is_none() {
        log::warn!(
            "backend '{}' returned undocumented status code {}",
            name,
            classified.code
        );
    }
}

/// A linear-system solver instance.
///
/// Usage protocol: `factorize` with the numeric values of A (same sparsity
/// as the construction-time descriptor), then `solve` any number of
/// right-hand sides against the cached factorization. Re-`factorize` with
/// new values whenever A changes.
pub struct LinearSolver {
    name: String,
    layout: LinearLayout,
    opts: ResolvedOptions,
    ws: Workspace,
    a_slot: SlotId,
    backend: Box<dyn LinearBackend>,
    prepared: bool,
    factorized: bool,
    factorize_count: u64,
    solve_count: u64,
}

impl std::fmt::Debug for LinearSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearSolver")
            .field("name", &self.name)
            .field("layout", &self.layout)
            .field("opts", &self.opts)
            .field("a_slot", &self.a_slot)
            .field("prepared", &self.prepared)
            .field("factorized", &self.factorized)
            .field("factorize_count", &self.factorize_count)
            .field("solve_count", &self.solve_count)
            .finish_non_exhaustive()
    }
}

impl LinearSolver {
    pub(crate) fn new(
        name: String,
        layout: LinearLayout,
        opts: ResolvedOptions,
        backend: Box<dyn LinearBackend>,
    ) -> Result<Self> {
        let n = layout.n();
        let mut plan = WorkspacePlan::new();
        let a_slot = plan.slot("a_dense", n * n);
        let ws = plan.allocate()?;
        Ok(Self {
            name,
            layout,
            opts,
            ws,
            a_slot,
            backend,
            prepared: false,
            factorized: false,
            factorize_count: 0,
            solve_count: 0,
        })
    }

    /// Registry key of the backend behind this instance.
    pub fn backend_name(&self) -> &str {
        &self.name
    }

    /// System dimension n.
    pub fn n(&self) -> usize {
        self.layout.n()
    }

    /// The configuration this instance was built with.
    pub fn options(&self) -> &ResolvedOptions {
        &self.opts
    }

    /// How many times the backend factorized. Stays flat across repeated
    /// `solve` calls, which is the point of caching the factor.
    pub fn factorize_count(&self) -> u64 {
        self.factorize_count
    }

    /// How many backend solves ran.
    pub fn solve_count(&self) -> u64 {
        self.solve_count
    }

    /// Factorize the numeric values of A.
    ///
    /// A must carry exactly the sparsity declared at construction; a
    /// numerically singular A is a [`SolverError::Numerical`], after which
    /// the instance stays usable for a re-`factorize` with better values.
    pub fn factorize(&mut self, a: &SparseCsc) -> Result<()> {
        let n = self.layout.n();
        if a.rows() != n || a.cols() != n {
            return Err(SolverError::structural(format!(
                "factorize expects a {}x{} matrix, got {}x{}",
                n,
                n,
                a.rows(),
                a.cols()
            )));
        }
        if !self.prepared {
            self.backend.prepare(&self.layout, &self.opts)?;
            self.prepared = true;
        }

        marshal::densify(a, &self.layout.a, self.ws.slot_mut(self.a_slot), false);
        let raw = self.backend.factorize(self.ws.slot(self.a_slot));
        self.factorize_count += 1;

        let classified = self.backend.status_table().classify(raw);
        if classified.class == StatusClass::Success {
            self.factorized = true;
            Ok(())
        } else {
            self.factorized = false;
            check_undocumented(&self.name, &classified);
            Err(classified.into_error(&self.name))
        }
    }

    /// Solve in place against the cached factorization.
    ///
    /// `xb` holds `nrhs` right-hand sides column-major on entry and the
    /// solutions on return. Calling this before any successful
    /// [`LinearSolver::factorize`] is a structural error.
    pub fn solve_in_place(&mut self, xb: &mut [f64], nrhs: usize, transpose: bool) -> Result<()> {
        self.check_solve_ready(xb, nrhs)?;
        let raw = self.backend.solve(xb, nrhs, transpose);
        self.solve_count += 1;
        self.finish_solve(raw)
    }

    /// Solve against the triangular factor alone (`L x = b`, or
    /// `L^T x = b` with `transpose`). Only available when the backend
    /// exposes a Cholesky factor.
    pub fn solve_cholesky_in_place(
        &mut self,
        xb: &mut [f64],
        nrhs: usize,
        transpose: bool,
    ) -> Result<()> {
        if !self.backend.provides_cholesky() {
            return Err(SolverError::config(format!(
                "backend '{}' does not expose a triangular factor",
                self.name
            )));
        }
        self.check_solve_ready(xb, nrhs)?;
        let raw = self.backend.solve_cholesky(xb, nrhs, transpose);
        self.solve_count += 1;
        self.finish_solve(raw)
    }

    fn check_solve_ready(&self, xb: &[f64], nrhs: usize) -> Result<()> {
        if !self.factorized {
            return Err(SolverError::structural(
                "solve called before factorize".to_string(),
            ));
        }
        if xb.len() != self.layout.n() * nrhs {
            return Err(SolverError::structural(format!(
                "right-hand side has length {}, expected {} for {} columns",
                xb.len(),
                self.layout.n() * nrhs,
                nrhs
            )));
        }
        Ok(())
    }

    fn finish_solve(&mut self, raw: i32) -> Result<()> {
        let classified = self.backend.status_table().classify(raw);
        if classified.class == StatusClass::Success {
            Ok(())
        } else {
            check_undocumented(&self.name, &classified);
            Err(classified.into_error(&self.name))
        }
    }
}

/// Numeric inputs for one QP solve.
///
/// H and A must carry exactly the sparsity declared at construction; only
/// their values may change between solves.
#[derive(Debug, Clone, Copy)]
pub struct QpInputs<'a> {
    /// Hessian values, upper-triangle CSC matching the layout.
    pub h: &'a SparseCsc,
    /// Gradient, length n.
    pub g: &'a [f64],
    /// Constraint matrix values, CSC matching the layout.
    pub a: &'a SparseCsc,
    /// Variable bounds, length n each.
    pub lbx: &'a [f64],
    /// Variable upper bounds, length n.
    pub ubx: &'a [f64],
    /// Constraint bounds, length m each.
    pub lba: &'a [f64],
    /// Constraint upper bounds, length m.
    pub uba: &'a [f64],
}

struct QpSlots {
    h: SlotId,
    a: SlotId,
    g: SlotId,
    lbx: SlotId,
    ubx: SlotId,
    lba: SlotId,
    uba: SlotId,
    dual: SlotId,
}

/// A QP solver instance with hot-start across solves.
pub struct QpSolver {
    name: String,
    layout: QpLayout,
    opts: ResolvedOptions,
    ws: Workspace,
    slots: QpSlots,
    backend: Box<dyn QpBackend>,
    prepared: bool,
    state: HotstartState,
    cold_starts: u64,
    warm_starts: u64,
}

impl QpSolver {
    pub(crate) fn new(
        name: String,
        layout: QpLayout,
        opts: ResolvedOptions,
        backend: Box<dyn QpBackend>,
    ) -> Result<Self> {
        let n = layout.n();
        let m = layout.m();
        let mut plan = WorkspacePlan::new();
        let slots = QpSlots {
            h: plan.slot("h_dense", n * n),
            a: plan.slot("a_dense", n * m),
            g: plan.slot("g", n),
            lbx: plan.slot("lbx", n),
            ubx: plan.slot("ubx", n),
            lba: plan.slot("lba", m),
            uba: plan.slot("uba", m),
            dual: plan.slot("dual", n + m),
        };
        let ws = plan.allocate()?;
        Ok(Self {
            name,
            layout,
            opts,
            ws,
            slots,
            backend,
            prepared: false,
            state: HotstartState::Virgin,
            cold_starts: 0,
            warm_starts: 0,
        })
    }

    /// Registry key of the backend behind this instance.
    pub fn backend_name(&self) -> &str {
        &self.name
    }

    /// Number of variables.
    pub fn n(&self) -> usize {
        self.layout.n()
    }

    /// Number of linear constraints.
    pub fn m(&self) -> usize {
        self.layout.m()
    }

    /// The configuration this instance was built with.
    pub fn options(&self) -> &ResolvedOptions {
        &self.opts
    }

    /// Current hot-start state.
    pub fn hotstart_state(&self) -> HotstartState {
        self.state
    }

    /// Cold initializations performed so far.
    pub fn cold_starts(&self) -> u64 {
        self.cold_starts
    }

    /// Warm restarts performed so far.
    pub fn warm_starts(&self) -> u64 {
        self.warm_starts
    }

    /// Discard cached backend-native state, forcing the next solve to
    /// cold-initialize. Use when the sparsity pattern itself changed and a
    /// fresh instance is about to be constructed, or when cached state is
    /// suspect.
    pub fn reset(&mut self) {
        log::debug!("qp instance '{}': reset to virgin", self.name);
        self.backend.reset();
        self.state = HotstartState::Virgin;
    }

    /// Solve, allocating a full [`Solution`].
    pub fn solve(&mut self, inputs: &QpInputs<'_>, budget: &Budget) -> Result<Solution> {
        let n = self.layout.n();
        let m = self.layout.m();
        let mut x = vec![0.0; n];
        let mut lam = vec![0.0; n + m];
        let mut cost = 0.0;
        let status = self.solve_into(
            inputs,
            budget,
            QpOutputs {
                x: Some(&mut x),
                lam: Some(&mut lam),
                cost: Some(&mut cost),
            },
        )?;
        Ok(Solution {
            status,
            x,
            lam,
            cost,
            iters: self.backend.iterations(),
        })
    }

    /// Solve into caller-provided output slots. A `None` slot is skipped.
    ///
    /// Returns the terminal status; budget exhaustion is terminal but
    /// non-fatal, and the outputs then hold the best iterate found.
    pub fn solve_into(
        &mut self,
        inputs: &QpInputs<'_>,
        budget: &Budget,
        out: QpOutputs<'_>,
    ) -> Result<SolveStatus> {
        self.check_inputs(inputs)?;
        self.marshal_inputs(inputs);

        if !self.prepared {
            self.backend.prepare(&self.layout, &self.opts)?;
            self.prepared = true;
        }

        let views = QpViews {
            n: self.layout.n(),
            m: self.layout.m(),
            h: self.ws.slot(self.slots.h),
            g: self.ws.slot(self.slots.g),
            a: self.ws.slot(self.slots.a),
            lbx: self.ws.slot(self.slots.lbx),
            ubx: self.ws.slot(self.slots.ubx),
            lba: self.ws.slot(self.slots.lba),
            uba: self.ws.slot(self.slots.uba),
        };

        let warm = self.state == HotstartState::Primed && self.backend.supports_warm_start();
        let raw = if warm {
            self.warm_starts += 1;
            self.backend.warm_solve(&views, budget)
        } else {
            self.cold_starts += 1;
            self.backend.init_solve(&views, budget)
        };

        let classified = self.backend.status_table().classify(raw);
        if !classified.class.has_iterate() {
            check_undocumented(&self.name, &classified);
            // A failed solve leaves nothing worth restarting from.
            self.backend.reset();
            self.state = HotstartState::Virgin;
            return Err(classified.into_error(&self.name));
        }
        self.state = HotstartState::Primed;

        let status = match classified.class {
            StatusClass::Success => SolveStatus::Optimal,
            StatusClass::IterationLimit => SolveStatus::MaxIters,
            StatusClass::TimeLimit => SolveStatus::TimeLimit,
            _ => unreachable!("iterate-bearing class handled above"),
        };

        self.extract(out);
        Ok(status)
    }

    fn extract(&mut self, out: QpOutputs<'_>) {
        let QpOutputs { x, lam, cost } = out;
        let flip = self.backend.flips_dual_sign();

        if let Some(lam_out) = lam {
            // Stage multipliers in the workspace so the sign convention can
            // be normalized without touching the caller's slot twice.
            let dual = self.ws.slot_mut(self.slots.dual);
            self.backend.extract(QpOutputs {
                x,
                lam: Some(dual),
                cost,
            });
            marshal::copy_scaled(self.ws.slot(self.slots.dual), if flip { -1.0 } else { 1.0 }, lam_out);
        } else {
            self.backend.extract(QpOutputs { x, lam: None, cost });
        }
    }

    fn check_inputs(&self, inputs: &QpInputs<'_>) -> Result<()> {
        let n = self.layout.n();
        let m = self.layout.m();

        if inputs.h.rows() != n || inputs.h.cols() != n {
            return Err(SolverError::structural(format!(
                "Hessian is {}x{}, expected {}x{}",
                inputs.h.rows(),
                inputs.h.cols(),
                n,
                n
            )));
        }
        if inputs.a.rows() != m || inputs.a.cols() != n {
            return Err(SolverError::structural(format!(
                "constraint matrix is {}x{}, expected {}x{}",
                inputs.a.rows(),
                inputs.a.cols(),
                m,
                n
            )));
        }
        for (role, slice, want) in [
            ("g", inputs.g, n),
            ("lbx", inputs.lbx, n),
            ("ubx", inputs.ubx, n),
            ("lba", inputs.lba, m),
            ("uba", inputs.uba, m),
        ] {
            if slice.len() != want {
                return Err(SolverError::structural(format!(
                    "{} has length {}, expected {}",
                    role,
                    slice.len(),
                    want
                )));
            }
        }

        // Bound ordering is checked before the backend is ever invoked.
        for (i, (&l, &u)) in inputs.lbx.iter().zip(inputs.ubx).enumerate() {
            if l > u {
                return Err(SolverError::config(format!(
                    "variable bound {} is empty: lower {} > upper {}",
                    i, l, u
                )));
            }
        }
        for (i, (&l, &u)) in inputs.lba.iter().zip(inputs.uba).enumerate() {
            if l > u {
                return Err(SolverError::config(format!(
                    "constraint bound {} is empty: lower {} > upper {}",
                    i, l, u
                )));
            }
        }
        Ok(())
    }

    fn marshal_inputs(&mut self, inputs: &QpInputs<'_>) {
        marshal::densify_symmetric(inputs.h, &self.layout.h, self.ws.slot_mut(self.slots.h));
        // Backends take A row-major, hence the transpose.
        marshal::densify(inputs.a, &self.layout.a, self.ws.slot_mut(self.slots.a), true);
        marshal::copy(inputs.g, self.ws.slot_mut(self.slots.g));
        marshal::copy(inputs.lbx, self.ws.slot_mut(self.slots.lbx));
        marshal::copy(inputs.ubx, self.ws.slot_mut(self.slots.ubx));
        marshal::copy(inputs.lba, self.ws.slot_mut(self.slots.lba));
        marshal::copy(inputs.uba, self.ws.slot_mut(self.slots.uba));
    }
}
