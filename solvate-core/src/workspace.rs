//! Pre-sized scratch memory owned by one solver instance.
//!
//! All marshaling targets live in a single flat arena carved into named
//! slots. Slot sizes are a pure function of the problem descriptor,
//! computed once at construction; later calls only hand out bounds-checked
//! slices. Nothing here reallocates after construction, so the hot path is
//! allocation-free by design.

use std::ops::Range;

use crate::error::{Result, SolverError};

/// Handle to one slot of a [`Workspace`].
///
/// Only meaningful for the workspace whose plan created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotId(usize);

/// Slot plan: names and lengths, accumulated before the one allocation.
#[derive(Debug, Default)]
pub struct WorkspacePlan {
    slots: Vec<(&'static str, usize)>,
}

impl WorkspacePlan {
    /// Empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a slot of `len` doubles. Returns its handle.
    pub fn slot(&mut self, name: &'static str, len: usize) -> SlotId {
        let id = SlotId(self.slots.len());
        self.slots.push((name, len));
        id
    }

    /// Total doubles the plan will allocate.
    pub fn total(&self) -> usize {
        self.slots.iter().map(|(_, len)| len).sum()
    }

    /// Perform the single allocation.
    ///
    /// Allocation failure is a [`SolverError::Resource`], not an abort; the
    /// caller gets no partially usable workspace.
    pub fn allocate(self) -> Result<Workspace> {
        let total = self.total();
        let mut buf: Vec<f64> = Vec::new();
        buf.try_reserve_exact(total).map_err(|_| {
            SolverError::Resource(format!(
                "failed to allocate workspace of {} doubles",
                total
            ))
        })?;
        buf.resize(total, 0.0);

        let mut spans = Vec::with_capacity(self.slots.len());
        let mut names = Vec::with_capacity(self.slots.len());
        let mut offset = 0usize;
        for (name, len) in self.slots {
            spans.push(offset..offset + len);
            names.push(name);
            offset += len;
        }
        Ok(Workspace { buf, spans, names })
    }
}

/// The allocated arena.
#[derive(Debug)]
pub struct Workspace {
    buf: Vec<f64>,
    spans: Vec<Range<usize>>,
    names: Vec<&'static str>,
}

impl Workspace {
    /// Borrow a slot read-only.
    pub fn slot(&self, id: SlotId) -> &[f64] {
        &self.buf[self.span(id)]
    }

    /// Borrow a slot mutably.
    pub fn slot_mut(&mut self, id: SlotId) -> &mut [f64] {
        let span = self.span(id);
        &mut self.buf[span]
    }

    /// Length of a slot.
    pub fn slot_len(&self, id: SlotId) -> usize {
        self.span(id).len()
    }

    /// Total arena size in doubles.
    pub fn total_len(&self) -> usize {
        self.buf.len()
    }

    fn span(&self, id: SlotId) -> Range<usize> {
        match self.spans.get(id.0) {
            Some(span) => span.clone(),
            None => panic!("slot id {} not part of this workspace", id.0),
        }
    }

    /// Name a slot was registered under, for diagnostics.
    pub fn slot_name(&self, id: SlotId) -> &'static str {
        self.names[id.0]
    }
}
