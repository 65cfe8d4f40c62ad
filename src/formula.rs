//! Formula service - derived field values
//!
//! Derived values are computed outside the engine. Callers run the solver on
//! a record before or after storing it; the record store never calls it.

use crate::record::Record;

pub trait FormulaSolver: Send + Sync {
    /// Compute derived columns and write them into `record`
    fn compute_and_apply(&self, record: &mut Record);
}

/// Solver for schemas without derived columns
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFormulas;

impl FormulaSolver for NoFormulas {
    fn compute_and_apply(&self, _record: &mut Record) {}
}

impl<F> FormulaSolver for F
where
    F: Fn(&mut Record) + Send + Sync,
{
    fn compute_and_apply(&self, record: &mut Record) {
        self(record)
    }
}
