//! Optional restriction of closure rows to paths that reach a target lot.

use std::collections::BTreeSet;

use super::closure::ClosureRow;
use super::resolver::{normalize_inputs, traceability_seeds};
use crate::error::Result;
use crate::store::ReferenceStore;

/// Lot numbers a row must touch to be kept.
///
/// `None` means no targets were given and every row passes. A resolved but
/// empty set rejects every row.
#[derive(Debug, Clone, Default)]
pub struct TargetFilter {
    lots: Option<BTreeSet<String>>,
}

impl TargetFilter {
    /// Pass-through filter.
    pub fn none() -> Self {
        Self::default()
    }

    /// Resolve target identifiers against consumed material.
    ///
    /// Blank or missing targets give a pass-through filter.
    pub fn resolve<S: ReferenceStore + ?Sized>(store: &S, targets: Option<&[String]>) -> Result<Self> {
        let inputs = match targets {
            Some(t) => normalize_inputs(t),
            None => return Ok(Self::none()),
        };
        if inputs.is_empty() {
            return Ok(Self::none());
        }
        let lots: BTreeSet<String> = traceability_seeds(store, &inputs)?
            .into_iter()
            .map(|seed| seed.lot)
            .collect();
        log::debug!("{} target input(s) resolved to {} lot(s)", inputs.len(), lots.len());
        Ok(Self { lots: Some(lots) })
    }

    pub fn is_active(&self) -> bool {
        self.lots.is_some()
    }

    /// Keep genealogy rows whose ingredient lot is a target.
    pub fn retain_genealogy(&self, rows: &mut Vec<ClosureRow>) {
        self.retain(rows, |row| row.ingredient_lot.as_deref());
    }

    /// Keep traceability rows whose product lot is a target.
    pub fn retain_traceability(&self, rows: &mut Vec<ClosureRow>) {
        self.retain(rows, |row| row.product_lot.as_deref());
    }

    fn retain<F>(&self, rows: &mut Vec<ClosureRow>, lot_of: F)
    where
        F: Fn(&ClosureRow) -> Option<&str>,
    {
        if let Some(lots) = &self.lots {
            rows.retain(|row| lot_of(row).map_or(false, |lot| lots.contains(lot)));
        }
    }
}
