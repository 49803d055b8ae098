//! Identifier resolution: raw inputs to seed lots.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use serde::Serialize;

use super::Direction;
use crate::error::Result;
use crate::store::{IdentifierField, LotKey, ReferenceStore, TransactionType};

/// Which transaction field an input matched. Diagnostic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeType {
    Lot,
    ParentLot,
    Item,
    SupplierLot,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeType::Lot => "Lot",
            NodeType::ParentLot => "ParentLot",
            NodeType::Item => "Item",
            NodeType::SupplierLot => "SupplierLot",
        };
        f.write_str(s)
    }
}

/// A resolved starting lot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SeedNode {
    pub item_code: String,
    pub lot: String,
    pub node_type: NodeType,
}

impl SeedNode {
    pub fn key(&self) -> LotKey {
        LotKey::new(&self.item_code, &self.lot)
    }
}

/// Seed sets per direction. A direction that was not requested stays empty.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSeeds {
    pub genealogy: Vec<SeedNode>,
    pub traceability: Vec<SeedNode>,
}

/// Precedence when one lot matches several fields.
const MATCH_ORDER: [(IdentifierField, NodeType); 4] = [
    (IdentifierField::Lot, NodeType::Lot),
    (IdentifierField::ParentLot, NodeType::ParentLot),
    (IdentifierField::ItemCode, NodeType::Item),
    (IdentifierField::SupplierLot, NodeType::SupplierLot),
];

/// Trim, drop blanks and duplicates, keep first-seen order.
pub fn normalize_inputs(inputs: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    inputs
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_string()))
        .map(str::to_string)
        .collect()
}

/// Resolve inputs for every direction `direction` covers.
pub fn resolve_seeds<S: ReferenceStore + ?Sized>(
    store: &S,
    inputs: &[String],
    direction: Direction,
) -> Result<ResolvedSeeds> {
    let inputs = normalize_inputs(inputs);
    let mut seeds = ResolvedSeeds::default();
    if inputs.is_empty() {
        return Ok(seeds);
    }
    if direction.includes_genealogy() {
        seeds.genealogy = genealogy_seeds(store, &inputs)?;
    }
    if direction.includes_traceability() {
        seeds.traceability = traceability_seeds(store, &inputs)?;
    }
    log::debug!(
        "Resolved {} input(s) to {} genealogy and {} traceability seed(s)",
        inputs.len(),
        seeds.genealogy.len(),
        seeds.traceability.len()
    );
    Ok(seeds)
}

/// Lots produced by some batch that match an input.
///
/// Supplier lots only ever appear on consumed material, so a supplier-lot
/// input is first mapped to the consumed lot and then to the batch that
/// produced it.
pub fn genealogy_seeds<S: ReferenceStore + ?Sized>(
    store: &S,
    inputs: &[String],
) -> Result<Vec<SeedNode>> {
    let mut collector = SeedCollector::default();

    for (field, node_type) in MATCH_ORDER {
        if field == IdentifierField::SupplierLot {
            continue;
        }
        for txn in store.find_by_identifier(TransactionType::Product, field, inputs)? {
            collector.add(&txn.item_code, &txn.lot, node_type);
        }
    }

    let supplied: BTreeSet<LotKey> = store
        .find_by_identifier(TransactionType::Ingredient, IdentifierField::SupplierLot, inputs)?
        .iter()
        .map(|t| t.lot_key())
        .collect();
    if !supplied.is_empty() {
        let keys: Vec<LotKey> = supplied.into_iter().collect();
        for txn in store.transactions_for_lots(TransactionType::Product, &keys)? {
            collector.add(&txn.item_code, &txn.lot, NodeType::SupplierLot);
        }
    }

    Ok(collector.finish())
}

/// Consumed lots that match an input. Also used for target sets.
pub fn traceability_seeds<S: ReferenceStore + ?Sized>(
    store: &S,
    inputs: &[String],
) -> Result<Vec<SeedNode>> {
    let mut collector = SeedCollector::default();
    for (field, node_type) in MATCH_ORDER {
        for txn in store.find_by_identifier(TransactionType::Ingredient, field, inputs)? {
            collector.add(&txn.item_code, &txn.lot, node_type);
        }
    }
    Ok(collector.finish())
}

/// Dedup by (item, lot); the first field that matched wins.
#[derive(Default)]
struct SeedCollector {
    seen: HashSet<LotKey>,
    seeds: Vec<SeedNode>,
}

impl SeedCollector {
    fn add(&mut self, item_code: &str, lot: &str, node_type: NodeType) {
        if self.seen.insert(LotKey::new(item_code, lot)) {
            self.seeds.push(SeedNode {
                item_code: item_code.to_string(),
                lot: lot.to_string(),
                node_type,
            });
        }
    }

    fn finish(mut self) -> Vec<SeedNode> {
        self.seeds
            .sort_by(|a, b| (&a.item_code, &a.lot).cmp(&(&b.item_code, &b.lot)));
        self.seeds
    }
}
