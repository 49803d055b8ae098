//! Bounded-depth closure over the batch edge index.
//!
//! Genealogy walks from a produced lot down through what each batch consumed;
//! traceability walks from a consumed lot up through every batch that used
//! it. Each hop emits one [`ClosureRow`] carrying the seed's identity.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;

use super::edges::BatchEdgeIndex;
use super::resolver::SeedNode;
use crate::store::{LotKey, MaterialTransaction};

/// Identity of the seed lot, copied onto every row of its traversal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RootContext {
    pub item_code: String,
    pub lot: String,
    pub parent_lot: Option<String>,
    pub supplier_lot: Option<String>,
}

impl From<&MaterialTransaction> for RootContext {
    fn from(txn: &MaterialTransaction) -> Self {
        Self {
            item_code: txn.item_code.clone(),
            lot: txn.lot.clone(),
            parent_lot: txn.parent_lot.clone(),
            supplier_lot: txn.supplier_lot.clone(),
        }
    }
}

/// One hop of a traversal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ClosureRow {
    pub root_item_code: String,
    pub root_lot: String,
    pub root_parent_lot: Option<String>,
    pub root_supplier_lot: Option<String>,
    pub level: u32,
    pub product_batch_id: String,
    pub product_item_code: Option<String>,
    pub product_lot: Option<String>,
    pub product_parent_lot: Option<String>,
    pub ingredient_batch_id: Option<String>,
    pub ingredient_item_code: Option<String>,
    pub ingredient_lot: Option<String>,
    pub ingredient_supplier_lot: Option<String>,
    pub ingredient_parent_lot: Option<String>,
}

impl ClosureRow {
    fn new(root: &RootContext, level: u32, product_batch_id: &str) -> Self {
        Self {
            root_item_code: root.item_code.clone(),
            root_lot: root.lot.clone(),
            root_parent_lot: root.parent_lot.clone(),
            root_supplier_lot: root.supplier_lot.clone(),
            level,
            product_batch_id: product_batch_id.to_string(),
            product_item_code: None,
            product_lot: None,
            product_parent_lot: None,
            ingredient_batch_id: None,
            ingredient_item_code: None,
            ingredient_lot: None,
            ingredient_supplier_lot: None,
            ingredient_parent_lot: None,
        }
    }

    fn with_product(mut self, product: Option<&MaterialTransaction>) -> Self {
        if let Some(p) = product {
            self.product_item_code = Some(p.item_code.clone());
            self.product_lot = Some(p.lot.clone());
            self.product_parent_lot = p.parent_lot.clone();
        }
        self
    }

    fn with_ingredient(mut self, ingredient: &MaterialTransaction, batch_id: Option<&str>) -> Self {
        self.ingredient_batch_id = batch_id.map(str::to_string);
        self.ingredient_item_code = Some(ingredient.item_code.clone());
        self.ingredient_lot = Some(ingredient.lot.clone());
        self.ingredient_supplier_lot = ingredient.supplier_lot.clone();
        self.ingredient_parent_lot = ingredient.parent_lot.clone();
        self
    }
}

/// A batch on the frontier, with how it was reached.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Step {
    batch_id: String,
    // Traceability only: the batch whose output this batch consumed
    from: Option<String>,
    root: RootContext,
}

/// Traversal counters, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClosureStats {
    pub rows: usize,
    pub deepest_level: u32,
    pub pruned_cycles: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Walk {
    Down,
    Up,
}

/// Closure computation over one request's index.
///
/// With the cycle guard on, a batch on a consumption cycle is entered at most
/// once per root; the row that closes the cycle is still emitted. Batches off
/// any cycle are never pruned, so acyclic graphs give the same rows with the
/// guard on or off.
pub struct ClosureEngine<'a> {
    index: &'a BatchEdgeIndex,
    max_depth: u32,
    // Empty when the guard is off
    cyclic: HashSet<String>,
}

impl<'a> ClosureEngine<'a> {
    pub fn new(index: &'a BatchEdgeIndex, max_depth: u32, cycle_guard: bool) -> Self {
        let cyclic = if cycle_guard { index.cyclic_batches() } else { HashSet::new() };
        if !cyclic.is_empty() {
            log::debug!("{} batch(es) lie on consumption cycles", cyclic.len());
        }
        Self {
            index,
            max_depth,
            cyclic,
        }
    }

    /// Composition explosion below each seed lot.
    ///
    /// The seed batch is the level-1 product; every lot it consumed is a
    /// level-1 ingredient, and the batches that made those lots form the
    /// next frontier.
    pub fn genealogy(&self, seeds: &[SeedNode]) -> (Vec<ClosureRow>, ClosureStats) {
        let mut frontier = BTreeSet::new();
        for seed in seeds {
            let key = seed.key();
            for batch_id in self.index.producers_of(&key) {
                for product in self.index.products_of(batch_id) {
                    if product.lot_key() == key {
                        frontier.insert(self.start(batch_id, RootContext::from(product)));
                    }
                }
            }
        }
        self.run(frontier, Walk::Down)
    }

    /// Where-used trace above each seed lot.
    ///
    /// Level 1 is each batch that consumed the seed lot (ingredient role left
    /// empty); level n+1 is each batch that consumed a level-n product.
    pub fn traceability(&self, seeds: &[SeedNode]) -> (Vec<ClosureRow>, ClosureStats) {
        let mut frontier = BTreeSet::new();
        for seed in seeds {
            let key = seed.key();
            for batch_id in self.index.consumers_of(&key) {
                for ingredient in self.index.ingredients_of(batch_id) {
                    if ingredient.lot_key() == key {
                        frontier.insert(self.start(batch_id, RootContext::from(ingredient)));
                    }
                }
            }
        }
        self.run(frontier, Walk::Up)
    }

    fn start(&self, batch_id: &str, root: RootContext) -> Step {
        Step {
            batch_id: batch_id.to_string(),
            from: None,
            root,
        }
    }

    fn run(&self, mut frontier: BTreeSet<Step>, walk: Walk) -> (Vec<ClosureRow>, ClosureStats) {
        let mut rows = BTreeSet::new();
        let mut stats = ClosureStats::default();
        let mut entered = HashSet::new();
        self.mark_entered(&frontier, &mut entered);
        let mut level = 1;

        while !frontier.is_empty() {
            for step in &frontier {
                match walk {
                    Walk::Down => self.emit_genealogy(step, level, &mut rows),
                    Walk::Up => self.emit_traceability(step, level, &mut rows),
                }
            }
            stats.deepest_level = level;
            if level >= self.max_depth {
                break;
            }
            frontier = self.advance(&frontier, walk, &entered, &mut stats);
            self.mark_entered(&frontier, &mut entered);
            level += 1;
        }

        if stats.pruned_cycles > 0 {
            log::warn!(
                "Cycle guard stopped {} path(s) from re-entering a batch",
                stats.pruned_cycles
            );
        }
        stats.rows = rows.len();
        (rows.into_iter().collect(), stats)
    }

    /// Record cyclic batches of `frontier` as entered for their root.
    fn mark_entered(&self, frontier: &BTreeSet<Step>, entered: &mut HashSet<(RootContext, String)>) {
        for step in frontier {
            if self.cyclic.contains(&step.batch_id) {
                entered.insert((step.root.clone(), step.batch_id.clone()));
            }
        }
    }

    fn advance(
        &self,
        frontier: &BTreeSet<Step>,
        walk: Walk,
        entered: &HashSet<(RootContext, String)>,
        stats: &mut ClosureStats,
    ) -> BTreeSet<Step> {
        let mut next = BTreeSet::new();
        for step in frontier {
            let neighbours = match walk {
                Walk::Down => self.index.ingredient_batches(&step.batch_id),
                Walk::Up => self.index.product_batches(&step.batch_id),
            };
            for neighbour in neighbours {
                if self.cyclic.contains(neighbour) && entered.contains(&(step.root.clone(), neighbour.clone())) {
                    log::debug!(
                        "Cycle at batch {} below root {}/{}",
                        neighbour,
                        step.root.item_code,
                        step.root.lot
                    );
                    stats.pruned_cycles += 1;
                    continue;
                }
                next.insert(Step {
                    batch_id: neighbour.clone(),
                    from: (walk == Walk::Up).then(|| step.batch_id.clone()),
                    root: step.root.clone(),
                });
            }
        }
        next
    }

    fn emit_genealogy(&self, step: &Step, level: u32, rows: &mut BTreeSet<ClosureRow>) {
        let root_key = LotKey::new(&step.root.item_code, &step.root.lot);
        for product in self.index.products_of(&step.batch_id) {
            // At level 1 the product is the seed lot itself
            if level == 1 && product.lot_key() != root_key {
                continue;
            }
            for ingredient in self.index.ingredients_of(&step.batch_id) {
                let base = ClosureRow::new(&step.root, level, &step.batch_id).with_product(Some(product));
                let producers = self.index.producers_of(&ingredient.lot_key());
                if producers.is_empty() {
                    rows.insert(base.with_ingredient(ingredient, None));
                } else {
                    for producer in producers {
                        rows.insert(base.clone().with_ingredient(ingredient, Some(producer)));
                    }
                }
            }
        }
    }

    fn emit_traceability(&self, step: &Step, level: u32, rows: &mut BTreeSet<ClosureRow>) {
        let products = self.index.products_of(&step.batch_id);
        let bases: Vec<ClosureRow> = if products.is_empty() {
            vec![ClosureRow::new(&step.root, level, &step.batch_id)]
        } else {
            products
                .iter()
                .map(|p| ClosureRow::new(&step.root, level, &step.batch_id).with_product(Some(p)))
                .collect()
        };

        match &step.from {
            None => rows.extend(bases),
            Some(from) => {
                for base in bases {
                    for consumed in self.index.products_of(from) {
                        rows.insert(base.clone().with_ingredient(consumed, Some(from)));
                    }
                }
            }
        }
    }
}
