//! Batch adjacency: which batch consumed what another batch produced.
//!
//! The index is loaded hop by hop from the reference store, starting at the
//! seed lots, so it only covers batches the closure can actually reach.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::resolver::ResolvedSeeds;
use crate::error::Result;
use crate::store::{LotKey, MaterialTransaction, ReferenceStore, TransactionType};

/// Edge `product_batch -> ingredient_batch`: the product batch consumed a lot
/// the ingredient batch produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchEdge {
    pub product_batch_id: String,
    pub ingredient_batch_id: String,
}

/// Per-request adjacency index over a subset of the reference store.
#[derive(Debug, Default)]
pub struct BatchEdgeIndex {
    products: HashMap<String, Vec<MaterialTransaction>>,
    ingredients: HashMap<String, Vec<MaterialTransaction>>,
    producers: HashMap<LotKey, Vec<String>>,
    consumers: HashMap<LotKey, Vec<String>>,
    // ProductBatchID -> IngredientBatchIDs (genealogy)
    ingredient_batches: HashMap<String, Vec<String>>,
    // IngredientBatchID -> ProductBatchIDs (traceability)
    product_batches: HashMap<String, Vec<String>>,
}

impl BatchEdgeIndex {
    /// Build from a set of transaction rows. Duplicate rows collapse.
    pub fn from_transactions<I>(transactions: I) -> Self
    where
        I: IntoIterator<Item = MaterialTransaction>,
    {
        let rows: BTreeSet<MaterialTransaction> = transactions.into_iter().collect();
        let mut index = Self::default();

        for txn in rows {
            match txn.txn_type {
                TransactionType::Product => {
                    index.producers.entry(txn.lot_key()).or_default().push(txn.batch_id.clone());
                    index.products.entry(txn.batch_id.clone()).or_default().push(txn);
                }
                TransactionType::Ingredient => {
                    index.consumers.entry(txn.lot_key()).or_default().push(txn.batch_id.clone());
                    index.ingredients.entry(txn.batch_id.clone()).or_default().push(txn);
                }
            }
        }

        for batches in index.producers.values_mut().chain(index.consumers.values_mut()) {
            batches.sort();
            batches.dedup();
        }

        let mut edges = BTreeSet::new();
        for (key, consuming) in &index.consumers {
            if let Some(producing) = index.producers.get(key) {
                for product_batch_id in consuming {
                    for ingredient_batch_id in producing {
                        edges.insert(BatchEdge {
                            product_batch_id: product_batch_id.clone(),
                            ingredient_batch_id: ingredient_batch_id.clone(),
                        });
                    }
                }
            }
        }
        for edge in edges {
            index
                .ingredient_batches
                .entry(edge.product_batch_id.clone())
                .or_default()
                .push(edge.ingredient_batch_id.clone());
            index
                .product_batches
                .entry(edge.ingredient_batch_id)
                .or_default()
                .push(edge.product_batch_id);
        }

        index
    }

    /// Load every batch reachable from `seeds` within `max_depth` hops.
    pub fn load<S: ReferenceStore + ?Sized>(
        store: &S,
        seeds: &ResolvedSeeds,
        max_depth: u32,
    ) -> Result<Self> {
        // One loader per direction: a batch fetched on the way down must still
        // be expanded on the way up.
        let mut rows = Vec::new();
        let mut queries = 0;
        if !seeds.genealogy.is_empty() {
            let mut loader = Loader::new(store);
            loader.load_genealogy(seeds, max_depth)?;
            queries += loader.queries;
            rows.extend(loader.rows);
        }
        if !seeds.traceability.is_empty() {
            let mut loader = Loader::new(store);
            loader.load_traceability(seeds, max_depth)?;
            queries += loader.queries;
            rows.extend(loader.rows);
        }
        let index = Self::from_transactions(rows);
        log::debug!(
            "Edge index: {} batches, {} edges ({} store queries)",
            index.batch_count(),
            index.edge_count(),
            queries
        );
        Ok(index)
    }

    /// Product rows of a batch.
    pub fn products_of(&self, batch_id: &str) -> &[MaterialTransaction] {
        self.products.get(batch_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ingredient rows of a batch.
    pub fn ingredients_of(&self, batch_id: &str) -> &[MaterialTransaction] {
        self.ingredients.get(batch_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Batches that produced a lot.
    pub fn producers_of(&self, key: &LotKey) -> &[String] {
        self.producers.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Batches that consumed a lot.
    pub fn consumers_of(&self, key: &LotKey) -> &[String] {
        self.consumers.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Batches whose output `product_batch_id` consumed.
    pub fn ingredient_batches(&self, product_batch_id: &str) -> &[String] {
        self.ingredient_batches
            .get(product_batch_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Batches that consumed the output of `ingredient_batch_id`.
    pub fn product_batches(&self, ingredient_batch_id: &str) -> &[String] {
        self.product_batches
            .get(ingredient_batch_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Batches that lie on a consumption cycle: members of a strongly
    /// connected component with two or more batches, or with a self-edge.
    ///
    /// Iterative Tarjan over the genealogy edges. Components are the same in
    /// the traceability direction.
    pub fn cyclic_batches(&self) -> HashSet<String> {
        struct Frame<'a> {
            batch: &'a str,
            next: usize,
            index: usize,
            low: usize,
        }

        let mut nodes: BTreeSet<&str> = BTreeSet::new();
        for (product, ingredients) in &self.ingredient_batches {
            nodes.insert(product.as_str());
            nodes.extend(ingredients.iter().map(String::as_str));
        }

        let mut index_of: HashMap<&str, usize> = HashMap::new();
        let mut on_stack: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = Vec::new();
        let mut cyclic = HashSet::new();
        let mut counter = 0;

        for &start in &nodes {
            if index_of.contains_key(start) {
                continue;
            }
            index_of.insert(start, counter);
            stack.push(start);
            on_stack.insert(start);
            let mut calls = vec![Frame {
                batch: start,
                next: 0,
                index: counter,
                low: counter,
            }];
            counter += 1;

            while let Some(frame) = calls.last_mut() {
                let (v, v_index) = (frame.batch, frame.index);
                if let Some(w) = self.ingredient_batches(v).get(frame.next) {
                    frame.next += 1;
                    let w = w.as_str();
                    match index_of.get(w) {
                        Some(&w_index) => {
                            if on_stack.contains(w) {
                                frame.low = frame.low.min(w_index);
                            }
                        }
                        None => {
                            index_of.insert(w, counter);
                            stack.push(w);
                            on_stack.insert(w);
                            calls.push(Frame {
                                batch: w,
                                next: 0,
                                index: counter,
                                low: counter,
                            });
                            counter += 1;
                        }
                    }
                    continue;
                }

                let low = frame.low;
                calls.pop();
                if let Some(parent) = calls.last_mut() {
                    parent.low = parent.low.min(low);
                }
                if low == v_index {
                    let mut component = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack.remove(w);
                        component.push(w);
                        if w == v {
                            break;
                        }
                    }
                    let self_edge = self.ingredient_batches(v).iter().any(|w| w == v);
                    if component.len() > 1 || self_edge {
                        cyclic.extend(component.into_iter().map(str::to_string));
                    }
                }
            }
        }
        cyclic
    }

    pub fn batch_count(&self) -> usize {
        self.products
            .keys()
            .chain(self.ingredients.keys())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn edge_count(&self) -> usize {
        self.ingredient_batches.values().map(Vec::len).sum()
    }
}

/// Hop-wise fetcher for one direction. Each batch and each lot is queried
/// at most once.
struct Loader<'s, S: ReferenceStore + ?Sized> {
    store: &'s S,
    rows: Vec<MaterialTransaction>,
    loaded_batches: HashSet<String>,
    queried_producers: HashSet<LotKey>,
    queried_consumers: HashSet<LotKey>,
    queries: usize,
}

impl<'s, S: ReferenceStore + ?Sized> Loader<'s, S> {
    fn new(store: &'s S) -> Self {
        Self {
            store,
            rows: Vec::new(),
            loaded_batches: HashSet::new(),
            queried_producers: HashSet::new(),
            queried_consumers: HashSet::new(),
            queries: 0,
        }
    }

    /// Seed producers, then per level: the frontier batches' rows and the
    /// producers of what they consumed.
    fn load_genealogy(&mut self, seeds: &ResolvedSeeds, max_depth: u32) -> Result<()> {
        let keys: Vec<LotKey> = seeds.genealogy.iter().map(|s| s.key()).collect();
        let mut frontier = self.fetch_lots(TransactionType::Product, keys)?;

        for _level in 1..=max_depth {
            let new_rows = self.fetch_batches(&frontier)?;
            if new_rows.is_empty() {
                break;
            }
            let consumed: Vec<LotKey> = new_rows
                .iter()
                .filter(|t| t.txn_type == TransactionType::Ingredient)
                .map(|t| t.lot_key())
                .collect();
            frontier = self.fetch_lots(TransactionType::Product, consumed)?;
        }
        Ok(())
    }

    /// Seed consumers, then per level: the frontier batches' rows and the
    /// consumers of what they produced.
    fn load_traceability(&mut self, seeds: &ResolvedSeeds, max_depth: u32) -> Result<()> {
        let keys: Vec<LotKey> = seeds.traceability.iter().map(|s| s.key()).collect();
        let mut frontier = self.fetch_lots(TransactionType::Ingredient, keys)?;

        for _level in 1..=max_depth {
            let new_rows = self.fetch_batches(&frontier)?;
            if new_rows.is_empty() {
                break;
            }
            let produced: Vec<LotKey> = new_rows
                .iter()
                .filter(|t| t.txn_type == TransactionType::Product)
                .map(|t| t.lot_key())
                .collect();
            frontier = self.fetch_lots(TransactionType::Ingredient, produced)?;
        }
        Ok(())
    }

    /// Rows of `txn_type` for lots not queried before; returns their batch ids.
    fn fetch_lots(&mut self, txn_type: TransactionType, keys: Vec<LotKey>) -> Result<BTreeSet<String>> {
        let queried = match txn_type {
            TransactionType::Product => &mut self.queried_producers,
            TransactionType::Ingredient => &mut self.queried_consumers,
        };
        let fresh: Vec<LotKey> = keys
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter(|k| queried.insert(k.clone()))
            .collect();
        if fresh.is_empty() {
            return Ok(BTreeSet::new());
        }
        self.queries += 1;
        let rows = self.store.transactions_for_lots(txn_type, &fresh)?;
        let batches = rows.iter().map(|t| t.batch_id.clone()).collect();
        self.rows.extend(rows);
        Ok(batches)
    }

    /// All rows of batches not loaded before.
    fn fetch_batches(&mut self, batch_ids: &BTreeSet<String>) -> Result<Vec<MaterialTransaction>> {
        let fresh: Vec<String> = batch_ids
            .iter()
            .filter(|id| self.loaded_batches.insert((*id).clone()))
            .cloned()
            .collect();
        if fresh.is_empty() {
            return Ok(Vec::new());
        }
        self.queries += 1;
        let rows = self.store.batch_transactions(&fresh)?;
        self.rows.extend(rows.iter().cloned());
        Ok(rows)
    }
}
