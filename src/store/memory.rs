//! In-memory reference store, used for fixtures and tests.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::{
    IdentifierField, ItemReference, LotKey, MaterialTransaction, ReferenceData, ReferenceStore,
    TransactionType,
};
use crate::error::Result;

/// Reference store backed by plain vectors.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    transactions: Vec<MaterialTransaction>,
    items: HashMap<String, ItemReference>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: ReferenceData) -> Self {
        let mut store = Self::new();
        for txn in data.transactions {
            store.add_transaction(txn);
        }
        for item in data.items {
            store.add_item(item);
        }
        store
    }

    pub fn add_transaction(&mut self, txn: MaterialTransaction) {
        if !self.transactions.contains(&txn) {
            self.transactions.push(txn);
        }
    }

    pub fn add_item(&mut self, item: ItemReference) {
        self.items.insert(item.item_code.clone(), item);
    }

    pub fn with_transaction(mut self, txn: MaterialTransaction) -> Self {
        self.add_transaction(txn);
        self
    }

    pub fn with_item(mut self, item: ItemReference) -> Self {
        self.add_item(item);
        self
    }

    fn select<F>(&self, keep: F) -> Vec<MaterialTransaction>
    where
        F: Fn(&MaterialTransaction) -> bool,
    {
        self.transactions.iter().filter(|t| keep(t)).cloned().collect()
    }
}

impl ReferenceStore for MemoryStore {
    fn find_by_identifier(
        &self,
        txn_type: TransactionType,
        field: IdentifierField,
        values: &[String],
    ) -> Result<Vec<MaterialTransaction>> {
        let wanted: HashSet<&str> = values.iter().map(String::as_str).collect();
        Ok(self.select(|t| {
            t.txn_type == txn_type
                && field.value_of(t).map_or(false, |v| wanted.contains(v))
        }))
    }

    fn batch_transactions(&self, batch_ids: &[String]) -> Result<Vec<MaterialTransaction>> {
        let wanted: HashSet<&str> = batch_ids.iter().map(String::as_str).collect();
        Ok(self.select(|t| wanted.contains(t.batch_id.as_str())))
    }

    fn transactions_for_lots(
        &self,
        txn_type: TransactionType,
        lots: &[LotKey],
    ) -> Result<Vec<MaterialTransaction>> {
        let wanted: HashSet<&LotKey> = lots.iter().collect();
        Ok(self.select(|t| t.txn_type == txn_type && wanted.contains(&t.lot_key())))
    }

    fn item_references(&self, item_codes: &[String]) -> Result<HashMap<String, ItemReference>> {
        Ok(item_codes
            .iter()
            .filter_map(|code| self.items.get(code).map(|item| (code.clone(), item.clone())))
            .collect())
    }

    fn search_item_codes(&self, text: &str, limit: usize) -> Result<Vec<String>> {
        let needle = text.to_lowercase();
        let codes: BTreeSet<&str> = self
            .transactions
            .iter()
            .map(|t| t.item_code.as_str())
            .filter(|code| code.to_lowercase().contains(&needle))
            .collect();
        Ok(codes.into_iter().take(limit).map(str::to_string).collect())
    }

    fn product_codes(&self) -> Result<Vec<String>> {
        let codes: BTreeSet<&str> = self
            .items
            .values()
            .filter_map(|item| item.product_code.as_deref())
            .collect();
        Ok(codes.into_iter().map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_transaction(MaterialTransaction::product("B1", "FG", "LOT-FG-1"))
            .with_transaction(MaterialTransaction::ingredient("B1", "RM", "LOT-RM-1").with_supplier_lot("S-1"))
            .with_transaction(MaterialTransaction::product("B2", "RM", "LOT-RM-1"))
            .with_transaction(MaterialTransaction::product("B2", "RM", "LOT-RM-1"))
    }

    #[test]
    fn test_duplicate_rows_collapse() {
        let rows = store().batch_transactions(&["B2".to_string()]).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_find_by_identifier_respects_type() {
        let s = store();
        let products = s
            .find_by_identifier(TransactionType::Product, IdentifierField::Lot, &["LOT-RM-1".to_string()])
            .unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].batch_id, "B2");

        let by_supplier = s
            .find_by_identifier(TransactionType::Ingredient, IdentifierField::SupplierLot, &["S-1".to_string()])
            .unwrap();
        assert_eq!(by_supplier.len(), 1);
        assert_eq!(by_supplier[0].batch_id, "B1");
    }

    #[test]
    fn test_search_item_codes_case_insensitive() {
        let codes = store().search_item_codes("r", 10).unwrap();
        assert_eq!(codes, vec!["RM".to_string()]);
        let all = store().search_item_codes("", 1).unwrap();
        assert_eq!(all.len(), 1);
    }
}
