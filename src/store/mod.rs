//! Reference store: read-only access to batch consumption records and item
//! master data.
//!
//! The lineage pipeline only talks to the [`ReferenceStore`] trait, so the
//! SQLite-backed store and the in-memory fixture store are interchangeable.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{write_reference_data, SqliteStore};

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LineageError, Result};

/// Role of a transaction row within its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransactionType {
    /// The lot the batch produced.
    Product,
    /// A lot the batch consumed.
    Ingredient,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Product => "Product",
            TransactionType::Ingredient => "Ingredient",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = LineageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Product" => Ok(TransactionType::Product),
            "Ingredient" => Ok(TransactionType::Ingredient),
            other => Err(LineageError::Query(format!("unknown transaction type '{}'", other))),
        }
    }
}

/// One row of the batch consumption record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaterialTransaction {
    pub batch_id: String,
    #[serde(rename = "type")]
    pub txn_type: TransactionType,
    pub item_code: String,
    pub lot: String,
    #[serde(default)]
    pub parent_lot: Option<String>,
    #[serde(default)]
    pub supplier_lot: Option<String>,
}

impl MaterialTransaction {
    pub fn product(batch_id: &str, item_code: &str, lot: &str) -> Self {
        Self::new(batch_id, TransactionType::Product, item_code, lot)
    }

    pub fn ingredient(batch_id: &str, item_code: &str, lot: &str) -> Self {
        Self::new(batch_id, TransactionType::Ingredient, item_code, lot)
    }

    fn new(batch_id: &str, txn_type: TransactionType, item_code: &str, lot: &str) -> Self {
        Self {
            batch_id: batch_id.to_string(),
            txn_type,
            item_code: item_code.to_string(),
            lot: lot.to_string(),
            parent_lot: None,
            supplier_lot: None,
        }
    }

    pub fn with_parent_lot(mut self, parent_lot: &str) -> Self {
        self.parent_lot = Some(parent_lot.to_string());
        self
    }

    pub fn with_supplier_lot(mut self, supplier_lot: &str) -> Self {
        self.supplier_lot = Some(supplier_lot.to_string());
        self
    }

    pub fn lot_key(&self) -> LotKey {
        LotKey::new(&self.item_code, &self.lot)
    }
}

/// Identity of a material lot: the join key between an Ingredient row and the
/// Product row of the batch that made it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LotKey {
    pub item_code: String,
    pub lot: String,
}

impl LotKey {
    pub fn new(item_code: &str, lot: &str) -> Self {
        Self {
            item_code: item_code.to_string(),
            lot: lot.to_string(),
        }
    }
}

/// Item master entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReference {
    pub item_code: String,
    #[serde(default)]
    pub product_code: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub unit_op_name: Option<String>,
}

/// Transaction column an input identifier may match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierField {
    Lot,
    ParentLot,
    ItemCode,
    SupplierLot,
}

impl IdentifierField {
    pub(crate) fn column(&self) -> &'static str {
        match self {
            IdentifierField::Lot => "lot_number",
            IdentifierField::ParentLot => "parent_lot_number",
            IdentifierField::ItemCode => "item_code",
            IdentifierField::SupplierLot => "supplier_lot_number",
        }
    }

    pub(crate) fn value_of<'a>(&self, txn: &'a MaterialTransaction) -> Option<&'a str> {
        match self {
            IdentifierField::Lot => Some(txn.lot.as_str()),
            IdentifierField::ParentLot => txn.parent_lot.as_deref(),
            IdentifierField::ItemCode => Some(txn.item_code.as_str()),
            IdentifierField::SupplierLot => txn.supplier_lot.as_deref(),
        }
    }
}

/// A complete reference dataset, as loaded from a JSON fixture.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceData {
    #[serde(default)]
    pub transactions: Vec<MaterialTransaction>,
    #[serde(default)]
    pub items: Vec<ItemReference>,
}

/// Read-only queries the lineage pipeline needs from the reference store.
///
/// Results are sets: implementations collapse identical transaction rows.
pub trait ReferenceStore {
    /// Rows of `txn_type` whose `field` equals one of `values`.
    fn find_by_identifier(
        &self,
        txn_type: TransactionType,
        field: IdentifierField,
        values: &[String],
    ) -> Result<Vec<MaterialTransaction>>;

    /// All rows (both types) of the given batches.
    fn batch_transactions(&self, batch_ids: &[String]) -> Result<Vec<MaterialTransaction>>;

    /// Rows of `txn_type` for the given lots: producers for `Product`,
    /// consumers for `Ingredient`.
    fn transactions_for_lots(
        &self,
        txn_type: TransactionType,
        lots: &[LotKey],
    ) -> Result<Vec<MaterialTransaction>>;

    /// Item master entries keyed by item code. Unknown codes are absent.
    fn item_references(&self, item_codes: &[String]) -> Result<HashMap<String, ItemReference>>;

    /// Distinct transaction item codes containing `text` (case-insensitive), sorted.
    fn search_item_codes(&self, text: &str, limit: usize) -> Result<Vec<String>>;

    /// Distinct non-null product codes, sorted.
    fn product_codes(&self) -> Result<Vec<String>>;
}
