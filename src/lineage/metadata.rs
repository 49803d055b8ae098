//! Item master enrichment for closure rows.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use super::closure::ClosureRow;
use crate::error::Result;
use crate::store::{ItemReference, ReferenceStore};

/// Descriptive fields attached per row role. All null when the item has no
/// master entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ItemDetails {
    pub unit_op_name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
}

impl From<&ItemReference> for ItemDetails {
    fn from(item: &ItemReference) -> Self {
        Self {
            unit_op_name: item.unit_op_name.clone(),
            description: item.description.clone(),
            category: item.category.clone(),
        }
    }
}

/// A closure row with details for its root, product and ingredient items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedRow {
    pub row: ClosureRow,
    pub root: ItemDetails,
    pub product: ItemDetails,
    pub ingredient: ItemDetails,
}

/// Item master entries for every item code a row set mentions.
#[derive(Debug, Default)]
pub struct MetadataJoiner {
    items: HashMap<String, ItemReference>,
}

impl MetadataJoiner {
    /// Fetch all referenced items in one store call.
    pub fn load<'r, S, I>(store: &S, rows: I) -> Result<Self>
    where
        S: ReferenceStore + ?Sized,
        I: IntoIterator<Item = &'r ClosureRow>,
    {
        let mut codes = BTreeSet::new();
        for row in rows {
            codes.insert(row.root_item_code.clone());
            codes.extend(row.product_item_code.iter().cloned());
            codes.extend(row.ingredient_item_code.iter().cloned());
        }
        if codes.is_empty() {
            return Ok(Self::default());
        }
        let codes: Vec<String> = codes.into_iter().collect();
        let items = store.item_references(&codes)?;
        log::debug!("Item master: {} of {} item code(s) found", items.len(), codes.len());
        Ok(Self { items })
    }

    pub fn details(&self, item_code: Option<&str>) -> ItemDetails {
        item_code
            .and_then(|code| self.items.get(code))
            .map(ItemDetails::from)
            .unwrap_or_default()
    }

    pub fn enrich(&self, row: ClosureRow) -> EnrichedRow {
        EnrichedRow {
            root: self.details(Some(&row.root_item_code)),
            product: self.details(row.product_item_code.as_deref()),
            ingredient: self.details(row.ingredient_item_code.as_deref()),
            row,
        }
    }

    pub fn enrich_all(&self, rows: Vec<ClosureRow>) -> Vec<EnrichedRow> {
        rows.into_iter().map(|row| self.enrich(row)).collect()
    }
}
