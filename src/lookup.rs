//! Dropdown-style lookups over the reference store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::store::ReferenceStore;

/// Most item codes a search returns.
pub const ITEM_SEARCH_LIMIT: usize = 500;

/// A `{label, value}` pair for pickers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupOption {
    pub label: String,
    pub value: String,
}

impl LookupOption {
    fn plain(value: &str) -> Self {
        Self {
            label: value.to_string(),
            value: value.to_string(),
        }
    }
}

/// Item codes carry a suffix after the first `-` (pack size, site); the
/// item master is keyed by the part before it.
pub fn item_code_prefix(item_code: &str) -> &str {
    item_code.split('-').next().unwrap_or(item_code)
}

/// Transaction item codes containing `search_text`, labelled with their
/// product code when the item master has one.
pub fn lookup_item_codes<S: ReferenceStore + ?Sized>(
    store: &S,
    search_text: &str,
) -> Result<Vec<LookupOption>> {
    let codes = store.search_item_codes(search_text.trim(), ITEM_SEARCH_LIMIT)?;
    if codes.is_empty() {
        return Ok(Vec::new());
    }

    let mut prefixes: Vec<String> = codes.iter().map(|c| item_code_prefix(c).to_string()).collect();
    prefixes.sort();
    prefixes.dedup();
    let items = store.item_references(&prefixes)?;

    Ok(codes
        .iter()
        .map(|code| {
            let product_code = items
                .get(item_code_prefix(code))
                .and_then(|item| item.product_code.as_deref());
            match product_code {
                Some(pc) => LookupOption {
                    label: format!("{} - {}", pc, code),
                    value: code.clone(),
                },
                None => LookupOption::plain(code),
            }
        })
        .collect())
}

/// Distinct product codes, sorted.
pub fn lookup_product_codes<S: ReferenceStore + ?Sized>(store: &S) -> Result<Vec<LookupOption>> {
    Ok(store
        .product_codes()?
        .iter()
        .map(|code| LookupOption::plain(code))
        .collect())
}

/// Product code per item code. Codes without a master entry (exact or by
/// prefix) or without a product code are left out.
pub fn item_to_product_mapping<S: ReferenceStore + ?Sized>(
    store: &S,
    item_codes: &[String],
) -> Result<BTreeMap<String, String>> {
    let mut wanted: Vec<String> = item_codes
        .iter()
        .flat_map(|code| [code.clone(), item_code_prefix(code).to_string()])
        .collect();
    wanted.sort();
    wanted.dedup();
    if wanted.is_empty() {
        return Ok(BTreeMap::new());
    }
    let items = store.item_references(&wanted)?;

    let mut mapping = BTreeMap::new();
    for code in item_codes {
        let product_code = items
            .get(code)
            .or_else(|| items.get(item_code_prefix(code)))
            .and_then(|item| item.product_code.clone());
        if let Some(pc) = product_code {
            mapping.insert(code.clone(), pc);
        }
    }
    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ItemReference, MaterialTransaction, MemoryStore};

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_transaction(MaterialTransaction::product("B1", "FG100-EU", "L1"))
            .with_transaction(MaterialTransaction::ingredient("B1", "RM7", "L2"))
            .with_transaction(MaterialTransaction::ingredient("B1", "PKG", "L3"))
            .with_item(ItemReference {
                item_code: "FG100".to_string(),
                product_code: Some("PRD-1".to_string()),
                category: None,
                description: None,
                unit_op_name: None,
            })
            .with_item(ItemReference {
                item_code: "RM7".to_string(),
                product_code: None,
                category: Some("Raw".to_string()),
                description: None,
                unit_op_name: None,
            })
    }

    #[test]
    fn test_prefix() {
        assert_eq!(item_code_prefix("FG100-EU"), "FG100");
        assert_eq!(item_code_prefix("RM7"), "RM7");
        assert_eq!(item_code_prefix(""), "");
    }

    #[test]
    fn test_item_labels() {
        let options = lookup_item_codes(&store(), "fg").unwrap();
        assert_eq!(
            options,
            vec![LookupOption {
                label: "PRD-1 - FG100-EU".to_string(),
                value: "FG100-EU".to_string(),
            }]
        );

        let options = lookup_item_codes(&store(), "RM").unwrap();
        assert_eq!(options, vec![LookupOption::plain("RM7")]);
    }

    #[test]
    fn test_no_match() {
        assert!(lookup_item_codes(&store(), "zzz").unwrap().is_empty());
    }

    #[test]
    fn test_product_codes() {
        let options = lookup_product_codes(&store()).unwrap();
        assert_eq!(options, vec![LookupOption::plain("PRD-1")]);
    }

    #[test]
    fn test_mapping() {
        let codes = vec!["FG100-EU".to_string(), "RM7".to_string(), "NOPE".to_string()];
        let mapping = item_to_product_mapping(&store(), &codes).unwrap();
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.get("FG100-EU").map(String::as_str), Some("PRD-1"));
    }
}
