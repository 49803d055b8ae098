//! Union of genealogy and traceability rows into flat result rows.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::metadata::{EnrichedRow, ItemDetails};
use crate::error::{LineageError, Result};

/// Which traversal produced a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TraceKind {
    Gen,
    Trc,
}

impl TraceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceKind::Gen => "Gen",
            TraceKind::Trc => "Trc",
        }
    }
}

impl fmt::Display for TraceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One result row, with the column names the lineage table exposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LineageRow {
    #[serde(rename = "type")]
    pub kind: TraceKind,
    pub root_itemcode: String,
    pub root_parentlot: Option<String>,
    pub root_lot: String,
    pub root_supplierlot: Option<String>,
    pub level: u32,
    pub product_batchid: String,
    pub product_itemcode: Option<String>,
    pub product_lot: Option<String>,
    pub product_parentlot: Option<String>,
    pub ingredient_batchid: Option<String>,
    pub ingredient_itemcode: Option<String>,
    pub ingredient_lot: Option<String>,
    pub ingredient_supplierlot: Option<String>,
    pub ingredient_parentlot: Option<String>,
    /// Negative levels for genealogy, so a sorted table reads from raw
    /// material up to finished goods.
    pub sortorder: i64,
    pub root_unit_op_name: Option<String>,
    pub root_description: Option<String>,
    pub root_category: Option<String>,
    pub product_unit_op_name: Option<String>,
    pub product_description: Option<String>,
    pub product_category: Option<String>,
    pub ingredient_unit_op_name: Option<String>,
    pub ingredient_description: Option<String>,
    pub ingredient_category: Option<String>,
}

impl LineageRow {
    fn from_enriched(kind: TraceKind, enriched: EnrichedRow) -> Self {
        let EnrichedRow {
            row,
            root,
            product,
            mut ingredient,
        } = enriched;

        let sortorder = match kind {
            TraceKind::Gen => -i64::from(row.level),
            TraceKind::Trc => i64::from(row.level),
        };

        let mut out = Self {
            kind,
            root_itemcode: row.root_item_code,
            root_parentlot: row.root_parent_lot,
            root_lot: row.root_lot,
            root_supplierlot: row.root_supplier_lot,
            level: row.level,
            product_batchid: row.product_batch_id,
            product_itemcode: row.product_item_code,
            product_lot: row.product_lot,
            product_parentlot: row.product_parent_lot,
            ingredient_batchid: row.ingredient_batch_id,
            ingredient_itemcode: row.ingredient_item_code,
            ingredient_lot: row.ingredient_lot,
            ingredient_supplierlot: row.ingredient_supplier_lot,
            ingredient_parentlot: row.ingredient_parent_lot,
            sortorder,
            root_unit_op_name: None,
            root_description: None,
            root_category: None,
            product_unit_op_name: product.unit_op_name,
            product_description: product.description,
            product_category: product.category,
            ingredient_unit_op_name: None,
            ingredient_description: None,
            ingredient_category: None,
        };

        // A first-hop where-used row has no ingredient of its own: it reports
        // the seed material in that role.
        if kind == TraceKind::Trc && out.level == 1 {
            out.ingredient_itemcode = Some(out.root_itemcode.clone());
            out.ingredient_lot = Some(out.root_lot.clone());
            out.ingredient_supplierlot = out.root_supplierlot.clone();
            out.ingredient_parentlot = out.root_parentlot.clone();
            ingredient = root.clone();
        }

        out.set_root_details(root);
        out.set_ingredient_details(ingredient);
        out
    }

    fn set_root_details(&mut self, details: ItemDetails) {
        self.root_unit_op_name = details.unit_op_name;
        self.root_description = details.description;
        self.root_category = details.category;
    }

    fn set_ingredient_details(&mut self, details: ItemDetails) {
        self.ingredient_unit_op_name = details.unit_op_name;
        self.ingredient_description = details.description;
        self.ingredient_category = details.category;
    }
}

/// Union both directions and order the result.
///
/// `None` means the direction was not requested; an empty vector means it was
/// requested and found nothing.
pub fn assemble(
    genealogy: Option<Vec<EnrichedRow>>,
    traceability: Option<Vec<EnrichedRow>>,
) -> Result<Vec<LineageRow>> {
    if genealogy.is_none() && traceability.is_none() {
        return Err(LineageError::InvalidRequest(
            "no traversal direction specified".to_string(),
        ));
    }

    let mut rows: Vec<LineageRow> = genealogy
        .into_iter()
        .flatten()
        .map(|r| LineageRow::from_enriched(TraceKind::Gen, r))
        .chain(
            traceability
                .into_iter()
                .flatten()
                .map(|r| LineageRow::from_enriched(TraceKind::Trc, r)),
        )
        .collect();

    rows.sort_by(|a, b| a.sortorder.cmp(&b.sortorder).then_with(|| a.cmp(b)));
    rows.dedup();
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineage::closure::ClosureEngine;
    use crate::lineage::edges::BatchEdgeIndex;
    use crate::lineage::fixtures;
    use crate::lineage::metadata::MetadataJoiner;
    use crate::lineage::resolver::{genealogy_seeds, traceability_seeds};

    fn enriched(trace: bool) -> Vec<EnrichedRow> {
        let store = fixtures::scenario_store();
        let index = BatchEdgeIndex::from_transactions(fixtures::scenario_transactions());
        let engine = ClosureEngine::new(&index, 99, true);
        let (rows, _) = if trace {
            let seeds = traceability_seeds(&store, &["LOT-RAW-1".to_string()]).unwrap();
            engine.traceability(&seeds)
        } else {
            let seeds = genealogy_seeds(&store, &["LOT-FG-1".to_string()]).unwrap();
            engine.genealogy(&seeds)
        };
        MetadataJoiner::load(&store, &rows).unwrap().enrich_all(rows)
    }

    #[test]
    fn test_no_direction_is_invalid() {
        let err = assemble(None, None).unwrap_err();
        assert!(err.is_invalid_request());
        assert!(err.to_string().contains("no traversal direction specified"));
    }

    #[test]
    fn test_requested_but_empty_is_ok() {
        let rows = assemble(Some(vec![]), None).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_trc_level_one_collapses_to_root() {
        let rows = assemble(None, Some(enriched(true))).unwrap();
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(first.kind, TraceKind::Trc);
        assert_eq!(first.sortorder, 1);
        assert_eq!(first.ingredient_itemcode.as_deref(), Some("RAW"));
        assert_eq!(first.ingredient_lot.as_deref(), Some("LOT-RAW-1"));
        assert_eq!(first.ingredient_supplierlot.as_deref(), Some("SUP-7"));
        assert_eq!(first.ingredient_batchid, None);
        assert_eq!(first.product_itemcode.as_deref(), Some("RM"));

        let second = &rows[1];
        assert_eq!(second.sortorder, 2);
        assert_eq!(second.ingredient_lot.as_deref(), Some("LOT-RM-1"));
        assert_eq!(second.ingredient_unit_op_name.as_deref(), Some("Blending"));
    }

    #[test]
    fn test_union_order() {
        let rows = assemble(Some(enriched(false)), Some(enriched(true))).unwrap();
        let order: Vec<(TraceKind, i64)> = rows.iter().map(|r| (r.kind, r.sortorder)).collect();
        assert_eq!(
            order,
            vec![
                (TraceKind::Gen, -2),
                (TraceKind::Gen, -1),
                (TraceKind::Trc, 1),
                (TraceKind::Trc, 2),
            ]
        );
        assert_eq!(rows[1].root_description.as_deref(), Some("Finished good"));
    }

    #[test]
    fn test_row_json_uses_column_names() {
        let rows = assemble(Some(enriched(false)), None).unwrap();
        let value = serde_json::to_value(&rows[0]).unwrap();
        assert_eq!(value["type"], "Gen");
        assert_eq!(value["root_itemcode"], "FG");
        assert_eq!(value["sortorder"], -2);
        assert!(value["ingredient_batchid"].is_null());
    }
}
