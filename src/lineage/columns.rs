//! Output column selection and aggregation.
//!
//! A column spec is one of:
//! - `default`: every column, one output row per lineage row
//! - `a, b as x, count(*) as n`: the listed columns plus a trailing row count,
//!   grouped by everything selected
//! - `exclude (a, b)` (optionally `* exclude (...)`): every column except the
//!   listed ones, plus the row count

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use super::assemble::LineageRow;
use crate::error::{LineageError, Result};

/// A column of [`LineageRow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Type,
    RootItemCode,
    RootParentLot,
    RootLot,
    RootSupplierLot,
    Level,
    ProductBatchId,
    ProductItemCode,
    ProductLot,
    ProductParentLot,
    IngredientBatchId,
    IngredientItemCode,
    IngredientLot,
    IngredientSupplierLot,
    IngredientParentLot,
    SortOrder,
    RootUnitOpName,
    RootDescription,
    RootCategory,
    ProductUnitOpName,
    ProductDescription,
    ProductCategory,
    IngredientUnitOpName,
    IngredientDescription,
    IngredientCategory,
}

impl Column {
    /// Table order.
    pub const ALL: [Column; 25] = [
        Column::Type,
        Column::RootItemCode,
        Column::RootParentLot,
        Column::RootLot,
        Column::RootSupplierLot,
        Column::Level,
        Column::ProductBatchId,
        Column::ProductItemCode,
        Column::ProductLot,
        Column::ProductParentLot,
        Column::IngredientBatchId,
        Column::IngredientItemCode,
        Column::IngredientLot,
        Column::IngredientSupplierLot,
        Column::IngredientParentLot,
        Column::SortOrder,
        Column::RootUnitOpName,
        Column::RootDescription,
        Column::RootCategory,
        Column::ProductUnitOpName,
        Column::ProductDescription,
        Column::ProductCategory,
        Column::IngredientUnitOpName,
        Column::IngredientDescription,
        Column::IngredientCategory,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::Type => "type",
            Column::RootItemCode => "root_itemcode",
            Column::RootParentLot => "root_parentlot",
            Column::RootLot => "root_lot",
            Column::RootSupplierLot => "root_supplierlot",
            Column::Level => "level",
            Column::ProductBatchId => "product_batchid",
            Column::ProductItemCode => "product_itemcode",
            Column::ProductLot => "product_lot",
            Column::ProductParentLot => "product_parentlot",
            Column::IngredientBatchId => "ingredient_batchid",
            Column::IngredientItemCode => "ingredient_itemcode",
            Column::IngredientLot => "ingredient_lot",
            Column::IngredientSupplierLot => "ingredient_supplierlot",
            Column::IngredientParentLot => "ingredient_parentlot",
            Column::SortOrder => "sortorder",
            Column::RootUnitOpName => "root_unit_op_name",
            Column::RootDescription => "root_description",
            Column::RootCategory => "root_category",
            Column::ProductUnitOpName => "product_unit_op_name",
            Column::ProductDescription => "product_description",
            Column::ProductCategory => "product_category",
            Column::IngredientUnitOpName => "ingredient_unit_op_name",
            Column::IngredientDescription => "ingredient_description",
            Column::IngredientCategory => "ingredient_category",
        }
    }

    /// Case-insensitive lookup by column name.
    pub fn from_name(name: &str) -> Option<Column> {
        Column::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }
}

/// A table cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Int(i64),
    Text(String),
}

impl Cell {
    fn text(value: &str) -> Self {
        Cell::Text(value.to_string())
    }

    fn opt(value: &Option<String>) -> Self {
        value.as_deref().map_or(Cell::Null, Cell::text)
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Int(v) => write!(f, "{}", v),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl LineageRow {
    pub fn cell(&self, column: Column) -> Cell {
        match column {
            Column::Type => Cell::text(self.kind.as_str()),
            Column::RootItemCode => Cell::text(&self.root_itemcode),
            Column::RootParentLot => Cell::opt(&self.root_parentlot),
            Column::RootLot => Cell::text(&self.root_lot),
            Column::RootSupplierLot => Cell::opt(&self.root_supplierlot),
            Column::Level => Cell::Int(i64::from(self.level)),
            Column::ProductBatchId => Cell::text(&self.product_batchid),
            Column::ProductItemCode => Cell::opt(&self.product_itemcode),
            Column::ProductLot => Cell::opt(&self.product_lot),
            Column::ProductParentLot => Cell::opt(&self.product_parentlot),
            Column::IngredientBatchId => Cell::opt(&self.ingredient_batchid),
            Column::IngredientItemCode => Cell::opt(&self.ingredient_itemcode),
            Column::IngredientLot => Cell::opt(&self.ingredient_lot),
            Column::IngredientSupplierLot => Cell::opt(&self.ingredient_supplierlot),
            Column::IngredientParentLot => Cell::opt(&self.ingredient_parentlot),
            Column::SortOrder => Cell::Int(self.sortorder),
            Column::RootUnitOpName => Cell::opt(&self.root_unit_op_name),
            Column::RootDescription => Cell::opt(&self.root_description),
            Column::RootCategory => Cell::opt(&self.root_category),
            Column::ProductUnitOpName => Cell::opt(&self.product_unit_op_name),
            Column::ProductDescription => Cell::opt(&self.product_description),
            Column::ProductCategory => Cell::opt(&self.product_category),
            Column::IngredientUnitOpName => Cell::opt(&self.ingredient_unit_op_name),
            Column::IngredientDescription => Cell::opt(&self.ingredient_description),
            Column::IngredientCategory => Cell::opt(&self.ingredient_category),
        }
    }
}

/// A selected column and its output name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub column: Column,
    pub alias: Option<String>,
}

impl Selection {
    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or_else(|| self.column.name())
    }
}

/// Parsed output column spec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ColumnSpec {
    #[default]
    Default,
    Select {
        columns: Vec<Selection>,
        /// Name from a `count(*) as name` entry, if any.
        count_alias: Option<String>,
    },
    Exclude(Vec<Column>),
}

fn exclude_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)^\s*(?:\*\s*)?exclude\s*\((.*)\)\s*$").expect("valid exclude regex")
    })
}

fn count_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^count\s*\(\s*\*\s*\)(?:\s+as\s+([A-Za-z_][A-Za-z0-9_]*))?$")
            .expect("valid count regex")
    })
}

fn column_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^([A-Za-z_][A-Za-z0-9_]*)(?:\s+as\s+([A-Za-z_][A-Za-z0-9_]*))?$")
            .expect("valid column regex")
    })
}

fn invalid(msg: String) -> LineageError {
    LineageError::InvalidRequest(msg)
}

impl ColumnSpec {
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() || spec.eq_ignore_ascii_case("default") {
            return Ok(ColumnSpec::Default);
        }
        if let Some(caps) = exclude_regex().captures(spec) {
            return Self::parse_exclude(&caps[1]);
        }
        Self::parse_select(spec)
    }

    fn parse_exclude(list: &str) -> Result<Self> {
        let mut excluded = Vec::new();
        for entry in list.split(',').map(str::trim) {
            if entry.is_empty() {
                return Err(invalid("empty entry in exclude list".to_string()));
            }
            let column = Column::from_name(entry)
                .ok_or_else(|| invalid(format!("unknown column '{}'", entry)))?;
            if !excluded.contains(&column) {
                excluded.push(column);
            }
        }
        if excluded.len() == Column::ALL.len() {
            return Err(invalid("exclude list removes every column".to_string()));
        }
        Ok(ColumnSpec::Exclude(excluded))
    }

    fn parse_select(list: &str) -> Result<Self> {
        let mut columns = Vec::new();
        let mut count_alias = None;

        for entry in list.split(',').map(str::trim) {
            if entry.is_empty() {
                return Err(invalid("empty entry in column list".to_string()));
            }
            if let Some(caps) = count_regex().captures(entry) {
                count_alias = caps.get(1).map(|m| m.as_str().to_string());
                continue;
            }
            let caps = column_regex()
                .captures(entry)
                .ok_or_else(|| invalid(format!("malformed column entry '{}'", entry)))?;
            let column = Column::from_name(&caps[1])
                .ok_or_else(|| invalid(format!("unknown column '{}'", &caps[1])))?;
            columns.push(Selection {
                column,
                alias: caps.get(2).map(|m| m.as_str().to_string()),
            });
        }

        if columns.is_empty() {
            return Err(invalid("no columns selected".to_string()));
        }

        let mut names = HashSet::new();
        for selection in &columns {
            if !names.insert(selection.output_name().to_lowercase()) {
                return Err(invalid(format!(
                    "duplicate output column '{}'",
                    selection.output_name()
                )));
            }
        }
        if let Some(alias) = &count_alias {
            if names.contains(&alias.to_lowercase()) {
                return Err(invalid(format!("duplicate output column '{}'", alias)));
            }
        }

        Ok(ColumnSpec::Select { columns, count_alias })
    }
}

impl FromStr for ColumnSpec {
    type Err = LineageError;

    fn from_str(s: &str) -> Result<Self> {
        ColumnSpec::parse(s)
    }
}

/// A projected result table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Project rows through `spec`. Aggregated groups keep first-seen order.
pub fn project(rows: &[LineageRow], spec: &ColumnSpec, count_column: &str) -> Result<Table> {
    let (selected, names, count_name): (Vec<Column>, Vec<String>, String) = match spec {
        ColumnSpec::Default => {
            let table = Table {
                columns: Column::ALL.iter().map(|c| c.name().to_string()).collect(),
                rows: rows
                    .iter()
                    .map(|row| Column::ALL.iter().map(|c| row.cell(*c)).collect())
                    .collect(),
            };
            return Ok(table);
        }
        ColumnSpec::Select { columns, count_alias } => (
            columns.iter().map(|s| s.column).collect(),
            columns.iter().map(|s| s.output_name().to_string()).collect(),
            count_alias.clone().unwrap_or_else(|| count_column.to_string()),
        ),
        ColumnSpec::Exclude(excluded) => {
            let kept: Vec<Column> = Column::ALL
                .iter()
                .copied()
                .filter(|c| !excluded.contains(c))
                .collect();
            let names = kept.iter().map(|c| c.name().to_string()).collect();
            (kept, names, count_column.to_string())
        }
    };

    if names.iter().any(|n| n.eq_ignore_ascii_case(&count_name)) {
        return Err(invalid(format!(
            "count column '{}' clashes with a selected column",
            count_name
        )));
    }

    let mut groups: Vec<(Vec<Cell>, i64)> = Vec::new();
    let mut positions: HashMap<Vec<Cell>, usize> = HashMap::new();
    for row in rows {
        let key: Vec<Cell> = selected.iter().map(|c| row.cell(*c)).collect();
        match positions.get(&key) {
            Some(&i) => groups[i].1 += 1,
            None => {
                positions.insert(key.clone(), groups.len());
                groups.push((key, 1));
            }
        }
    }

    let mut columns = names;
    columns.push(count_name);
    Ok(Table {
        columns,
        rows: groups
            .into_iter()
            .map(|(mut cells, count)| {
                cells.push(Cell::Int(count));
                cells
            })
            .collect(),
    })
}
