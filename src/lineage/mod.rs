//! Lineage pipeline: seeds to an enriched, projected lineage table.
//!
//! A request flows through identifier resolution, edge loading, the bounded
//! closure in each requested direction, the optional target filter, item
//! master enrichment and finally assembly and projection. Every intermediate
//! lives in a per-request [`Workspace`]; nothing is cached across calls.

pub mod assemble;
pub mod closure;
pub mod columns;
pub mod edges;
pub mod metadata;
pub mod resolver;
pub mod target;

pub use assemble::{LineageRow, TraceKind};
pub use closure::{ClosureEngine, ClosureRow, ClosureStats};
pub use columns::{Cell, Column, ColumnSpec, Table};
pub use edges::{BatchEdge, BatchEdgeIndex};
pub use resolver::{NodeType, ResolvedSeeds, SeedNode};
pub use target::TargetFilter;

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LineageError, Result};
use crate::store::ReferenceStore;
use metadata::MetadataJoiner;

/// Depth used when neither the request nor the configuration names one.
pub const DEFAULT_MAX_DEPTH: u32 = 99;

/// Traversal direction(s) of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Downward: what went into the seed lot.
    Genealogy,
    /// Upward: where the seed lot was consumed.
    Traceability,
    #[default]
    Both,
}

impl Direction {
    pub fn includes_genealogy(&self) -> bool {
        matches!(self, Direction::Genealogy | Direction::Both)
    }

    pub fn includes_traceability(&self) -> bool {
        matches!(self, Direction::Traceability | Direction::Both)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Genealogy => "gen",
            Direction::Traceability => "trc",
            Direction::Both => "all",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = LineageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gen" | "genealogy" => Ok(Direction::Genealogy),
            "trc" | "traceability" => Ok(Direction::Traceability),
            "all" | "both" => Ok(Direction::Both),
            "" => Err(LineageError::InvalidRequest(
                "no traversal direction specified".to_string(),
            )),
            other => Err(LineageError::InvalidRequest(format!(
                "unknown direction '{}' (expected gen, trc or all)",
                other
            ))),
        }
    }
}

/// Engine-wide settings, normally taken from the `[traversal]` and
/// `[output]` config sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub default_max_depth: u32,
    pub max_depth_limit: u32,
    pub cycle_guard: bool,
    pub count_column: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_max_depth: DEFAULT_MAX_DEPTH,
            max_depth_limit: DEFAULT_MAX_DEPTH,
            cycle_guard: true,
            count_column: "CntRecs".to_string(),
        }
    }
}

/// A lineage query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineageRequest {
    pub seeds: Vec<String>,
    pub targets: Option<Vec<String>>,
    pub direction: Direction,
    /// `None` uses the configured default depth.
    pub max_depth: Option<u32>,
    pub columns: ColumnSpec,
}

impl LineageRequest {
    pub fn new<I, S>(seeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            seeds: seeds.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = Some(targets.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn with_columns(mut self, columns: ColumnSpec) -> Self {
        self.columns = columns;
        self
    }
}

/// Wire form of a [`LineageRequest`], with direction and columns as text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LineageQuery {
    pub seeds: Vec<String>,
    #[serde(default)]
    pub targets: Option<Vec<String>>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub max_depth: Option<u32>,
    #[serde(default)]
    pub columns: Option<String>,
}

impl TryFrom<LineageQuery> for LineageRequest {
    type Error = LineageError;

    fn try_from(query: LineageQuery) -> Result<Self> {
        let direction = match query.direction.as_deref() {
            Some(d) => d.parse()?,
            None => Direction::Both,
        };
        let columns = match query.columns.as_deref() {
            Some(c) => c.parse()?,
            None => ColumnSpec::Default,
        };
        Ok(Self {
            seeds: query.seeds,
            targets: query.targets,
            direction,
            max_depth: query.max_depth,
            columns,
        })
    }
}

/// Intermediates of one request.
struct Workspace {
    id: Uuid,
    started: Instant,
    depth: u32,
    seeds: ResolvedSeeds,
    index: BatchEdgeIndex,
    genealogy: Option<Vec<ClosureRow>>,
    traceability: Option<Vec<ClosureRow>>,
}

impl Workspace {
    fn new(depth: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            started: Instant::now(),
            depth,
            seeds: ResolvedSeeds::default(),
            index: BatchEdgeIndex::default(),
            genealogy: None,
            traceability: None,
        }
    }

    fn close(&mut self, direction: Direction, cycle_guard: bool) {
        let engine = ClosureEngine::new(&self.index, self.depth, cycle_guard);
        if direction.includes_genealogy() {
            let (rows, stats) = engine.genealogy(&self.seeds.genealogy);
            log::debug!(
                "[{}] genealogy: {} row(s), deepest level {}",
                self.id,
                stats.rows,
                stats.deepest_level
            );
            self.genealogy = Some(rows);
        }
        if direction.includes_traceability() {
            let (rows, stats) = engine.traceability(&self.seeds.traceability);
            log::debug!(
                "[{}] traceability: {} row(s), deepest level {}",
                self.id,
                stats.rows,
                stats.deepest_level
            );
            self.traceability = Some(rows);
        }
    }

    fn apply_targets(&mut self, filter: &TargetFilter) {
        if let Some(rows) = self.genealogy.as_mut() {
            filter.retain_genealogy(rows);
        }
        if let Some(rows) = self.traceability.as_mut() {
            filter.retain_traceability(rows);
        }
    }
}

/// Runs lineage requests against any [`ReferenceStore`].
#[derive(Debug, Clone, Default)]
pub struct LineageEngine {
    settings: EngineSettings,
}

impl LineageEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Effective depth for a request, or why it is rejected.
    pub fn effective_depth(&self, request: &LineageRequest) -> Result<u32> {
        let depth = request.max_depth.unwrap_or(self.settings.default_max_depth);
        if depth == 0 {
            return Err(LineageError::InvalidRequest(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if depth > self.settings.max_depth_limit {
            return Err(LineageError::InvalidRequest(format!(
                "max_depth {} exceeds the limit of {}",
                depth, self.settings.max_depth_limit
            )));
        }
        Ok(depth)
    }

    /// Typed lineage rows, unprojected.
    pub fn trace<S: ReferenceStore + ?Sized>(
        &self,
        store: &S,
        request: &LineageRequest,
    ) -> Result<Vec<LineageRow>> {
        let depth = self.effective_depth(request)?;

        let mut ws = Workspace::new(depth);
        log::debug!(
            "[{}] lineage request: {} seed(s), direction {}, depth {}",
            ws.id,
            request.seeds.len(),
            request.direction,
            depth
        );

        ws.seeds = resolver::resolve_seeds(store, &request.seeds, request.direction)?;
        ws.index = BatchEdgeIndex::load(store, &ws.seeds, depth)?;
        ws.close(request.direction, self.settings.cycle_guard);

        let filter = TargetFilter::resolve(store, request.targets.as_deref())?;
        ws.apply_targets(&filter);

        let joiner = MetadataJoiner::load(
            store,
            ws.genealogy.iter().flatten().chain(ws.traceability.iter().flatten()),
        )?;
        let genealogy = ws.genealogy.take().map(|rows| joiner.enrich_all(rows));
        let traceability = ws.traceability.take().map(|rows| joiner.enrich_all(rows));
        let rows = assemble::assemble(genealogy, traceability)?;

        log::debug!(
            "[{}] {} lineage row(s) in {:?}",
            ws.id,
            rows.len(),
            ws.started.elapsed()
        );
        Ok(rows)
    }

    /// Lineage rows projected through the request's column spec.
    pub fn resolve<S: ReferenceStore + ?Sized>(
        &self,
        store: &S,
        request: &LineageRequest,
    ) -> Result<Table> {
        let rows = self.trace(store, request)?;
        columns::project(&rows, &request.columns, &self.settings.count_column)
    }
}

/// [`LineageEngine::trace`] with default settings.
pub fn trace<S: ReferenceStore + ?Sized>(store: &S, request: &LineageRequest) -> Result<Vec<LineageRow>> {
    LineageEngine::default().trace(store, request)
}

/// [`LineageEngine::resolve`] with default settings.
pub fn resolve_lineage<S: ReferenceStore + ?Sized>(store: &S, request: &LineageRequest) -> Result<Table> {
    LineageEngine::default().resolve(store, request)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::store::{ItemReference, MaterialTransaction, MemoryStore};

    /// FG is made in B1 from RM; RM is made in B2 from bought-in RAW.
    pub fn scenario_transactions() -> Vec<MaterialTransaction> {
        vec![
            MaterialTransaction::product("B1", "FG", "LOT-FG-1"),
            MaterialTransaction::ingredient("B1", "RM", "LOT-RM-1"),
            MaterialTransaction::product("B2", "RM", "LOT-RM-1"),
            MaterialTransaction::ingredient("B2", "RAW", "LOT-RAW-1").with_supplier_lot("SUP-7"),
        ]
    }

    pub fn scenario_items() -> Vec<ItemReference> {
        vec![
            ItemReference {
                item_code: "FG".to_string(),
                product_code: Some("PC-100".to_string()),
                category: Some("Finished".to_string()),
                description: Some("Finished good".to_string()),
                unit_op_name: Some("Packaging".to_string()),
            },
            ItemReference {
                item_code: "RM".to_string(),
                product_code: Some("PC-100".to_string()),
                category: Some("Intermediate".to_string()),
                description: Some("Blended powder".to_string()),
                unit_op_name: Some("Blending".to_string()),
            },
        ]
    }

    pub fn scenario_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        for txn in scenario_transactions() {
            store.add_transaction(txn);
        }
        for item in scenario_items() {
            store.add_item(item);
        }
        store
    }

    /// Linear chain: batch Bi makes LOT-i from LOT-(i+1); LOT-n is bought in.
    pub fn chain_transactions(n: usize) -> Vec<MaterialTransaction> {
        let mut txns = Vec::new();
        for i in 0..n {
            let batch = format!("B{}", i);
            txns.push(MaterialTransaction::product(&batch, &format!("ITEM-{}", i), &format!("LOT-{}", i)));
            txns.push(MaterialTransaction::ingredient(
                &batch,
                &format!("ITEM-{}", i + 1),
                &format!("LOT-{}", i + 1),
            ));
        }
        txns
    }

    /// B0 makes L0 from L1, B1 makes L1 from L2, B2 makes L2. Z also
    /// consumes L1, making LZ.
    pub fn overlap_transactions() -> Vec<MaterialTransaction> {
        vec![
            MaterialTransaction::product("B0", "I0", "L0"),
            MaterialTransaction::ingredient("B0", "I1", "L1"),
            MaterialTransaction::product("B1", "I1", "L1"),
            MaterialTransaction::ingredient("B1", "I2", "L2"),
            MaterialTransaction::product("B2", "I2", "L2"),
            MaterialTransaction::product("Z", "IZ", "LZ"),
            MaterialTransaction::ingredient("Z", "I1", "L1"),
        ]
    }

    pub fn overlap_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        for txn in overlap_transactions() {
            store.add_transaction(txn);
        }
        store
    }

    /// `layers` layers of `width` batches. Batch Bi_j makes Li_j and consumes
    /// every lot of layer i+1; the last layer consumes nothing. The number of
    /// distinct paths grows as width^layers.
    pub fn lattice_transactions(layers: usize, width: usize) -> Vec<MaterialTransaction> {
        let mut txns = Vec::new();
        for i in 0..layers {
            for j in 0..width {
                let batch = format!("B{}_{}", i, j);
                txns.push(MaterialTransaction::product(&batch, &format!("I{}_{}", i, j), &format!("L{}_{}", i, j)));
                if i + 1 < layers {
                    for k in 0..width {
                        txns.push(MaterialTransaction::ingredient(
                            &batch,
                            &format!("I{}_{}", i + 1, k),
                            &format!("L{}_{}", i + 1, k),
                        ));
                    }
                }
            }
        }
        txns
    }

    pub fn lattice_store(layers: usize, width: usize) -> MemoryStore {
        let mut store = MemoryStore::new();
        for txn in lattice_transactions(layers, width) {
            store.add_transaction(txn);
        }
        store
    }

    /// A makes LX from LY; B makes LY from LX.
    pub fn cycle_transactions() -> Vec<MaterialTransaction> {
        vec![
            MaterialTransaction::product("A", "X", "LX"),
            MaterialTransaction::ingredient("A", "Y", "LY"),
            MaterialTransaction::product("B", "Y", "LY"),
            MaterialTransaction::ingredient("B", "X", "LX"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_direction_parse() {
        assert_eq!("gen".parse::<Direction>().unwrap(), Direction::Genealogy);
        assert_eq!("Traceability".parse::<Direction>().unwrap(), Direction::Traceability);
        assert_eq!("ALL".parse::<Direction>().unwrap(), Direction::Both);
        let err = "".parse::<Direction>().unwrap_err();
        assert!(err.to_string().contains("no traversal direction specified"));
        assert!("sideways".parse::<Direction>().unwrap_err().is_invalid_request());
    }

    #[test]
    fn test_genealogy_scenario() {
        let store = fixtures::scenario_store();
        let request = LineageRequest::new(["LOT-FG-1"]).with_direction(Direction::Genealogy);
        let rows = trace(&store, &request).unwrap();

        assert_eq!(rows.len(), 2);
        let level1 = rows.iter().find(|r| r.level == 1).unwrap();
        assert_eq!(level1.kind, TraceKind::Gen);
        assert_eq!(level1.root_itemcode, "FG");
        assert_eq!(level1.root_lot, "LOT-FG-1");
        assert_eq!(level1.product_itemcode.as_deref(), Some("FG"));
        assert_eq!(level1.product_lot.as_deref(), Some("LOT-FG-1"));
        assert_eq!(level1.ingredient_itemcode.as_deref(), Some("RM"));
        assert_eq!(level1.ingredient_lot.as_deref(), Some("LOT-RM-1"));

        let level2 = rows.iter().find(|r| r.level == 2).unwrap();
        assert_eq!(level2.product_itemcode.as_deref(), Some("RM"));
        assert_eq!(level2.product_lot.as_deref(), Some("LOT-RM-1"));
        assert_eq!(level2.ingredient_itemcode.as_deref(), Some("RAW"));
        assert_eq!(level2.ingredient_lot.as_deref(), Some("LOT-RAW-1"));
    }

    #[test]
    fn test_traceability_scenario() {
        let store = fixtures::scenario_store();
        let request = LineageRequest::new(["LOT-RAW-1"]).with_direction(Direction::Traceability);
        let rows = trace(&store, &request).unwrap();

        assert_eq!(rows.len(), 2);
        let level1 = &rows[0];
        assert_eq!(level1.kind, TraceKind::Trc);
        assert_eq!(level1.root_itemcode, "RAW");
        assert_eq!(level1.product_itemcode.as_deref(), Some("RM"));
        assert_eq!(level1.product_lot.as_deref(), Some("LOT-RM-1"));
        assert_eq!(level1.ingredient_itemcode.as_deref(), Some("RAW"));
        assert_eq!(level1.ingredient_lot.as_deref(), Some("LOT-RAW-1"));

        let level2 = &rows[1];
        assert_eq!(level2.level, 2);
        assert_eq!(level2.product_itemcode.as_deref(), Some("FG"));
        assert_eq!(level2.product_lot.as_deref(), Some("LOT-FG-1"));
    }

    #[test]
    fn test_genealogy_with_target() {
        let store = fixtures::scenario_store();
        let request = LineageRequest::new(["LOT-FG-1"])
            .with_direction(Direction::Genealogy)
            .with_targets(["LOT-RAW-1"]);
        let rows = trace(&store, &request).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].level, 2);
        assert_eq!(rows[0].ingredient_lot.as_deref(), Some("LOT-RAW-1"));
    }

    #[test]
    fn test_unknown_seed_is_empty() {
        let store = fixtures::scenario_store();
        let rows = trace(&store, &LineageRequest::new(["NOT-EXIST"])).unwrap();
        assert!(rows.is_empty());

        let table = resolve_lineage(&store, &LineageRequest::new(["NOT-EXIST"])).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns.len(), Column::ALL.len());
    }

    #[test]
    fn test_empty_seeds_yield_nothing() {
        let store = fixtures::scenario_store();
        assert!(trace(&store, &LineageRequest::new(Vec::<String>::new())).unwrap().is_empty());
        assert!(trace(&store, &LineageRequest::new(["  ", ""])).unwrap().is_empty());

        let table = resolve_lineage(&store, &LineageRequest::new(["  "])).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_depth_validation() {
        let store = fixtures::scenario_store();
        let zero = LineageRequest::new(["LOT-FG-1"]).with_max_depth(0);
        assert!(trace(&store, &zero).unwrap_err().is_invalid_request());

        let engine = LineageEngine::new(EngineSettings {
            default_max_depth: 5,
            max_depth_limit: 10,
            ..EngineSettings::default()
        });
        let deep = LineageRequest::new(["LOT-FG-1"]).with_max_depth(11);
        assert!(engine.trace(&store, &deep).unwrap_err().is_invalid_request());
        assert_eq!(engine.effective_depth(&LineageRequest::new(["x"])).unwrap(), 5);
    }

    #[test]
    fn test_depth_bound_and_level_monotonicity() {
        let mut store = MemoryStore::new();
        for txn in fixtures::chain_transactions(20) {
            store.add_transaction(txn);
        }
        let request = LineageRequest::new(["LOT-0"])
            .with_direction(Direction::Genealogy)
            .with_max_depth(7);
        let rows = trace(&store, &request).unwrap();
        assert_eq!(rows.len(), 7);
        assert!(rows.iter().all(|r| r.level >= 1 && r.level <= 7));

        // Each level-(n+1) product is an ingredient at level n on the same root
        for row in rows.iter().filter(|r| r.level > 1) {
            let parent = rows
                .iter()
                .find(|p| p.level == row.level - 1 && p.ingredient_lot == row.product_lot)
                .unwrap();
            assert_eq!(parent.root_lot, row.root_lot);
        }
    }

    #[test]
    fn test_idempotent() {
        let store = fixtures::scenario_store();
        let request = LineageRequest::new(["LOT-RM-1"]);
        let first = resolve_lineage(&store, &request).unwrap();
        let second = resolve_lineage(&store, &request).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_direction_duality() {
        let mut store = MemoryStore::new();
        for txn in fixtures::chain_transactions(4) {
            store.add_transaction(txn);
        }
        let gen = trace(&store, &LineageRequest::new(["LOT-0"]).with_direction(Direction::Genealogy))
            .unwrap();
        let reached = gen.iter().find(|r| r.level == 3).unwrap();
        let lot = reached.ingredient_lot.clone().unwrap();
        assert_eq!(lot, "LOT-3");

        let trc = trace(&store, &LineageRequest::new([lot]).with_direction(Direction::Traceability))
            .unwrap();
        assert!(trc.iter().any(|r| r.product_lot.as_deref() == Some("LOT-0")));
    }

    #[test]
    fn test_both_directions_from_intermediate() {
        let store = fixtures::scenario_store();
        let rows = trace(&store, &LineageRequest::new(["LOT-RM-1"])).unwrap();
        let kinds: Vec<TraceKind> = rows.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![TraceKind::Gen, TraceKind::Trc]);
        assert_eq!(rows[0].ingredient_lot.as_deref(), Some("LOT-RAW-1"));
        assert_eq!(rows[1].product_lot.as_deref(), Some("LOT-FG-1"));
        assert_eq!(rows[1].ingredient_description.as_deref(), Some("Blended powder"));
    }

    #[test]
    fn test_both_directions_match_single_direction_runs() {
        let store = fixtures::overlap_store();
        let seeds = ["L0", "L2"];
        let both = trace(&store, &LineageRequest::new(seeds)).unwrap();
        let up = trace(&store, &LineageRequest::new(seeds).with_direction(Direction::Traceability)).unwrap();
        let down = trace(&store, &LineageRequest::new(seeds).with_direction(Direction::Genealogy)).unwrap();

        let trc: Vec<&LineageRow> = both.iter().filter(|r| r.kind == TraceKind::Trc).collect();
        let gen: Vec<&LineageRow> = both.iter().filter(|r| r.kind == TraceKind::Gen).collect();
        assert_eq!(trc, up.iter().collect::<Vec<_>>());
        assert_eq!(gen, down.iter().collect::<Vec<_>>());

        let reached: Vec<(u32, Option<&str>)> = up.iter().map(|r| (r.level, r.product_lot.as_deref())).collect();
        assert_eq!(reached, vec![(1, Some("L1")), (2, Some("L0")), (2, Some("LZ"))]);
    }

    #[test]
    fn test_default_settings_on_rejoining_paths() {
        let store = fixtures::lattice_store(22, 2);
        let started = Instant::now();
        let rows = trace(&store, &LineageRequest::new(["L0_0"]).with_direction(Direction::Genealogy)).unwrap();
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
        assert_eq!(rows.len(), 82);
        assert!(rows.iter().all(|r| r.root_lot == "L0_0"));
    }

    #[test]
    fn test_cycle_guard_setting() {
        let mut store = MemoryStore::new();
        for txn in fixtures::cycle_transactions() {
            store.add_transaction(txn);
        }
        let request = LineageRequest::new(["LX"]).with_direction(Direction::Genealogy);

        let guarded = trace(&store, &request).unwrap();
        assert_eq!(guarded.len(), 2);

        let unguarded = LineageEngine::new(EngineSettings {
            cycle_guard: false,
            ..EngineSettings::default()
        });
        let rows = unguarded.trace(&store, &request.clone().with_max_depth(6)).unwrap();
        assert_eq!(rows.len(), 6);
    }

    #[test]
    fn test_resolve_projects_columns() {
        let store = fixtures::scenario_store();
        let request = LineageRequest::new(["LOT-FG-1"])
            .with_direction(Direction::Genealogy)
            .with_columns(ColumnSpec::parse("type, count(*) as n").unwrap());
        let table = resolve_lineage(&store, &request).unwrap();
        assert_eq!(table.columns, vec!["type", "n"]);
        assert_eq!(table.rows, vec![vec![Cell::Text("Gen".to_string()), Cell::Int(2)]]);
    }

    #[test]
    fn test_query_conversion() {
        let query: LineageQuery = serde_json::from_str(
            r#"{"seeds": ["LOT-FG-1"], "direction": "gen", "columns": "exclude (sortorder)"}"#,
        )
        .unwrap();
        let request = LineageRequest::try_from(query).unwrap();
        assert_eq!(request.direction, Direction::Genealogy);
        assert_eq!(request.columns, ColumnSpec::Exclude(vec![Column::SortOrder]));
        assert_eq!(request.max_depth, None);

        let bad: LineageQuery = serde_json::from_str(r#"{"seeds": ["x"], "direction": ""}"#).unwrap();
        assert!(LineageRequest::try_from(bad).unwrap_err().is_invalid_request());
    }
}
