//! Async facade over the SQLite reference store.
//!
//! Each call opens its own read-only connection on a blocking worker, so
//! concurrent requests share nothing but the database file.

use std::collections::BTreeMap;

use crate::db::{self, Db, SchemaReport};
use crate::error::Result;
use crate::lineage::{EngineSettings, LineageEngine, LineageRequest, LineageRow, Table};
use crate::lookup::{self, LookupOption};
use crate::store::SqliteStore;

/// Lineage and lookup queries against one database.
#[derive(Debug, Clone)]
pub struct LineageService {
    db: Db,
    engine: LineageEngine,
}

impl LineageService {
    pub fn new(db: Db, settings: EngineSettings) -> Self {
        Self {
            db,
            engine: LineageEngine::new(settings),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        self.engine.settings()
    }

    /// Projected lineage table.
    pub async fn resolve(&self, request: LineageRequest) -> Result<Table> {
        let engine = self.engine.clone();
        self.db
            .with_connection(move |conn| engine.resolve(&SqliteStore::new(conn), &request))
            .await
    }

    /// Typed lineage rows.
    pub async fn trace(&self, request: LineageRequest) -> Result<Vec<LineageRow>> {
        let engine = self.engine.clone();
        self.db
            .with_connection(move |conn| engine.trace(&SqliteStore::new(conn), &request))
            .await
    }

    pub async fn lookup_item_codes(&self, search_text: String) -> Result<Vec<LookupOption>> {
        self.db
            .with_connection(move |conn| lookup::lookup_item_codes(&SqliteStore::new(conn), &search_text))
            .await
    }

    pub async fn lookup_product_codes(&self) -> Result<Vec<LookupOption>> {
        self.db
            .with_connection(|conn| lookup::lookup_product_codes(&SqliteStore::new(conn)))
            .await
    }

    pub async fn item_to_product_mapping(&self, item_codes: Vec<String>) -> Result<BTreeMap<String, String>> {
        self.db
            .with_connection(move |conn| lookup::item_to_product_mapping(&SqliteStore::new(conn), &item_codes))
            .await
    }

    /// Schema and row counts of the configured database.
    pub async fn verify(&self) -> Result<SchemaReport> {
        self.db.with_connection(|conn| db::verify_schema(conn)).await
    }
}
