pub mod config;
pub mod error;
pub mod db;
pub mod store;
pub mod lineage;
pub mod lookup;
pub mod service;
pub mod http;

pub use config::Config;
pub use error::{LineageError, Result};
pub use lineage::{
    resolve_lineage, trace, ColumnSpec, Direction, EngineSettings, LineageEngine, LineageRequest,
    LineageRow, Table,
};
pub use service::LineageService;
