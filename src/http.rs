use crate::error::LineageError;
use crate::lineage::{LineageQuery, LineageRequest, Table};
use crate::lookup::LookupOption;
use crate::service::LineageService;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// HTTP front end for dashboards
pub struct LineageHttpServer {
    service: Arc<LineageService>,
    allowed_origins: Vec<String>,
}

impl LineageHttpServer {
    pub fn new(service: LineageService, allowed_origins: Vec<String>) -> Self {
        Self {
            service: Arc::new(service),
            allowed_origins,
        }
    }

    /// Run the HTTP server
    pub async fn run(&self, port: u16) -> crate::error::Result<()> {
        let app = self.router();

        let addr = format!("127.0.0.1:{}", port);
        log::info!("Starting lineage HTTP server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            LineageError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to bind to {}: {}. Set http_server.port in config.toml to use another port",
                    addr, e
                ),
            ))
        })?;

        axum::serve(listener, app).await.map_err(|e| {
            LineageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("HTTP server error: {}", e),
            ))
        })?;

        Ok(())
    }

    /// Create the axum router
    pub fn router(&self) -> Router {
        // Empty allowed_origins means any origin
        let cors = if self.allowed_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<axum::http::HeaderValue> = self
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .route("/health", get(handle_health))
            .route("/lineage", post(handle_lineage))
            .route("/items", get(handle_items))
            .route("/product-codes", get(handle_product_codes))
            .route("/item-product-mapping", post(handle_item_product_mapping))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(cors),
            )
            .with_state(AppState {
                service: Arc::clone(&self.service),
            })
    }
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    service: Arc<LineageService>,
}

/// Error response: 400 for caller errors, 500 for everything else
struct ApiError(LineageError);

impl From<LineageError> for ApiError {
    fn from(err: LineageError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_invalid_request() {
            StatusCode::BAD_REQUEST
        } else {
            log::error!("Request failed: {}", self.0);
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (
            status,
            Json(serde_json::json!({
                "error": self.0.kind(),
                "message": self.0.to_string(),
            })),
        )
            .into_response()
    }
}

#[derive(Debug, Deserialize)]
struct ItemSearch {
    #[serde(default)]
    search: String,
}

#[derive(Debug, Deserialize)]
struct MappingRequest {
    item_codes: Vec<String>,
}

async fn handle_health() -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "lotlineage",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
        .into_response()
}

async fn handle_lineage(
    State(state): State<AppState>,
    Json(query): Json<LineageQuery>,
) -> Result<Json<Table>, ApiError> {
    let request_id = Uuid::new_v4();
    log::info!(
        "[{}] POST /lineage: {} seed(s), direction {:?}",
        request_id,
        query.seeds.len(),
        query.direction
    );
    let request = LineageRequest::try_from(query)?;
    let table = state.service.resolve(request).await?;
    log::info!("[{}] {} row(s)", request_id, table.len());
    Ok(Json(table))
}

async fn handle_items(
    State(state): State<AppState>,
    Query(params): Query<ItemSearch>,
) -> Result<Json<Vec<LookupOption>>, ApiError> {
    Ok(Json(state.service.lookup_item_codes(params.search).await?))
}

async fn handle_product_codes(State(state): State<AppState>) -> Result<Json<Vec<LookupOption>>, ApiError> {
    Ok(Json(state.service.lookup_product_codes().await?))
}

async fn handle_item_product_mapping(
    State(state): State<AppState>,
    Json(body): Json<MappingRequest>,
) -> Result<Json<BTreeMap<String, String>>, ApiError> {
    Ok(Json(state.service.item_to_product_mapping(body.item_codes).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{migrate, Db};
    use crate::lineage::{fixtures, EngineSettings};
    use crate::store::{write_reference_data, ReferenceData};
    use tempfile::TempDir;

    async fn state() -> (AppState, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("lineage.db");
        Db::writable(&db_path)
            .with_connection(|conn| {
                migrate::run_bundled_migrations(conn)?;
                let data = ReferenceData {
                    transactions: fixtures::scenario_transactions(),
                    items: fixtures::scenario_items(),
                };
                write_reference_data(conn, &data, true)?;
                Ok(())
            })
            .await
            .unwrap();
        let service = LineageService::new(Db::new(&db_path), EngineSettings::default());
        (
            AppState {
                service: Arc::new(service),
            },
            temp_dir,
        )
    }

    fn query(json: &str) -> LineageQuery {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = handle_health().await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_lineage_ok() {
        let (state, _temp) = state().await;
        let Json(table) = handle_lineage(
            State(state),
            Json(query(r#"{"seeds": ["LOT-RAW-1"], "direction": "trc", "columns": "level"}"#)),
        )
        .await
        .ok()
        .unwrap();
        assert_eq!(table.columns, vec!["level", "CntRecs"]);
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_request_is_400() {
        let (state, _temp) = state().await;
        let err = handle_lineage(
            State(state.clone()),
            Json(query(r#"{"seeds": ["LOT-FG-1"], "columns": "no_such_column"}"#)),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);

        let err = handle_lineage(State(state), Json(query(r#"{"seeds": ["LOT-FG-1"], "max_depth": 0}"#)))
            .await
            .err()
            .unwrap();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_empty_seeds_give_empty_table() {
        let (state, _temp) = state().await;
        let Json(table) = handle_lineage(State(state), Json(query(r#"{"seeds": []}"#)))
            .await
            .ok()
            .unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_store_failure_is_500() {
        let response = ApiError(LineageError::Query("database task failed".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_lookups() {
        let (state, _temp) = state().await;
        let Json(items) = handle_items(
            State(state.clone()),
            Query(ItemSearch {
                search: "fg".to_string(),
            }),
        )
        .await
        .ok()
        .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].label, "PC-100 - FG");

        let Json(mapping) = handle_item_product_mapping(
            State(state),
            Json(MappingRequest {
                item_codes: vec!["RM".to_string()],
            }),
        )
        .await
        .ok()
        .unwrap();
        assert_eq!(mapping.get("RM").map(String::as_str), Some("PC-100"));
    }

    #[test]
    fn test_router_builds() {
        let temp_dir = TempDir::new().unwrap();
        let service = LineageService::new(Db::new(temp_dir.path().join("x.db")), EngineSettings::default());
        let server = LineageHttpServer::new(service, vec!["http://localhost:8050".to_string()]);
        let _router = server.router();
    }
}
