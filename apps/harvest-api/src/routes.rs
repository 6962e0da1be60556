//! Route handlers for the dashboard API.
//!
//! ```text
//!   GET  /health                      database reachability
//!   GET  /data/{table}?limit=N        { data, total }, newest first
//!   GET  /sync/all                    { results: { resource: report } }
//!   GET  /sync/{resource}             { synced, type, errors? }
//!   GET  /auth/login                  { authUrl, state }
//!   GET  /auth/callback?code=&state=  HTML page
//!   GET  /auth/refresh                { success, expiresAt }
//!   GET  /auth/status                 { connected, isExpired?, ... }
//!   GET  /auth/connect-org            { connectUrl }
//!   GET  /auth/check-org              { organizations, needsConnection }
//!   POST /proxy                       raw vendor JSON or error descriptor
//!   GET  /inventory                   items with isLowStock
//!   POST /inventory                   upsert one item
//!   GET  /spray-applications?fieldId= applications of one field
//!   POST /spray-applications          manual application, decrements stock
//! ```

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use harvest_core::{
    DataTable, InventoryItemStatus, InventoryUpdate, ManualSprayLog, ResourceKind,
    SprayApplication,
};
use harvest_db::{TablePage, MAX_PAGE_ROWS};
use harvest_sync::{
    AuthStatus, AuthorizationRequest, OrganizationAccess, SyncAllReport, SyncError, SyncReport,
};

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        // Mirror reads
        .route("/data/{table}", get(read_table))
        // Sync triggers
        .route("/sync/all", get(sync_all))
        .route("/sync/{resource}", get(sync_resource))
        // OAuth
        .route("/auth/login", get(login))
        .route("/auth/callback", get(callback))
        .route("/auth/refresh", get(refresh))
        .route("/auth/status", get(auth_status))
        .route("/auth/connect-org", get(connect_org))
        .route("/auth/check-org", get(check_org))
        // Vendor passthrough
        .route("/proxy", post(proxy))
        // Inventory boundary
        .route("/inventory", get(list_inventory).post(upsert_inventory))
        .route(
            "/spray-applications",
            get(list_spray_applications).post(log_spray_application),
        )
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

// =============================================================================
// Health & Data
// =============================================================================

async fn health(State(state): State<AppState>) -> Json<Value> {
    let database = state.engine.db().health_check().await;
    let status = if database { "ok" } else { "degraded" };
    Json(json!({ "status": status, "database": database }))
}

#[derive(Debug, Deserialize)]
struct DataQuery {
    limit: Option<i64>,
}

async fn read_table(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(query): Query<DataQuery>,
) -> ApiResult<Json<TablePage>> {
    let table: DataTable = table.parse()?;
    let page = state
        .engine
        .db()
        .tables()
        .read(table, query.limit.unwrap_or(MAX_PAGE_ROWS))
        .await?;
    Ok(Json(page))
}

// =============================================================================
// Sync
// =============================================================================

async fn sync_all(State(state): State<AppState>) -> ApiResult<Json<SyncAllReport>> {
    let report = state.engine.sync_all().await?;
    Ok(Json(report))
}

async fn sync_resource(
    State(state): State<AppState>,
    Path(resource): Path<String>,
) -> ApiResult<Json<SyncReport>> {
    let kind: ResourceKind = resource.parse()?;
    let report = state.engine.sync_resource(kind).await?;
    Ok(Json(report))
}

// =============================================================================
// Auth
// =============================================================================

async fn login(State(state): State<AppState>) -> ApiResult<Json<AuthorizationRequest>> {
    Ok(Json(state.engine.auth().authorization_url()?))
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
}

/// Browser landing page after the vendor redirect.
///
/// Without a `code` the redirect came from the organization connection
/// flow, which has nothing to exchange.
async fn callback(State(state): State<AppState>, Query(query): Query<CallbackQuery>) -> Response {
    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        return Html(page(
            "Organization Connected!",
            "You can close this tab and return to the app to continue setup.",
            true,
        ))
        .into_response();
    };

    match state.engine.auth().exchange_code(&code).await {
        Ok(_) => {
            info!("Vendor account connected");
            Html(page(
                "Connected!",
                "You can close this tab and return to the app.",
                true,
            ))
            .into_response()
        }
        Err(e) => {
            warn!(error = %e, "Authorization code exchange failed");
            let status = ApiError::from(e).status();
            (
                status,
                Html(page(
                    "Connection Failed",
                    "Please close this tab and try again.",
                    false,
                )),
            )
                .into_response()
        }
    }
}

async fn refresh(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let expires_at = state
        .engine
        .auth()
        .force_refresh()
        .await
        .map_err(|e| match e {
            SyncError::NotAuthenticated => ApiError::NotFound("No tokens found".to_string()),
            other => other.into(),
        })?;
    Ok(Json(json!({ "success": true, "expiresAt": expires_at })))
}

async fn auth_status(State(state): State<AppState>) -> ApiResult<Json<AuthStatus>> {
    Ok(Json(state.engine.auth().status().await?))
}

async fn connect_org(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let connect_url = state.engine.auth().connect_organizations_url()?;
    Ok(Json(json!({ "connectUrl": connect_url })))
}

async fn check_org(State(state): State<AppState>) -> ApiResult<Json<OrganizationAccess>> {
    Ok(Json(state.engine.organization_access().await?))
}

// =============================================================================
// Proxy
// =============================================================================

#[derive(Debug, Deserialize)]
struct ProxyRequest {
    endpoint: Option<String>,
}

async fn proxy(
    State(state): State<AppState>,
    Json(request): Json<ProxyRequest>,
) -> ApiResult<Json<Value>> {
    let endpoint = request
        .endpoint
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("endpoint is required".to_string()))?;
    Ok(Json(state.engine.proxy(&endpoint).await?))
}

// =============================================================================
// Inventory
// =============================================================================

async fn list_inventory(State(state): State<AppState>) -> ApiResult<Json<Vec<InventoryItemStatus>>> {
    Ok(Json(state.engine.db().inventory().list_items().await?))
}

async fn upsert_inventory(
    State(state): State<AppState>,
    Json(update): Json<InventoryUpdate>,
) -> ApiResult<Json<InventoryItemStatus>> {
    let item = state.engine.db().inventory().upsert_item(&update).await?;
    Ok(Json(InventoryItemStatus::from(item)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplicationQuery {
    field_id: String,
}

async fn list_spray_applications(
    State(state): State<AppState>,
    Query(query): Query<ApplicationQuery>,
) -> ApiResult<Json<Vec<SprayApplication>>> {
    let applications = state
        .engine
        .db()
        .inventory()
        .list_applications(&query.field_id)
        .await?;
    Ok(Json(applications))
}

async fn log_spray_application(
    State(state): State<AppState>,
    Json(log): Json<ManualSprayLog>,
) -> ApiResult<(StatusCode, Json<SprayApplication>)> {
    let application = state
        .engine
        .db()
        .inventory()
        .log_manual_application(&log)
        .await?;
    Ok((StatusCode::CREATED, Json(application)))
}

fn page(heading: &str, message: &str, success: bool) -> String {
    let color = if success { "#16a34a" } else { "#dc2626" };
    format!(
        "<!DOCTYPE html><html><head><title>{heading}</title><style>\
         body{{font-family:system-ui,sans-serif;display:flex;align-items:center;\
         justify-content:center;min-height:100vh;margin:0;background:#f5f5f4}}\
         h1{{color:{color}}}</style></head><body><div><h1>{heading}</h1>\
         <p>{message}</p></div></body></html>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::{Duration, Utc};
    use harvest_db::{Database, DbConfig};
    use harvest_sync::{HarvestConfig, SyncEngine};
    use std::sync::Arc;
    use tower::util::ServiceExt;

    async fn app() -> (Router, Arc<SyncEngine>) {
        let mut config = HarvestConfig::default();
        config.oauth.client_id = "client-123".into();
        // Nothing listens here; upstream calls fail fast
        config.vendor.api_base_url = "http://127.0.0.1:9/platform".into();
        config.oauth.token_url = "http://127.0.0.1:9/oauth/token".into();

        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let engine = Arc::new(SyncEngine::new(&config, db).unwrap());
        let state = AppState {
            engine: engine.clone(),
        };
        (create_router(state), engine)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _) = app().await;
        let response = app.oneshot(get_req("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["database"], true);
    }

    #[tokio::test]
    async fn test_read_empty_table() {
        let (app, _) = app().await;
        let response = app.oneshot(get_req("/data/equipment")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["total"], 0);
        assert_eq!(body["data"], json!([]));
    }

    #[tokio::test]
    async fn test_unknown_table_is_rejected() {
        let (app, _) = app().await;
        let response = app.oneshot(get_req("/data/tractors")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_sync_requires_credentials() {
        let (app, _) = app().await;
        let response = app.oneshot(get_req("/sync/all")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_resource_is_rejected() {
        let (app, _) = app().await;
        let response = app.oneshot(get_req("/sync/tractors")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_login_returns_authorize_url() {
        let (app, _) = app().await;
        let response = app.oneshot(get_req("/auth/login")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let auth_url = body["authUrl"].as_str().unwrap();
        assert!(auth_url.contains("client_id=client-123"));
        assert!(!body["state"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_without_credentials() {
        let (app, _) = app().await;
        let response = app.oneshot(get_req("/auth/status")).await.unwrap();
        assert_eq!(body_json(response).await, json!({ "connected": false }));
    }

    #[tokio::test]
    async fn test_refresh_without_credentials_is_not_found() {
        let (app, _) = app().await;
        let response = app.oneshot(get_req("/auth/refresh")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "No tokens found");
    }

    #[tokio::test]
    async fn test_callback_without_code_confirms_connection() {
        let (app, _) = app().await;
        let response = app.oneshot(get_req("/auth/callback")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_callback_ignores_state_without_code() {
        let (app, _) = app().await;
        let response = app
            .oneshot(get_req("/auth/callback?state=abc"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("Organization Connected!"));
    }

    #[tokio::test]
    async fn test_proxy_requires_endpoint() {
        let (app, _) = app().await;
        let response = app.oneshot(post_json("/proxy", json!({}))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_proxy_reports_unreachable_vendor() {
        let (app, engine) = app().await;
        engine
            .db()
            .credentials()
            .replace_all("access", "refresh", Utc::now() + Duration::hours(1), "ag1")
            .await
            .unwrap();

        let response = app
            .oneshot(post_json("/proxy", json!({ "endpoint": "/organizations" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["error"], true);
        assert_eq!(body["status"], 0);
    }

    #[tokio::test]
    async fn test_inventory_round_trip_through_manual_log() {
        let (app, _) = app().await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/inventory",
                json!({ "productName": "Roundup", "quantity": 10.0, "unit": "gal", "lowStockThreshold": 5.0 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(post_json(
                "/spray-applications",
                json!({
                    "fieldId": "f1",
                    "productName": "Roundup",
                    "amount": 6.0,
                    "applicationDate": "2024-06-01"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app.oneshot(get_req("/inventory")).await.unwrap();
        let items = body_json(response).await;
        assert_eq!(items.as_array().unwrap().len(), 1);
    }
}
