//! In-process stand-in for the vendor: JSON API under `/platform`, AEMP
//! feed under `/aemp`, token endpoint at `/oauth/token`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use harvest_db::{Database, DbConfig};
use harvest_sync::{HarvestConfig, SyncEngine};
use serde_json::Value;

#[derive(Clone)]
struct Canned {
    status: u16,
    body: String,
    content_type: &'static str,
    delay: Option<Duration>,
}

#[derive(Clone, Default)]
struct MockState {
    routes: Arc<Mutex<HashMap<String, Canned>>>,
    hits: Arc<Mutex<Vec<String>>>,
    token_forms: Arc<Mutex<Vec<String>>>,
}

pub struct MockVendor {
    base: String,
    state: MockState,
}

async fn respond(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    body: String,
) -> Response {
    let key = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    state.hits.lock().unwrap().push(key.clone());
    if method == Method::POST && uri.path() == "/oauth/token" {
        state.token_forms.lock().unwrap().push(body);
    }

    let canned = state.routes.lock().unwrap().get(&key).cloned();
    let Some(canned) = canned else {
        return Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::from(format!("no route for {}", key)))
            .unwrap();
    };

    if let Some(delay) = canned.delay {
        tokio::time::sleep(delay).await;
    }

    Response::builder()
        .status(canned.status)
        .header(header::CONTENT_TYPE, canned.content_type)
        .body(Body::from(canned.body))
        .unwrap()
}

impl MockVendor {
    pub async fn start() -> Self {
        let state = MockState::default();
        let app = Router::new().fallback(respond).with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockVendor {
            base: format!("http://{}", addr),
            state,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn put(&self, path: &str, canned: Canned) {
        self.state
            .routes
            .lock()
            .unwrap()
            .insert(path.to_string(), canned);
    }

    /// 200 with a JSON body.
    pub fn json(&self, path: &str, body: Value) {
        self.put(
            path,
            Canned {
                status: 200,
                body: body.to_string(),
                content_type: "application/json",
                delay: None,
            },
        );
    }

    /// Like [`json`](Self::json) but answers after `delay`.
    pub fn slow_json(&self, path: &str, body: Value, delay: Duration) {
        self.put(
            path,
            Canned {
                status: 200,
                body: body.to_string(),
                content_type: "application/json",
                delay: Some(delay),
            },
        );
    }

    pub fn xml(&self, path: &str, body: &str) {
        self.put(
            path,
            Canned {
                status: 200,
                body: body.to_string(),
                content_type: "application/xml",
                delay: None,
            },
        );
    }

    pub fn fail(&self, path: &str, status: u16, body: &str) {
        self.put(
            path,
            Canned {
                status,
                body: body.to_string(),
                content_type: "text/plain",
                delay: None,
            },
        );
    }

    /// A single-page collection: `{ "values": [...] }`.
    pub fn values(&self, path: &str, values: Value) {
        self.json(path, serde_json::json!({ "values": values, "links": [] }));
    }

    pub fn hits(&self, path: &str) -> usize {
        self.state
            .hits
            .lock()
            .unwrap()
            .iter()
            .filter(|hit| hit.as_str() == path)
            .count()
    }

    pub fn token_forms(&self) -> Vec<String> {
        self.state.token_forms.lock().unwrap().clone()
    }

    pub fn config(&self) -> HarvestConfig {
        let mut config = HarvestConfig::default();
        config.vendor.api_base_url = self.url("/platform");
        config.vendor.aemp_base_url = self.url("/aemp");
        config.vendor.request_timeout_secs = 5;
        config.oauth.token_url = self.url("/oauth/token");
        config.oauth.client_id = "client-123".into();
        config.oauth.client_secret = "secret".into();
        config
    }
}

pub async fn engine_with(config: HarvestConfig) -> SyncEngine {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    SyncEngine::new(&config, db).unwrap()
}

pub async fn engine(mock: &MockVendor) -> SyncEngine {
    engine_with(mock.config()).await
}

/// Stores a credential that stays valid for an hour.
pub async fn connect(engine: &SyncEngine) {
    engine
        .db()
        .credentials()
        .replace_all(
            "access-1",
            "refresh-1",
            Utc::now() + chrono::Duration::hours(1),
            "ag1 eq1",
        )
        .await
        .unwrap();
}
