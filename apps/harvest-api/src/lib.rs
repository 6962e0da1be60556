//! # Harvest API
//!
//! HTTP surface the dashboard talks to.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Harvest API Server                               │
//! │                                                                         │
//! │  Dashboard ───► axum (8787) ───► SyncEngine ───► Vendor API / AEMP     │
//! │                     │                 │                                 │
//! │                     │                 ▼                                 │
//! │                     └──────────────► SQLite                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod routes;

use std::sync::Arc;

use harvest_sync::SyncEngine;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SyncEngine>,
}

impl AppState {
    pub fn new(engine: SyncEngine) -> Self {
        AppState {
            engine: Arc::new(engine),
        }
    }
}
