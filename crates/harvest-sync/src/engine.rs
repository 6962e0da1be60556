//! # Sync Engine
//!
//! Main orchestrator: hands a valid token to the resource handlers, runs
//! them in dependency order and writes the sync log.
//!
//! ## Full Run
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           sync_all()                                    │
//! │                                                                         │
//! │  run guard (try_lock) ──busy──► SyncInProgress                          │
//! │       │                                                                 │
//! │  valid_access_token() ──None──► NotAuthenticated   (nothing logged)     │
//! │       │                                                                 │
//! │  sync_log: full / in_progress                                           │
//! │       │                                                                 │
//! │  ResourceGraph::plan()          organizations → farms → fields → ...    │
//! │   (or ::waves() when parallel)  each step: handler → SyncReport         │
//! │       │                          hard error → report.errors             │
//! │       ▼                                                                 │
//! │  sync_log: full / completed, Σ synced, error summary                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No step is retried; a failed step never stops the run.

use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::auth::AuthManager;
use crate::client::VendorClient;
use crate::config::HarvestConfig;
use crate::error::{SyncError, SyncResult};
use crate::handlers::{self, SyncContext, SyncReport};
use harvest_core::vendor::{page_values, Fields, CONNECTIONS_REL};
use harvest_core::{ResourceGraph, ResourceKind, SyncStatus, FULL_SYNC_TYPE};
use harvest_db::Database;

/// Per-resource results of a full run, keyed by resource name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncAllReport {
    pub results: BTreeMap<String, SyncReport>,
}

impl SyncAllReport {
    pub fn total_synced(&self) -> usize {
        self.results.values().map(|r| r.synced).sum()
    }

    /// One line naming every step that reported errors, or `None`.
    pub fn error_summary(&self) -> Option<String> {
        let failing: Vec<String> = self
            .results
            .iter()
            .filter(|(_, report)| report.has_errors())
            .map(|(name, report)| format!("{} ({})", name, report.errors.len()))
            .collect();
        if failing.is_empty() {
            None
        } else {
            Some(format!("Steps with errors: {}", failing.join(", ")))
        }
    }
}

/// Organizations visible to the current credential.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationAccess {
    pub organizations: Vec<Value>,
    /// True when any organization still has to grant this client access.
    pub needs_connection: bool,
}

pub struct SyncEngine {
    db: Database,
    client: VendorClient,
    auth: Arc<AuthManager>,
    graph: ResourceGraph,
    parallel_branches: bool,
    run_guard: Mutex<()>,
}

impl SyncEngine {
    /// Builds the engine and its auth manager from configuration.
    pub fn new(config: &HarvestConfig, db: Database) -> SyncResult<Self> {
        let client = VendorClient::new(&config.vendor)?;
        let auth = AuthManager::new(
            Arc::new(db.credentials()),
            config.oauth.clone(),
            config.refresh_policy(),
            config.vendor.request_timeout(),
        )?;
        Ok(Self::from_parts(
            db,
            client,
            Arc::new(auth),
            config.parallel_branches(),
        ))
    }

    pub fn from_parts(
        db: Database,
        client: VendorClient,
        auth: Arc<AuthManager>,
        parallel_branches: bool,
    ) -> Self {
        SyncEngine {
            db,
            client,
            auth,
            graph: ResourceGraph::default(),
            parallel_branches,
            run_guard: Mutex::new(()),
        }
    }

    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn client(&self) -> &VendorClient {
        &self.client
    }

    async fn require_token(&self) -> SyncResult<String> {
        self.auth
            .valid_access_token()
            .await?
            .ok_or(SyncError::NotAuthenticated)
    }

    // =========================================================================
    // Orchestration
    // =========================================================================

    /// Syncs every resource in dependency order.
    ///
    /// ## Returns
    /// * `Ok(SyncAllReport)` - every step ran; check each report's `errors`
    /// * `Err(SyncInProgress)` - another run holds the guard
    /// * `Err(NotAuthenticated)` - no usable token, nothing was logged
    pub async fn sync_all(&self) -> SyncResult<SyncAllReport> {
        let _run = self
            .run_guard
            .try_lock()
            .map_err(|_| SyncError::SyncInProgress)?;
        let token = self.require_token().await?;

        let waves = if self.parallel_branches {
            self.graph.waves()?
        } else {
            self.graph.plan()?.into_iter().map(|kind| vec![kind]).collect()
        };

        let started_at = Utc::now();
        let log = self.db.sync_log();
        log.record(FULL_SYNC_TYPE, SyncStatus::InProgress, 0, None, started_at, None)
            .await?;
        info!(parallel = self.parallel_branches, "Full sync started");

        let ctx = SyncContext {
            db: &self.db,
            client: &self.client,
            token: &token,
        };

        let mut report = SyncAllReport::default();
        for wave in waves {
            let outcomes = join_all(wave.iter().map(|kind| self.step(*kind, ctx))).await;
            for (kind, outcome) in wave.iter().zip(outcomes) {
                report.results.insert(kind.as_str().to_string(), outcome);
            }
        }

        let total = report.total_synced();
        let summary = report.error_summary();
        log.record(
            FULL_SYNC_TYPE,
            SyncStatus::Completed,
            total as i64,
            summary.as_deref(),
            started_at,
            Some(Utc::now()),
        )
        .await?;

        info!(
            total,
            with_errors = summary.is_some(),
            "Full sync completed"
        );
        Ok(report)
    }

    /// Runs one step, folding a hard failure into its report.
    async fn step(&self, kind: ResourceKind, ctx: SyncContext<'_>) -> SyncReport {
        match handlers::run(kind, ctx).await {
            Ok(report) => report,
            Err(e) => {
                error!(resource = %kind, error = %e, "Sync step failed");
                SyncReport::failed(kind, e.to_string())
            }
        }
    }

    /// Syncs a single resource and logs the sub-run.
    pub async fn sync_resource(&self, kind: ResourceKind) -> SyncResult<SyncReport> {
        let _run = self
            .run_guard
            .try_lock()
            .map_err(|_| SyncError::SyncInProgress)?;
        let token = self.require_token().await?;

        let started_at = Utc::now();
        let ctx = SyncContext {
            db: &self.db,
            client: &self.client,
            token: &token,
        };
        let log = self.db.sync_log();

        match handlers::run(kind, ctx).await {
            Ok(report) => {
                let errors = report.has_errors().then(|| report.errors.join("; "));
                log.record(
                    kind.as_str(),
                    SyncStatus::Completed,
                    report.synced as i64,
                    errors.as_deref(),
                    started_at,
                    Some(Utc::now()),
                )
                .await?;
                Ok(report)
            }
            Err(e) => {
                let message = e.to_string();
                if let Err(log_err) = log
                    .record(
                        kind.as_str(),
                        SyncStatus::Failed,
                        0,
                        Some(&message),
                        started_at,
                        Some(Utc::now()),
                    )
                    .await
                {
                    warn!(error = %log_err, "Failed to record failed sync");
                }
                error!(resource = %kind, error = %message, "Sync failed");
                Err(e)
            }
        }
    }

    // =========================================================================
    // Passthrough
    // =========================================================================

    /// Lists organizations and whether any still needs to be connected.
    pub async fn organization_access(&self) -> SyncResult<OrganizationAccess> {
        let token = self.require_token().await?;
        let body = self.client.fetch_json("/organizations", &token).await?;

        let organizations = page_values(&body).to_vec();
        let needs_connection = organizations
            .iter()
            .any(|org| Fields::new(org).has_link(CONNECTIONS_REL));

        Ok(OrganizationAccess {
            organizations,
            needs_connection,
        })
    }

    /// Fetches one vendor endpoint verbatim. An upstream failure comes back
    /// as an error descriptor body, not as `Err`.
    pub async fn proxy(&self, endpoint: &str) -> SyncResult<Value> {
        let token = self.require_token().await?;
        match self.client.fetch_json(endpoint, &token).await {
            Ok(body) => Ok(body),
            Err(e) => {
                warn!(%endpoint, error = %e, "Proxied request failed");
                Ok(e.descriptor())
            }
        }
    }
}
