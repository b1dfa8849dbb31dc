/**
 * API REST - Surface HTTP du kernel de conformité
 *
 * ROUTES :
 * - GET  /health               : liveness
 * - GET  /system/health        : état du kernel (inventaire, MQTT, calculs, alertes)
 * - GET  /licenses/compliance  : calcul à la demande, filtres technology / location / environment
 * - GET  /licenses/types       : catalogue des parts, filtre technology
 * - PUT  /hosts/{hostname}/databases/{dbname}/licenses/{part_id}/ignored
 *                              : seule écriture exposée, bascule le flag ignored
 * - POST /store/reload         : relit le répertoire du snapshot
 *
 * Le calcul est synchrone : il tourne sur spawn_blocking pour ne pas bloquer
 * le runtime. Aucun résultat n'est mis en cache.
 */

use crate::health::{HealthTracker, KernelHealth};
use crate::licensing::{ComplianceReport, LicenseEngine, ScopeFilter};
use crate::models::{LicenseType, Technology};
use crate::store::{EntityStore, JsonSnapshotStore};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub engine: LicenseEngine,
    pub store: Arc<JsonSnapshotStore>,
    pub health: HealthTracker,
}

#[derive(Debug, Default, Deserialize)]
pub struct ComplianceParams {
    technology: Option<String>,
    /// Liste séparée par des virgules
    location: Option<String>,
    environment: Option<String>,
}

impl ComplianceParams {
    fn into_filter(self) -> Result<ScopeFilter, String> {
        let technology = match self.technology.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<Technology>()?),
        };
        let locations = self
            .location
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        let environment = self.environment.filter(|e| !e.trim().is_empty());

        Ok(ScopeFilter {
            technology,
            locations,
            environment,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LicenseTypeParams {
    technology: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IgnoredBody {
    ignored: bool,
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReloadResponse {
    status: &'static str,
    hosts: usize,
}

type ApiError = (StatusCode, String);

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/licenses/compliance", get(get_compliance))
        .route("/licenses/types", get(get_license_types))
        .route(
            "/hosts/{hostname}/databases/{dbname}/licenses/{part_id}/ignored",
            put(put_license_ignored),
        )
        .route("/store/reload", post(reload_store))
        .with_state(app_state)
}

// GET /system/health
async fn get_system_health(State(app): State<AppState>) -> Json<KernelHealth> {
    Json(app.health.get_health(app.store.as_ref()))
}

// GET /licenses/compliance?technology=oracle&location=Italy,Germany&environment=PROD
async fn get_compliance(
    State(app): State<AppState>,
    Query(params): Query<ComplianceParams>,
) -> Result<Json<ComplianceReport>, ApiError> {
    let filter = params.into_filter().map_err(|e| {
        warn!(error = %e, "invalid compliance filter");
        (StatusCode::BAD_REQUEST, e)
    })?;

    let engine = app.engine.clone();
    let result = tokio::task::spawn_blocking(move || engine.compute_license_compliance(&filter))
        .await
        .map_err(|e| {
            error!(error = %e, "compliance task panicked");
            (StatusCode::INTERNAL_SERVER_ERROR, "compliance computation aborted".to_string())
        })?;

    app.health.record_compliance_run(result.is_ok());
    match result {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            error!(error = %e, "license compliance failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

// GET /licenses/types?technology=mysql
async fn get_license_types(
    State(app): State<AppState>,
    Query(params): Query<LicenseTypeParams>,
) -> Result<Json<Vec<LicenseType>>, ApiError> {
    let technology = match params.technology.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<Technology>().map_err(|e| (StatusCode::BAD_REQUEST, e))?),
    };
    Ok(Json(app.store.list_license_types(technology)))
}

// PUT /hosts/{hostname}/databases/{dbname}/licenses/{part_id}/ignored
async fn put_license_ignored(
    State(app): State<AppState>,
    Path((hostname, dbname, part_id)): Path<(String, String, String)>,
    Json(body): Json<IgnoredBody>,
) -> Result<StatusCode, ApiError> {
    let updated = app
        .store
        .set_license_ignored(&hostname, &dbname, &part_id, body.ignored, body.comment)
        .await
        .map_err(|e| {
            error!(error = %e, hostname = %hostname, database = %dbname, "license ignored update failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;

    if updated {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((
            StatusCode::NOT_FOUND,
            format!("no license {} on {}/{}", part_id, hostname, dbname),
        ))
    }
}

// POST /store/reload
async fn reload_store(State(app): State<AppState>) -> Result<Json<ReloadResponse>, ApiError> {
    app.store.reload().await.map_err(|e| {
        error!(error = %e, data_dir = %app.store.data_dir().display(), "store reload failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    let hosts = app
        .store
        .list_current_hosts()
        .map(|h| h.len())
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    info!(hosts, "store reloaded");
    Ok(Json(ReloadResponse { status: "reloaded", hosts }))
}
