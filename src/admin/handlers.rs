use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;
use crate::routing::{Params, Route};

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub mode: String,
    pub routes: usize,
    pub cached_styles: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheSummary {
    pub entries: usize,
    pub persistence_path: Option<String>,
    pub asset_dir: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PurgeResponse {
    pub purged: bool,
    pub entries_removed: usize,
}

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub matched: bool,
    pub route: Option<Route>,
    pub params: Option<Params>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let site = state.site();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
        mode: site.mode().as_str().to_string(),
        routes: site.router().len(),
        cached_styles: site.styles().cache().len(),
    })
}

pub async fn get_routes(State(state): State<AppState>) -> Json<Vec<Route>> {
    let site = state.site();
    Json(site.router().routes().cloned().collect())
}

pub async fn get_resolve(
    State(state): State<AppState>,
    Query(query): Query<ResolveQuery>,
) -> Json<ResolveResponse> {
    let site = state.site();
    let response = match site.router().resolve(&query.path) {
        Some(matched) => ResolveResponse {
            matched: true,
            route: Some(matched.route.clone()),
            params: Some(matched.params),
        },
        None => ResolveResponse {
            matched: false,
            route: None,
            params: None,
        },
    };
    Json(response)
}

pub async fn get_cache(State(state): State<AppState>) -> Json<CacheSummary> {
    let site = state.site();
    let cache = site.styles().cache();
    Json(CacheSummary {
        entries: cache.len(),
        persistence_path: cache.persistence_path().map(|p| p.display().to_string()),
        asset_dir: site.assets().dir().display().to_string(),
    })
}

pub async fn post_purge(
    State(state): State<AppState>,
) -> Result<Json<PurgeResponse>, (StatusCode, String)> {
    let site = state.site();
    let report = tokio::task::spawn_blocking(move || site.purge_style_cache())
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| {
            tracing::error!(error = %e, "Purge failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;

    Ok(Json(PurgeResponse {
        purged: true,
        entries_removed: report.entries_removed,
    }))
}
