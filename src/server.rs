use crate::config::AppConfig;
use crate::data::Dashboard;
use crate::error::PipelineError;
use crate::render;
use crate::stats::DashboardStats;
use crate::types::{CountyCounts, Legend, StyledCounty};
use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::contains::Contains;
use geo::Point;
use geojson::FeatureCollection;
use rstar::{RTree, RTreeObject, AABB};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info};

// Wrapper for RTree indexing
pub struct AreaIndex {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for AreaIndex {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

pub struct ReadyState {
    pub dashboard: Dashboard,
    pub tree: RTree<AreaIndex>,
}

pub enum AppState {
    Ready(ReadyState),
    Failed(String),
}

impl AppState {
    pub fn from_load(result: std::result::Result<Dashboard, PipelineError>) -> Self {
        match result {
            Ok(dashboard) => AppState::Ready(ReadyState {
                tree: build_index(&dashboard),
                dashboard,
            }),
            Err(e) => AppState::Failed(e.to_string()),
        }
    }

    fn ready(&self) -> std::result::Result<&ReadyState, ApiError> {
        match self {
            AppState::Ready(ready) => Ok(ready),
            AppState::Failed(message) => Err(ApiError(message.clone())),
        }
    }
}

/// Blocking error view: the pipeline failed, nothing partial is served.
pub struct ApiError(String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": self.0 })),
        )
            .into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

#[derive(Deserialize)]
pub struct QueryParams {
    lat: f64,
    lon: f64,
}

fn build_index(dashboard: &Dashboard) -> RTree<AreaIndex> {
    info!("Building spatial index for {} counties...", dashboard.areas.len());
    let items: Vec<AreaIndex> = dashboard
        .areas
        .iter()
        .enumerate()
        .filter_map(|(i, area)| {
            let rect = area.geometry.bounding_rect()?;
            Some(AreaIndex {
                index: i,
                aabb: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
            })
        })
        .collect();
    RTree::bulk_load(items)
}

pub fn router(state: Arc<AppState>, static_dir: &Path) -> Router {
    Router::new()
        .route("/api/map", get(map_handler))
        .route("/api/legend", get(legend_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/counties", get(counties_handler))
        .route("/api/counts", get(counts_handler))
        .route("/api/query", get(query_handler))
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(
    config: AppConfig,
    load: std::result::Result<Dashboard, PipelineError>,
) -> Result<()> {
    if let Err(e) = &load {
        error!("Dashboard failed to load, serving error state: {}", e);
    }
    let state = Arc::new(AppState::from_load(load));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.server.port));
    info!("Starting server on http://{}", addr);

    let app = router(state, &config.server.static_dir);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn map_handler(State(state): State<Arc<AppState>>) -> ApiResult<FeatureCollection> {
    Ok(Json(state.ready()?.dashboard.map.clone()))
}

async fn legend_handler(State(state): State<Arc<AppState>>) -> ApiResult<Legend> {
    state.ready()?;
    Ok(Json(render::legend()))
}

async fn stats_handler(State(state): State<Arc<AppState>>) -> ApiResult<DashboardStats> {
    Ok(Json(state.ready()?.dashboard.stats.clone()))
}

async fn counties_handler(State(state): State<Arc<AppState>>) -> ApiResult<Vec<StyledCounty>> {
    Ok(Json(state.ready()?.dashboard.counties.clone()))
}

async fn counts_handler(State(state): State<Arc<AppState>>) -> ApiResult<CountyCounts> {
    Ok(Json(state.ready()?.dashboard.counts.clone()))
}

async fn query_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Option<StyledCounty>> {
    let ready = state.ready()?;
    let point = Point::new(params.lon, params.lat);
    let envelope = AABB::from_point([params.lon, params.lat]);

    // Query RTree
    let found = ready
        .tree
        .locate_in_envelope_intersecting(&envelope)
        .filter_map(|candidate| ready.dashboard.areas.get(candidate.index))
        .find(|area| area.geometry.contains(&point))
        .map(|area| area.county.clone());

    Ok(Json(found))
}
