use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::contains::Contains;
use geo::Point;
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;

use crate::breakdown::CategoryFilter;
use crate::config::AppConfig;
use crate::session::MapSession;
use crate::types::selection_from;

// Wrapper for RTree indexing
pub struct RegionEnvelope {
    region_key: String,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for RegionEnvelope {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

pub struct AppState {
    pub session: RwLock<MapSession>,
    pub tree: RTree<RegionEnvelope>,
}

#[derive(Serialize)]
pub struct RegionSummary {
    pub region_key: String,
    pub display_name: String,
    pub value: Option<f64>,
    /// `#RRGGBB`, or null for no-data regions (do not fill).
    pub color: Option<String>,
}

#[derive(Serialize)]
pub struct MapResponse {
    pub selection: Vec<String>,
    pub categories: Vec<String>,
    pub domain_min: f64,
    pub domain_max: f64,
    pub regions: Vec<RegionSummary>,
}

#[derive(Deserialize)]
pub struct SelectionRequest {
    pub categories: Vec<String>,
}

#[derive(Deserialize)]
pub struct BreakdownParams {
    region: String,
    /// Comma-separated category filter; omit for all categories.
    categories: Option<String>,
}

#[derive(Serialize)]
pub struct BreakdownEntry {
    pub category: String,
    pub measure: f64,
    pub share_of_filtered_total: f64,
}

#[derive(Serialize)]
pub struct BreakdownResponse {
    pub region_key: String,
    pub display_name: String,
    pub rows: Vec<BreakdownEntry>,
}

#[derive(Deserialize)]
pub struct LocateParams {
    lat: f64,
    lon: f64,
}

#[derive(Serialize)]
pub struct LocateResponse {
    pub region_key: String,
    pub display_name: String,
}

pub async fn start_server(config: AppConfig, session: MapSession) -> Result<()> {
    // Build the spatial index once; the geometry never changes while serving.
    info!("building spatial index");
    let tree_items: Vec<RegionEnvelope> = session
        .index()
        .iter()
        .filter_map(|region| {
            let rect = region.geometry.bounding_rect()?;
            Some(RegionEnvelope {
                region_key: region.region_key.clone(),
                aabb: AABB::from_corners(
                    [rect.min().x, rect.min().y],
                    [rect.max().x, rect.max().y],
                ),
            })
        })
        .collect();
    let tree = RTree::bulk_load(tree_items);

    let state = Arc::new(AppState { session: RwLock::new(session), tree });

    let port = config.server.port;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("starting server on http://{}", addr);

    let app = Router::new()
        .route("/api/map", get(map_handler))
        .route("/api/selection", post(selection_handler))
        .route("/api/breakdown", get(breakdown_handler))
        .route("/api/locate", get(locate_handler))
        .nest_service("/", ServeDir::new("."))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn map_response(session: &MapSession) -> MapResponse {
    let scale = session.scale();
    let mut regions: Vec<RegionSummary> = session
        .bindings()
        .iter()
        .map(|(key, binding)| RegionSummary {
            region_key: key.clone(),
            display_name: session
                .index()
                .lookup(key)
                .map(|r| r.display_name.clone())
                .unwrap_or_else(|| key.clone()),
            value: binding.value,
            color: binding.color.to_hex(),
        })
        .collect();
    regions.sort_by(|a, b| a.region_key.cmp(&b.region_key));

    MapResponse {
        selection: session.selection().iter().cloned().collect(),
        categories: session.categories().into_iter().collect(),
        domain_min: scale.domain_min,
        domain_max: scale.domain_max,
        regions,
    }
}

async fn map_handler(State(state): State<Arc<AppState>>) -> Json<MapResponse> {
    let session = state.session.read().await;
    Json(map_response(&session))
}

/// Changes the category selection and returns the recomputed map. A rejected
/// selection leaves the last good state in place and reports the bad row.
async fn selection_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SelectionRequest>,
) -> Result<Json<MapResponse>, (StatusCode, String)> {
    let mut session = state.session.write().await;
    session
        .set_selection(selection_from(request.categories))
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    Ok(Json(map_response(&session)))
}

async fn breakdown_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BreakdownParams>,
) -> Json<Option<BreakdownResponse>> {
    let session = state.session.read().await;

    let Some(region) = session.index().lookup(&params.region) else {
        return Json(None);
    };

    let filter = match &params.categories {
        None => CategoryFilter::All,
        Some(list) => CategoryFilter::Subset(selection_from(
            list.split(',').map(str::trim).filter(|s| !s.is_empty()),
        )),
    };

    let rows = session
        .breakdown(&params.region, &filter)
        .into_iter()
        .map(|row| BreakdownEntry {
            category: row.category,
            measure: row.measure,
            share_of_filtered_total: row.share_of_filtered_total,
        })
        .collect();

    Json(Some(BreakdownResponse {
        region_key: region.region_key.clone(),
        display_name: region.display_name.clone(),
        rows,
    }))
}

async fn locate_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LocateParams>,
) -> Json<Option<LocateResponse>> {
    let session = state.session.read().await;
    let point = Point::new(params.lon, params.lat);
    let envelope = AABB::from_point([params.lon, params.lat]);

    let candidates = state.tree.locate_in_envelope_intersecting(&envelope);
    for candidate in candidates {
        if let Some(region) = session.index().lookup(&candidate.region_key) {
            if region.geometry.contains(&point) {
                return Json(Some(LocateResponse {
                    region_key: region.region_key.clone(),
                    display_name: region.display_name.clone(),
                }));
            }
        }
    }

    Json(None)
}
