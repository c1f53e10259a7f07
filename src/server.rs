use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::api::{ApiErrorResponse, ApiPredictRequest, ApiPredictResponse, ApiStatsResponse};
use crate::config::InsightsConfig;
use crate::predict::parse_query;
use crate::{Aggregator, InsightsError, JsonFileSource, ModelCache, PostSource, Predictor, Result};

#[derive(Clone)]
pub struct AppState {
    source: Arc<dyn PostSource>,
    aggregator: Aggregator,
    predictor: Predictor,
    cache: Option<Arc<ModelCache>>,
}

impl AppState {
    pub fn new(source: Arc<dyn PostSource>, aggregator: Aggregator, predictor: Predictor) -> Self {
        Self {
            source,
            aggregator,
            predictor,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<ModelCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn from_config(config: &InsightsConfig) -> Result<Self> {
        let aggregator = config.analytics.aggregator()?;
        let predictor = config.analytics.predictor()?;
        let source: Arc<dyn PostSource> = Arc::new(JsonFileSource::new(&config.data.path));
        let state = Self::new(source, aggregator, predictor);
        if config.cache.enabled {
            let cache = ModelCache::new(predictor, config.cache.max_entries);
            Ok(state.with_cache(Arc::new(cache)))
        } else {
            Ok(state)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PredictOptions {
    pub explain: Option<bool>,
}

#[derive(Debug)]
pub struct ApiError(pub InsightsError);

impl From<InsightsError> for ApiError {
    fn from(err: InsightsError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        warn!(status = status.as_u16(), kind = self.0.kind(), error = %self.0, "request failed");
        (status, Json(ApiErrorResponse::from_error(&self.0))).into_response()
    }
}

pub fn status_for(err: &InsightsError) -> StatusCode {
    match err {
        InsightsError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        InsightsError::InsufficientData => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/stats", get(stats_handler))
        .route("/api/predict", post(predict_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|err| InsightsError::Config(format!("invalid bind address: {}", err)))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "post insights service listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

pub async fn stats_handler(
    State(state): State<AppState>,
) -> std::result::Result<Json<ApiStatsResponse>, ApiError> {
    let records = state.source.load().await?;
    let result = state.aggregator.aggregate(&records)?;
    Ok(Json(ApiStatsResponse::from_result(result)))
}

pub async fn predict_handler(
    State(state): State<AppState>,
    Query(options): Query<PredictOptions>,
    payload: std::result::Result<Json<ApiPredictRequest>, JsonRejection>,
) -> std::result::Result<Json<ApiPredictResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        InsightsError::InvalidInput(format!("malformed request body: {}", rejection.body_text()))
    })?;
    let (hour, day) = request.into_query()?;
    parse_query(hour, &day)?;

    let records = state.source.load().await?;
    let prediction = match state.cache.as_ref() {
        Some(cache) => cache.get_or_fit(&records).await?.explain(hour, &day)?,
        None => state.predictor.fit(&records)?.explain(hour, &day)?,
    };

    let explain = options.explain.unwrap_or(false);
    Ok(Json(ApiPredictResponse::from_prediction(prediction, explain)))
}
