//! API Handlers
//!
//! HTTP request handlers exposing the cache's read/write surface.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;
use tracing::debug;

use crate::cache::{AdaptiveCache, CacheBuilder};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, DeleteResponse, GetResponse, HealthResponse, SetRequest, SetResponse,
    StatsResponse,
};

/// Application state shared across all handlers.
///
/// The cache handle is internally synchronized, so cloning the state is cheap
/// and needs no outer lock.
#[derive(Clone, Debug)]
pub struct AppState {
    pub cache: AdaptiveCache<Value>,
}

impl AppState {
    /// Creates a new AppState around an existing cache.
    pub fn new(cache: AdaptiveCache<Value>) -> Self {
        Self { cache }
    }

    /// Builds the cache from configuration, logging every invalidated key.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let cache = CacheBuilder::new(config.clone())
            .on_invalidate(|key| debug!(key, "invalidated cache entry"))
            .build()?;
        Ok(Self::new(cache))
    }
}

/// Handler for PUT /set
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    state.cache.put(req.key.clone(), req.value, req.priority);

    Ok(Json(SetResponse::new(req.key, req.priority)))
}

/// Handler for GET /get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let value = state
        .cache
        .get(&key)
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if !state.cache.remove(&key) {
        return Err(CacheError::NotFound(key));
    }

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for POST /clear
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    state.cache.clear();
    Json(ClearResponse::new())
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::new(
        state.cache.metrics(),
        state.cache.config().capacity_bytes,
    ))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Priority;
    use serde_json::json;

    fn test_state() -> AppState {
        AppState::from_config(&CacheConfig::with_capacity(100_000)).unwrap()
    }

    #[tokio::test]
    async fn test_set_and_get_handler() {
        let state = test_state();

        let req = SetRequest {
            key: "test_key".to_string(),
            value: json!({"total": 12.5}),
            priority: Priority::High,
        };
        let result = set_handler(State(state.clone()), Json(req)).await;
        let response = tokio_test::assert_ok!(result);
        assert_eq!(response.key, "test_key");
        assert_eq!(response.priority, Priority::High);

        let response = get_handler(State(state.clone()), Path("test_key".to_string()))
            .await
            .unwrap();
        assert_eq!(response.value, json!({"total": 12.5}));
    }

    #[tokio::test]
    async fn test_get_nonexistent_key() {
        let state = test_state();

        let result = get_handler(State(state), Path("nonexistent".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let state = test_state();
        state.cache.put("to_delete", json!("value"), Priority::Low);

        let result = delete_handler(State(state.clone()), Path("to_delete".to_string())).await;
        let response = tokio_test::assert_ok!(result);
        assert_eq!(response.key, "to_delete");

        let result = delete_handler(State(state), Path("to_delete".to_string())).await;
        let err = tokio_test::assert_err!(result);
        assert!(matches!(err, CacheError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_clear_handler() {
        let state = test_state();
        state.cache.put("k", json!(1), Priority::Low);

        let response = clear_handler(State(state.clone())).await;
        assert_eq!(response.message, "Cache cleared");
        assert!(state.cache.is_empty());
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let state = test_state();
        state.cache.put("k", json!(1), Priority::Low);
        let _ = state.cache.get("k");
        let _ = state.cache.get("missing");

        let response = stats_handler(State(state)).await;
        assert_eq!(response.metrics.cache_hits, 1);
        assert_eq!(response.metrics.cache_misses, 1);
        assert_eq!(response.metrics.hit_rate, 50.0);
        assert_eq!(response.capacity_bytes, 100_000);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }

    #[tokio::test]
    async fn test_set_invalid_request() {
        let state = test_state();

        let req = SetRequest {
            key: "".to_string(),
            value: json!("value"),
            priority: Priority::Medium,
        };
        let result = set_handler(State(state), Json(req)).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }
}
