use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::AppError;
use crate::models::driver::{DriverProfile, DriverTier};
use crate::state::AppState;
use crate::store::UnitOfWork;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(create_driver).get(list_drivers))
        .route("/drivers/:id", get(get_driver))
}

#[derive(Deserialize)]
pub struct CreateDriverRequest {
    pub name: String,
    pub tier: DriverTier,
    #[serde(default)]
    pub hourly_rate_cents: i64,
    #[serde(default = "default_bonus_enabled")]
    pub bonus_enabled: bool,
    #[serde(default)]
    pub bonus_5star_cents: i64,
}

fn default_bonus_enabled() -> bool {
    true
}

async fn create_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDriverRequest>,
) -> Result<Json<DriverProfile>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    if payload.hourly_rate_cents < 0 || payload.bonus_5star_cents < 0 {
        return Err(AppError::BadRequest(
            "hourly_rate_cents and bonus_5star_cents must be >= 0".to_string(),
        ));
    }

    let driver = DriverProfile {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        tier: payload.tier,
        hourly_rate_cents: payload.hourly_rate_cents,
        bonus_enabled: payload.bonus_enabled,
        bonus_5star_cents: payload.bonus_5star_cents,
        completed_jobs: 0,
        created_at: state.clock.now(),
    };

    state
        .store
        .transaction(|tx| tx.create_driver(driver.clone()))?;
    Ok(Json(driver))
}

async fn list_drivers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DriverProfile>>, AppError> {
    let drivers = state.store.transaction(|tx| tx.list_drivers())?;
    Ok(Json(drivers))
}

async fn get_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DriverProfile>, AppError> {
    let driver = state
        .store
        .find_driver(id)?
        .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

    Ok(Json(driver))
}
