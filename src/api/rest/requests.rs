use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::clock::Clock;
use crate::engine::lifecycle::Completion;
use crate::engine::pay::{calculate_driver_pay, PayBreakdown, PayInput};
use crate::error::AppError;
use crate::models::event::LifecycleEvent;
use crate::models::ledger::{DriverEarnings, DriverTimeLog};
use crate::models::request::DeliveryRequest;
use crate::state::AppState;
use crate::store::UnitOfWork;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/requests", post(create_request))
        .route("/requests/:id", get(get_request))
        .route("/requests/:id/feedback", patch(record_feedback))
        .route("/requests/:id/accept", post(accept))
        .route("/requests/:id/arrive", post(arrive))
        .route("/requests/:id/en-route", post(en_route))
        .route("/requests/:id/complete", post(complete))
        .route("/requests/:id/cancel", post(cancel))
        .route("/requests/:id/earnings", get(get_earnings))
        .route("/pay/quote", post(quote_pay))
}

#[derive(Deserialize)]
pub struct CreateDeliveryRequest {
    pub customer_id: Uuid,
    #[serde(default)]
    pub service_miles: Option<u32>,
    #[serde(default)]
    pub wait_miles: u32,
    #[serde(default)]
    pub cash_handling: bool,
    #[serde(default)]
    pub business_account: bool,
}

#[derive(Deserialize)]
pub struct FeedbackRequest {
    #[serde(default)]
    pub customer_rating: Option<u8>,
    #[serde(default)]
    pub complaint_flag: Option<bool>,
}

#[derive(Deserialize)]
pub struct DriverActionRequest {
    pub driver_id: Uuid,
}

#[derive(Serialize)]
pub struct RequestDetail {
    #[serde(flatten)]
    pub request: DeliveryRequest,
    pub time_logs: Vec<DriverTimeLog>,
}

async fn create_request(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDeliveryRequest>,
) -> Result<Json<DeliveryRequest>, AppError> {
    let mut request = DeliveryRequest::new(payload.customer_id, state.clock.now());
    request.service_miles = payload.service_miles;
    request.wait_miles = payload.wait_miles;
    request.cash_handling = payload.cash_handling;
    request.business_account = payload.business_account;

    state
        .store
        .transaction(|tx| tx.create_request(request.clone()))?;

    info!(request_id = %request.id, customer_id = %request.customer_id, "delivery requested");
    Ok(Json(request))
}

async fn get_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RequestDetail>, AppError> {
    let request = find_request(&state, id)?;
    let time_logs = state.store.time_logs_for_request(id)?;

    Ok(Json(RequestDetail { request, time_logs }))
}

async fn record_feedback(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<FeedbackRequest>,
) -> Result<Json<DeliveryRequest>, AppError> {
    if let Some(rating) = payload.customer_rating {
        if !(1..=5).contains(&rating) {
            return Err(AppError::BadRequest(
                "customer_rating must be between 1 and 5".to_string(),
            ));
        }
    }

    let request = state.store.transaction(|tx| {
        let mut request = tx
            .find_request(id)?
            .ok_or_else(|| AppError::NotFound(format!("request {id} not found")))?;

        if payload.customer_rating.is_some() {
            request.customer_rating = payload.customer_rating;
        }
        if let Some(flag) = payload.complaint_flag {
            request.complaint_flag = flag;
        }

        tx.update_request(request.clone())?;
        Ok(request)
    })?;

    Ok(Json(request))
}

async fn accept(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DriverActionRequest>,
) -> Result<Json<DeliveryRequest>, AppError> {
    let request = timed(&state, "accept", || {
        state.lifecycle.accept(id, payload.driver_id)
    })?;
    publish_transition(&state, &request, None);
    Ok(Json(request))
}

async fn arrive(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DriverActionRequest>,
) -> Result<Json<DeliveryRequest>, AppError> {
    let request = timed(&state, "arrive", || {
        state.lifecycle.mark_arrived(id, payload.driver_id)
    })?;
    publish_transition(&state, &request, None);
    Ok(Json(request))
}

async fn en_route(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DriverActionRequest>,
) -> Result<Json<DeliveryRequest>, AppError> {
    let request = timed(&state, "en_route", || {
        state.lifecycle.mark_en_route(id, payload.driver_id)
    })?;
    publish_transition(&state, &request, None);
    Ok(Json(request))
}

async fn complete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DriverActionRequest>,
) -> Result<Json<Completion>, AppError> {
    let completion = timed(&state, "complete", || {
        state.lifecycle.complete(id, payload.driver_id)
    })?;

    let earned = u64::try_from(completion.earnings.amount_cents).unwrap_or(0);
    state.metrics.driver_earnings_cents_total.inc_by(earned);
    publish_transition(
        &state,
        &completion.request,
        Some(completion.earnings.amount_cents),
    );
    Ok(Json(completion))
}

async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryRequest>, AppError> {
    let request = timed(&state, "cancel", || state.lifecycle.cancel(id))?;
    publish_transition(&state, &request, None);
    Ok(Json(request))
}

async fn get_earnings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DriverEarnings>, AppError> {
    state
        .store
        .earnings_for_request(id)?
        .into_iter()
        .next()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no earnings recorded for request {id}")))
}

async fn quote_pay(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PayInput>,
) -> Json<PayBreakdown> {
    Json(calculate_driver_pay(&payload, state.lifecycle.rates()))
}

pub(crate) fn find_request(state: &AppState, id: Uuid) -> Result<DeliveryRequest, AppError> {
    state
        .store
        .find_request(id)?
        .ok_or_else(|| AppError::NotFound(format!("request {id} not found")))
}

fn timed<T>(
    state: &AppState,
    operation: &str,
    transition: impl FnOnce() -> Result<T, AppError>,
) -> Result<T, AppError> {
    let start = Instant::now();
    let result = transition();
    let elapsed = start.elapsed().as_secs_f64();

    let outcome = match &result {
        Ok(_) => "success",
        Err(err) => err.kind(),
    };
    state.metrics.record_transition(operation, outcome, elapsed);

    if let Ok(counts) = state.store.counts() {
        state.metrics.active_time_logs.set(counts.open_time_logs as i64);
    }

    result
}

fn publish_transition(state: &AppState, request: &DeliveryRequest, earnings_cents: Option<i64>) {
    state.publish(LifecycleEvent {
        request_id: request.id,
        driver_id: request.assigned_driver_id,
        status: request.status,
        earnings_cents,
        occurred_at: state.clock.now(),
    });
}
