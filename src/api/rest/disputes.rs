use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::Json;
use axum::Router;
use dashmap::mapref::entry::Entry;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::api::rest::requests::find_request;
use crate::clock::Clock;
use crate::engine::disputes::{
    build_items_snapshot, invalid_evidence_urls, should_mark_needs_info_for_dispute,
    snapshot_from_receipt_items, validate_disputed_items_against_snapshot,
};
use crate::error::AppError;
use crate::models::dispute::{
    DisputeOutcome, DisputeRecord, DisputedItem, OrderConfirmation, SnapshotItem,
};
use crate::models::request::DeliveryStatus;
use crate::state::AppState;

const MAX_EVIDENCE_URLS: usize = 20;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/requests/:id/confirmation", post(confirm_order))
        .route("/requests/:id/dispute", post(submit_dispute))
}

#[derive(Deserialize)]
pub struct ConfirmOrderRequest {
    pub customer_confirmed: bool,
    #[serde(default)]
    pub items_snapshot: Option<Value>,
}

#[derive(Deserialize)]
pub struct SubmitDisputeRequest {
    pub disputed_items: Vec<DisputedItem>,
    #[serde(default)]
    pub dispute_notes: Option<String>,
    #[serde(default)]
    pub evidence_urls: Vec<String>,
}

async fn confirm_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ConfirmOrderRequest>,
) -> Result<Json<OrderConfirmation>, AppError> {
    let request = find_request(&state, id)?;
    if request.status != DeliveryStatus::Delivered {
        return Err(AppError::InvalidState(format!(
            "request {id} is {} and cannot be confirmed before delivery",
            request.status
        )));
    }

    let items_snapshot = match &payload.items_snapshot {
        Some(raw) => build_items_snapshot(raw),
        None => receipt_snapshot(&state, id),
    };
    if items_snapshot.is_empty() {
        return Err(AppError::BadRequest(
            "no items to confirm; submit items_snapshot or verify a receipt first".to_string(),
        ));
    }

    let confirmation = OrderConfirmation {
        request_id: id,
        customer_confirmed: payload.customer_confirmed,
        items_snapshot,
        confirmed_at: state.clock.now(),
    };

    match state.confirmations.entry(id) {
        Entry::Occupied(_) => {
            return Err(AppError::Conflict(format!(
                "items for request {id} were already confirmed"
            )));
        }
        Entry::Vacant(entry) => {
            entry.insert(confirmation.clone());
        }
    }

    info!(
        request_id = %id,
        customer_confirmed = confirmation.customer_confirmed,
        items = confirmation.items_snapshot.len(),
        "order items confirmed"
    );
    Ok(Json(confirmation))
}

async fn submit_dispute(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitDisputeRequest>,
) -> Result<Json<DisputeRecord>, AppError> {
    find_request(&state, id)?;

    if payload.disputed_items.is_empty() {
        return Err(AppError::Validation(vec![
            "disputedItems must contain at least one item".to_string(),
        ]));
    }

    let mut evidence_urls: Vec<String> = Vec::new();
    for url in payload.evidence_urls.iter().map(|url| url.trim().to_string()) {
        if !evidence_urls.contains(&url) {
            evidence_urls.push(url);
        }
    }
    if evidence_urls.len() > MAX_EVIDENCE_URLS {
        return Err(AppError::BadRequest(format!(
            "at most {MAX_EVIDENCE_URLS} evidence urls are allowed"
        )));
    }
    let invalid = invalid_evidence_urls(&evidence_urls);
    if !invalid.is_empty() {
        return Err(AppError::BadRequest(format!(
            "evidence urls must link to an image, video or pdf: {}",
            invalid.join(", ")
        )));
    }

    let (snapshot, customer_confirmed) = match state.confirmations.get(&id) {
        Some(confirmation) => (
            confirmation.items_snapshot.clone(),
            confirmation.customer_confirmed,
        ),
        None => (receipt_snapshot(&state, id), false),
    };
    if snapshot.is_empty() {
        return Err(AppError::BadRequest(
            "no confirmed items found; confirm items before filing a dispute".to_string(),
        ));
    }

    let validation = validate_disputed_items_against_snapshot(&snapshot, &payload.disputed_items);
    if !validation.valid {
        state
            .metrics
            .disputes_total
            .with_label_values(&["invalid"])
            .inc();
        return Err(AppError::Validation(validation.errors));
    }

    let receipt_locked = state
        .receipts
        .get(&id)
        .is_some_and(|verification| verification.result.locked);
    let notes = payload
        .dispute_notes
        .map(|notes| notes.trim().to_string())
        .filter(|notes| !notes.is_empty());
    if receipt_locked && notes.is_none() {
        return Err(AppError::BadRequest(
            "disputes on a receipt-locked order must give a reason in dispute_notes".to_string(),
        ));
    }
    if receipt_locked && evidence_urls.is_empty() {
        return Err(AppError::BadRequest(
            "disputes on a receipt-locked order must include evidence".to_string(),
        ));
    }

    let outcome = if should_mark_needs_info_for_dispute(
        customer_confirmed,
        &validation.normalized,
        &evidence_urls,
    ) {
        DisputeOutcome::NeedsInfo
    } else {
        DisputeOutcome::Submitted
    };

    let record = DisputeRecord {
        id: Uuid::new_v4(),
        request_id: id,
        items: validation.normalized,
        notes,
        evidence_urls,
        outcome,
        created_at: state.clock.now(),
    };

    {
        let mut records = state.disputes.entry(id).or_default();
        if records.iter().any(|existing| existing.items == record.items) {
            return Err(AppError::Conflict(
                "a dispute for these items has already been submitted".to_string(),
            ));
        }
        records.push(record.clone());
    }

    state
        .metrics
        .disputes_total
        .with_label_values(&[outcome.as_str()])
        .inc();
    info!(
        request_id = %id,
        dispute_id = %record.id,
        outcome = outcome.as_str(),
        items = record.items.len(),
        "dispute recorded"
    );

    Ok(Json(record))
}

fn receipt_snapshot(state: &AppState, id: Uuid) -> Vec<SnapshotItem> {
    state
        .receipts
        .get(&id)
        .map(|verification| snapshot_from_receipt_items(&verification.extracted_items))
        .unwrap_or_default()
}
