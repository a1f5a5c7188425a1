use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::Json;
use axum::Router;
use dashmap::mapref::entry::Entry;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::rest::requests::find_request;
use crate::clock::Clock;
use crate::engine::proof::compute_proof_score_with;
use crate::engine::receipt_parse::parse_receipt_text;
use crate::engine::risk::score_receipt_risk;
use crate::error::AppError;
use crate::models::receipt::{
    ExpectedItem, ProofScoreInput, ReceiptItem, ReceiptRiskInput, ReceiptVerification,
};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/requests/:id/receipt", post(submit_receipt).get(get_receipt))
}

/// Either raw OCR text or already-extracted fields; explicit fields win
/// over anything parsed from the text.
#[derive(Deserialize)]
pub struct SubmitReceiptRequest {
    #[serde(default)]
    pub ocr_text: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub total_cents: Option<i64>,
    #[serde(default)]
    pub items: Option<Vec<ReceiptItem>>,
    #[serde(default)]
    pub expected_vendor: Option<String>,
    #[serde(default)]
    pub expected_total_cents: Option<i64>,
    #[serde(default)]
    pub expected_items: Vec<ExpectedItem>,
    #[serde(default)]
    pub image_quality: Option<f64>,
    #[serde(default)]
    pub tamper_score: Option<f64>,
    #[serde(default)]
    pub subtotal_cents: Option<i64>,
    #[serde(default)]
    pub tax_cents: Option<i64>,
    #[serde(default)]
    pub tip_cents: Option<i64>,
    #[serde(default)]
    pub receipt_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub currency: Option<String>,
    /// Content hash of the receipt image; reuse across requests marks a
    /// duplicate.
    #[serde(default)]
    pub image_hash: Option<String>,
    #[serde(default)]
    pub ocr_error: bool,
}

async fn submit_receipt(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitReceiptRequest>,
) -> Result<Json<ReceiptVerification>, AppError> {
    find_request(&state, id)?;

    let parsed = payload.ocr_text.as_deref().map(parse_receipt_text);
    let parsed_vendor = parsed
        .as_ref()
        .map(|receipt| receipt.vendor_name.clone())
        .filter(|vendor| !vendor.is_empty());
    let location = parsed
        .as_ref()
        .map(|receipt| receipt.location.clone())
        .filter(|location| !location.is_empty());
    let items = payload
        .items
        .or_else(|| parsed.map(|receipt| receipt.items))
        .unwrap_or_default();

    let input = ProofScoreInput {
        merchant_name: payload.merchant_name.or(parsed_vendor),
        total_cents: payload.total_cents,
        confidence: payload.confidence,
        items,
        expected_vendor: payload.expected_vendor,
        expected_total_cents: payload.expected_total_cents,
        expected_items: payload.expected_items,
        image_quality: payload.image_quality,
        tamper_score: payload.tamper_score,
    };

    let image_hash = payload
        .image_hash
        .as_deref()
        .map(str::trim)
        .filter(|hash| !hash.is_empty())
        .map(str::to_string);
    let is_duplicate = image_hash.as_ref().is_some_and(|hash| {
        state
            .receipt_hashes
            .get(hash)
            .is_some_and(|owner| *owner != id)
    });

    let now = state.clock.now();
    let risk = score_receipt_risk(
        &ReceiptRiskInput {
            expected_vendor: input.expected_vendor.clone(),
            expected_total_cents: input.expected_total_cents,
            merchant_name: input.merchant_name.clone(),
            subtotal_cents: payload.subtotal_cents,
            tax_cents: payload.tax_cents,
            tip_cents: payload.tip_cents,
            total_cents: input.total_cents,
            receipt_date: payload.receipt_date,
            currency: payload.currency,
            confidence: input.confidence,
            is_duplicate,
            ocr_error: payload.ocr_error,
        },
        now,
    );

    let result = compute_proof_score_with(&input, state.tamper_detector.as_ref());
    let verification = ReceiptVerification {
        request_id: id,
        extracted_items: input.items,
        location,
        result,
        risk,
        verified_at: now,
    };

    match state.receipts.entry(id) {
        Entry::Occupied(entry) if entry.get().result.locked => {
            return Err(AppError::Conflict(format!(
                "receipt for request {id} is locked"
            )));
        }
        Entry::Occupied(mut entry) => {
            entry.insert(verification.clone());
        }
        Entry::Vacant(entry) => {
            entry.insert(verification.clone());
        }
    }

    if let Some(hash) = image_hash {
        state.receipt_hashes.entry(hash).or_insert(id);
    }

    let result = &verification.result;
    let risk = &verification.risk;
    state
        .metrics
        .proof_scores_total
        .with_label_values(&[result.status.as_str()])
        .inc();
    state
        .metrics
        .receipt_risk_total
        .with_label_values(&[risk.status.as_str()])
        .inc();
    info!(
        request_id = %id,
        proof_score = result.proof_score,
        item_match_score = result.item_match_score,
        status = result.status.as_str(),
        locked = result.locked,
        risk_score = risk.risk_score,
        risk_status = risk.status.as_str(),
        "receipt scored"
    );
    if !risk.reason_codes.is_empty() {
        warn!(request_id = %id, reason_codes = ?risk.reason_codes, "receipt risk signals");
    }

    Ok(Json(verification))
}

async fn get_receipt(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReceiptVerification>, AppError> {
    let verification = state
        .receipts
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("no receipt verified for request {id}")))?;

    Ok(Json(verification.value().clone()))
}
