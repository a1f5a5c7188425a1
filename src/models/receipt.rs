use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A line item as read off a receipt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReceiptItem {
    pub name: String,
    pub quantity: u32,
    pub price_cents: i64,
}

/// A line item the receipt is expected to contain. Quantity and price are
/// only scored when known.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpectedItem {
    pub name: String,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub price_cents: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProofScoreInput {
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub total_cents: Option<i64>,
    /// OCR confidence on either a 0-1 or a 0-100 scale.
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub items: Vec<ReceiptItem>,
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
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Approved,
    Flagged,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationStatus::Approved => "APPROVED",
            VerificationStatus::Flagged => "FLAGGED",
            VerificationStatus::Rejected => "REJECTED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProofScoreResult {
    pub proof_score: u8,
    pub item_match_score: u8,
    pub image_quality: u8,
    pub tamper_score: Option<u8>,
    pub vendor_match_score: Option<u8>,
    pub extracted_total_cents: Option<i64>,
    pub vendor_name: Option<String>,
    pub status: VerificationStatus,
    pub locked: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceiptReasonCode {
    DuplicateReceipt,
    TotalNotFound,
    InvalidTotal,
    DateMissing,
    FutureDate,
    StaleReceipt,
    MerchantMissing,
    MerchantMismatch,
    MerchantWeakMatch,
    TotalSmallMismatch,
    TotalMismatch,
    TotalLargeMismatch,
    TotalPercentMismatch,
    SubtotalMissing,
    TaxMissing,
    TipMissing,
    CurrencyMissing,
    LowConfidence,
    VeryLowConfidence,
    TotalMathMismatch,
    OcrError,
}

impl ReceiptReasonCode {
    /// Codes that reject a receipt whatever the remaining score.
    pub fn is_hard_reject(self) -> bool {
        matches!(
            self,
            ReceiptReasonCode::DuplicateReceipt
                | ReceiptReasonCode::InvalidTotal
                | ReceiptReasonCode::TotalNotFound
                | ReceiptReasonCode::StaleReceipt
        )
    }
}

/// Receipt fields checked for fraud signals. Money is in cents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiptRiskInput {
    #[serde(default)]
    pub expected_vendor: Option<String>,
    #[serde(default)]
    pub expected_total_cents: Option<i64>,
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub subtotal_cents: Option<i64>,
    #[serde(default)]
    pub tax_cents: Option<i64>,
    #[serde(default)]
    pub tip_cents: Option<i64>,
    #[serde(default)]
    pub total_cents: Option<i64>,
    #[serde(default)]
    pub receipt_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub is_duplicate: bool,
    /// The OCR provider failed; the receipt cannot be judged yet.
    #[serde(default)]
    pub ocr_error: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskStatus {
    Approved,
    Flagged,
    Rejected,
    Pending,
}

impl RiskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskStatus::Approved => "APPROVED",
            RiskStatus::Flagged => "FLAGGED",
            RiskStatus::Rejected => "REJECTED",
            RiskStatus::Pending => "PENDING",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RiskPenalty {
    pub code: ReceiptReasonCode,
    pub delta: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskBreakdown {
    pub base: i32,
    pub penalties: Vec<RiskPenalty>,
    pub fuzzy_score: Option<f64>,
    pub diff_cents: Option<i64>,
    pub expected_total_cents: Option<i64>,
    pub extracted_total_cents: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReceiptRiskDecision {
    pub risk_score: u8,
    pub status: RiskStatus,
    pub reason_codes: Vec<ReceiptReasonCode>,
    pub breakdown: RiskBreakdown,
    pub normalized_confidence: Option<f64>,
}

/// Latest proof-scoring outcome kept alongside a delivery request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptVerification {
    pub request_id: Uuid,
    pub extracted_items: Vec<ReceiptItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub result: ProofScoreResult,
    pub risk: ReceiptRiskDecision,
    pub verified_at: DateTime<Utc>,
}
