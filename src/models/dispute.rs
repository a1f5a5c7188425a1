use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotItem {
    pub item_key: String,
    pub name: String,
    pub qty: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price_cents: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisputeReason {
    Missing,
    WrongItem,
    BadQuality,
    Damaged,
}

impl DisputeReason {
    /// Missing and wrong items cannot be judged from a description alone.
    pub fn needs_evidence(self) -> bool {
        matches!(self, DisputeReason::Missing | DisputeReason::WrongItem)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisputedItem {
    pub item_id_or_name: String,
    pub qty_disputed: u32,
    pub reason: DisputeReason,
    #[serde(default)]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedDisputedItem {
    pub item_key: String,
    pub name: String,
    pub qty_disputed: u32,
    pub reason: DisputeReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisputeValidation {
    pub valid: bool,
    pub normalized: Vec<NormalizedDisputedItem>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisputeOutcome {
    Submitted,
    NeedsInfo,
}

impl DisputeOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            DisputeOutcome::Submitted => "SUBMITTED",
            DisputeOutcome::NeedsInfo => "NEEDS_INFO",
        }
    }
}

/// The customer's confirmation of what was delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderConfirmation {
    pub request_id: Uuid,
    pub customer_confirmed: bool,
    pub items_snapshot: Vec<SnapshotItem>,
    pub confirmed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeRecord {
    pub id: Uuid,
    pub request_id: Uuid,
    pub items: Vec<NormalizedDisputedItem>,
    pub notes: Option<String>,
    pub evidence_urls: Vec<String>,
    pub outcome: DisputeOutcome,
    pub created_at: DateTime<Utc>,
}
