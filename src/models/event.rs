use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::request::DeliveryStatus;

/// Broadcast to websocket subscribers after every committed transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub request_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub status: DeliveryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earnings_cents: Option<i64>,
    pub occurred_at: DateTime<Utc>,
}
