use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverTier {
    Probation,
    Standard,
    Elite,
    Concierge,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverProfile {
    pub id: Uuid,
    pub name: String,
    pub tier: DriverTier,
    pub hourly_rate_cents: i64,
    pub bonus_enabled: bool,
    pub bonus_5star_cents: i64,
    pub completed_jobs: u64,
    pub created_at: DateTime<Utc>,
}
