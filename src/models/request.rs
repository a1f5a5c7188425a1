use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Requested,
    Assigned,
    PickedUp,
    EnRoute,
    Delivered,
    Canceled,
}

impl DeliveryStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Canceled)
    }

    pub fn can_transition_to(self, next: DeliveryStatus) -> bool {
        use DeliveryStatus::*;

        match self {
            Requested => matches!(next, Assigned | Canceled),
            Assigned => matches!(next, PickedUp | Canceled),
            PickedUp => matches!(next, EnRoute | Delivered | Canceled),
            EnRoute => matches!(next, Delivered | Canceled),
            Delivered | Canceled => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Requested => "REQUESTED",
            DeliveryStatus::Assigned => "ASSIGNED",
            DeliveryStatus::PickedUp => "PICKED_UP",
            DeliveryStatus::EnRoute => "EN_ROUTE",
            DeliveryStatus::Delivered => "DELIVERED",
            DeliveryStatus::Canceled => "CANCELED",
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRequest {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub status: DeliveryStatus,
    pub assigned_driver_id: Option<Uuid>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub customer_rating: Option<u8>,
    pub complaint_flag: bool,
    /// Final service miles billed for the trip; drives mileage pay when set.
    pub service_miles: Option<u32>,
    /// Wait-time and sit-and-wait adders, in service miles.
    pub wait_miles: u32,
    pub cash_handling: bool,
    pub business_account: bool,
    pub created_at: DateTime<Utc>,
}

impl DeliveryRequest {
    pub fn new(customer_id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id,
            status: DeliveryStatus::Requested,
            assigned_driver_id: None,
            assigned_at: None,
            arrived_at: None,
            completed_at: None,
            canceled_at: None,
            customer_rating: None,
            complaint_flag: false,
            service_miles: None,
            wait_miles: 0,
            cash_handling: false,
            business_account: false,
            created_at,
        }
    }

    pub fn is_assigned_to(&self, driver_id: Uuid) -> bool {
        self.assigned_driver_id == Some(driver_id)
    }
}
