use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverAssignment {
    pub id: Uuid,
    pub request_id: Uuid,
    pub driver_id: Uuid,
    pub assigned_at: DateTime<Utc>,
}

/// One interval of active work. `end_time == None` means the log is open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverTimeLog {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub request_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub active_minutes: Option<i64>,
}

impl DriverTimeLog {
    pub fn open(driver_id: Uuid, request_id: Uuid, start_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            driver_id,
            request_id,
            start_time,
            end_time: None,
            active_minutes: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Closes the log and freezes the active minutes, rounded up to the
    /// next whole minute.
    pub fn close(&mut self, end_time: DateTime<Utc>) -> i64 {
        let elapsed_ms = (end_time - self.start_time).num_milliseconds().max(0);
        let minutes = (elapsed_ms + 59_999) / 60_000;

        self.end_time = Some(end_time);
        self.active_minutes = Some(minutes);
        minutes
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EarningStatus {
    Pending,
    Available,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverEarnings {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub request_id: Uuid,
    pub amount_cents: i64,
    pub status: EarningStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    use super::DriverTimeLog;

    #[test]
    fn close_rounds_partial_minutes_up() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut log = DriverTimeLog::open(Uuid::new_v4(), Uuid::new_v4(), start);

        let minutes = log.close(start + Duration::seconds(61));

        assert_eq!(minutes, 2);
        assert_eq!(log.active_minutes, Some(2));
        assert!(!log.is_open());
    }

    #[test]
    fn close_on_exact_minute_does_not_round() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut log = DriverTimeLog::open(Uuid::new_v4(), Uuid::new_v4(), start);

        assert_eq!(log.close(start + Duration::minutes(45)), 45);
    }

    #[test]
    fn close_before_start_yields_zero() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut log = DriverTimeLog::open(Uuid::new_v4(), Uuid::new_v4(), start);

        assert_eq!(log.close(start - Duration::seconds(30)), 0);
    }
}
