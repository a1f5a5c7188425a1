use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::engine::pay::{calculate_driver_pay, PayBasis, PayBreakdown, PayInput, PayRates};
use crate::error::AppError;
use crate::models::driver::DriverProfile;
use crate::models::ledger::{DriverAssignment, DriverEarnings, DriverTimeLog, EarningStatus};
use crate::models::request::{DeliveryRequest, DeliveryStatus};
use crate::store::{SettlementTx, UnitOfWork};

const FIVE_STAR_RATING: u8 = 5;

#[derive(Debug, Clone, Serialize)]
pub struct Completion {
    pub request: DeliveryRequest,
    pub time_log: DriverTimeLog,
    pub earnings: DriverEarnings,
    pub pay: PayBreakdown,
}

/// Drives a delivery request from acceptance to delivery. Every operation is
/// one transaction against the injected store; a failed precondition leaves
/// the store untouched.
pub struct DeliveryLifecycle<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    rates: PayRates,
}

impl<S: UnitOfWork> DeliveryLifecycle<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, rates: PayRates) -> Self {
        Self {
            store,
            clock,
            rates,
        }
    }

    pub fn rates(&self) -> &PayRates {
        &self.rates
    }

    pub fn accept(&self, request_id: Uuid, driver_id: Uuid) -> Result<DeliveryRequest, AppError> {
        let result = self.store.transaction(|tx| {
            let mut request = load_request(tx, request_id)?;
            load_driver(tx, driver_id)?;

            if request.status != DeliveryStatus::Requested {
                return Err(AppError::InvalidState(format!(
                    "request {request_id} is {} and not available for acceptance",
                    request.status
                )));
            }

            let now = self.clock.now();
            request.status = DeliveryStatus::Assigned;
            request.assigned_driver_id = Some(driver_id);
            request.assigned_at = Some(now);
            tx.update_request(request.clone())?;

            tx.create_assignment(DriverAssignment {
                id: Uuid::new_v4(),
                request_id,
                driver_id,
                assigned_at: now,
            })?;

            Ok(request)
        });

        log_outcome("accept", request_id, driver_id, &result);
        result
    }

    pub fn mark_arrived(
        &self,
        request_id: Uuid,
        driver_id: Uuid,
    ) -> Result<DeliveryRequest, AppError> {
        let result = self.store.transaction(|tx| {
            let mut request = load_request(tx, request_id)?;
            ensure_assigned(&request, driver_id)?;

            if request.arrived_at.is_some() {
                return Err(AppError::AlreadyArrived(request_id));
            }
            if !tx.open_time_logs(driver_id, request_id)?.is_empty() {
                return Err(AppError::AlreadyArrived(request_id));
            }
            if request.status != DeliveryStatus::Assigned {
                return Err(AppError::InvalidState(format!(
                    "request {request_id} is {}, expected ASSIGNED",
                    request.status
                )));
            }

            let now = not_before(self.clock.now(), request.assigned_at);
            request.status = DeliveryStatus::PickedUp;
            request.arrived_at = Some(now);
            tx.update_request(request.clone())?;
            tx.create_time_log(DriverTimeLog::open(driver_id, request_id, now))?;

            Ok(request)
        });

        log_outcome("arrive", request_id, driver_id, &result);
        result
    }

    pub fn mark_en_route(
        &self,
        request_id: Uuid,
        driver_id: Uuid,
    ) -> Result<DeliveryRequest, AppError> {
        let result = self.store.transaction(|tx| {
            let mut request = load_request(tx, request_id)?;
            ensure_assigned(&request, driver_id)?;

            if request.status != DeliveryStatus::PickedUp {
                return Err(AppError::InvalidState(format!(
                    "request {request_id} is {}, expected PICKED_UP",
                    request.status
                )));
            }

            request.status = DeliveryStatus::EnRoute;
            tx.update_request(request.clone())?;
            Ok(request)
        });

        log_outcome("en_route", request_id, driver_id, &result);
        result
    }

    pub fn complete(&self, request_id: Uuid, driver_id: Uuid) -> Result<Completion, AppError> {
        let result = self.store.transaction(|tx| {
            let mut request = load_request(tx, request_id)?;
            let driver = load_driver(tx, driver_id)?;
            ensure_assigned(&request, driver_id)?;

            let Some(arrived_at) = request.arrived_at else {
                return Err(AppError::InvalidState(format!(
                    "request {request_id} cannot be completed before arrival"
                )));
            };
            if request.completed_at.is_some() {
                return Err(AppError::AlreadyCompleted(request_id));
            }
            if !matches!(
                request.status,
                DeliveryStatus::PickedUp | DeliveryStatus::EnRoute
            ) {
                return Err(AppError::InvalidState(format!(
                    "request {request_id} is {} and cannot be completed",
                    request.status
                )));
            }

            let mut open_logs = tx.open_time_logs(driver_id, request_id)?;
            if open_logs.len() != 1 {
                return Err(AppError::InvalidState(format!(
                    "expected one active time log for request {request_id}, found {}",
                    open_logs.len()
                )));
            }
            let mut time_log = open_logs.remove(0);

            if tx.find_earnings_for_request(request_id)?.is_some() {
                return Err(AppError::AlreadyCompleted(request_id));
            }

            let now = not_before(self.clock.now(), Some(arrived_at));
            let active_minutes = time_log.close(now);
            tx.update_time_log(time_log.clone())?;

            let pay = calculate_driver_pay(
                &pay_input(&request, &driver, active_minutes),
                &self.rates,
            );

            let earnings = DriverEarnings {
                id: Uuid::new_v4(),
                driver_id,
                request_id,
                amount_cents: pay.total_cents,
                status: EarningStatus::Pending,
                created_at: now,
            };
            tx.create_earnings(earnings.clone())?;

            request.status = DeliveryStatus::Delivered;
            request.completed_at = Some(now);
            tx.update_request(request.clone())?;
            tx.increment_completed_jobs(driver_id)?;

            Ok(Completion {
                request,
                time_log,
                earnings,
                pay,
            })
        });

        match &result {
            Ok(completion) => info!(
                request_id = %request_id,
                driver_id = %driver_id,
                active_minutes = completion.time_log.active_minutes.unwrap_or(0),
                total_cents = completion.pay.total_cents,
                "delivery completed"
            ),
            Err(err) => warn!(
                request_id = %request_id,
                driver_id = %driver_id,
                error = %err,
                "complete rejected"
            ),
        }
        result
    }

    /// Cancels a live request. An open time log is closed so active time is
    /// still recorded, but no earnings are created.
    pub fn cancel(&self, request_id: Uuid) -> Result<DeliveryRequest, AppError> {
        let result = self.store.transaction(|tx| {
            let mut request = load_request(tx, request_id)?;

            if !request.status.can_transition_to(DeliveryStatus::Canceled) {
                return Err(AppError::InvalidState(format!(
                    "request {request_id} is already {}",
                    request.status
                )));
            }

            let now = self.clock.now();
            if let Some(driver_id) = request.assigned_driver_id {
                for mut log in tx.open_time_logs(driver_id, request_id)? {
                    log.close(now);
                    tx.update_time_log(log)?;
                }
            }

            request.status = DeliveryStatus::Canceled;
            request.canceled_at = Some(now);
            tx.update_request(request.clone())?;
            Ok(request)
        });

        match &result {
            Ok(_) => info!(request_id = %request_id, "delivery canceled"),
            Err(err) => warn!(request_id = %request_id, error = %err, "cancel rejected"),
        }
        result
    }
}

fn load_request(tx: &dyn SettlementTx, request_id: Uuid) -> Result<DeliveryRequest, AppError> {
    tx.find_request(request_id)?
        .ok_or_else(|| AppError::NotFound(format!("request {request_id} not found")))
}

fn load_driver(tx: &dyn SettlementTx, driver_id: Uuid) -> Result<DriverProfile, AppError> {
    tx.find_driver(driver_id)?
        .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))
}

fn ensure_assigned(request: &DeliveryRequest, driver_id: Uuid) -> Result<(), AppError> {
    if request.is_assigned_to(driver_id) {
        Ok(())
    } else {
        Err(AppError::NotAssigned {
            request_id: request.id,
            driver_id,
        })
    }
}

/// Keeps lifecycle timestamps monotonic even if the clock steps backwards.
fn not_before(now: DateTime<Utc>, floor: Option<DateTime<Utc>>) -> DateTime<Utc> {
    floor.map_or(now, |floor| now.max(floor))
}

fn pay_input(request: &DeliveryRequest, driver: &DriverProfile, active_minutes: i64) -> PayInput {
    let bonus_eligible = request.customer_rating == Some(FIVE_STAR_RATING)
        && !request.complaint_flag
        && driver.bonus_enabled;

    let basis = match request.service_miles.filter(|miles| *miles > 0) {
        Some(miles) => PayBasis::ServiceMiles {
            miles: i64::from(miles),
        },
        None => PayBasis::ActiveTime {
            active_minutes,
            hourly_rate_cents: driver.hourly_rate_cents,
        },
    };

    PayInput {
        basis,
        driver_tier: driver.tier,
        tips_cents: 0,
        bonus_eligible,
        bonus_5star_cents: driver.bonus_5star_cents,
        wait_miles: i64::from(request.wait_miles),
        cash_handling: request.cash_handling,
        business_account: request.business_account,
    }
}

fn log_outcome(
    operation: &'static str,
    request_id: Uuid,
    driver_id: Uuid,
    result: &Result<DeliveryRequest, AppError>,
) {
    match result {
        Ok(request) => info!(
            operation,
            request_id = %request_id,
            driver_id = %driver_id,
            status = %request.status,
            "lifecycle transition committed"
        ),
        Err(err) => warn!(
            operation,
            request_id = %request_id,
            driver_id = %driver_id,
            error = %err,
            "lifecycle transition rejected"
        ),
    }
}
