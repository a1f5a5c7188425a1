pub mod memory;

use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::DriverProfile;
use crate::models::ledger::{DriverAssignment, DriverEarnings, DriverTimeLog};
use crate::models::request::DeliveryRequest;

pub use memory::MemoryStore;

/// Repository operations visible inside a transaction. Writes become visible
/// to other transactions only when the enclosing closure returns `Ok`.
pub trait SettlementTx {
    fn find_request(&self, id: Uuid) -> Result<Option<DeliveryRequest>, AppError>;
    fn create_request(&mut self, request: DeliveryRequest) -> Result<(), AppError>;
    fn update_request(&mut self, request: DeliveryRequest) -> Result<(), AppError>;

    fn find_driver(&self, id: Uuid) -> Result<Option<DriverProfile>, AppError>;
    fn list_drivers(&self) -> Result<Vec<DriverProfile>, AppError>;
    fn create_driver(&mut self, driver: DriverProfile) -> Result<(), AppError>;
    fn increment_completed_jobs(&mut self, driver_id: Uuid) -> Result<(), AppError>;

    fn create_assignment(&mut self, assignment: DriverAssignment) -> Result<(), AppError>;

    /// Logs for this (driver, request) pair that have no end time yet.
    fn open_time_logs(
        &self,
        driver_id: Uuid,
        request_id: Uuid,
    ) -> Result<Vec<DriverTimeLog>, AppError>;
    fn create_time_log(&mut self, log: DriverTimeLog) -> Result<(), AppError>;
    fn update_time_log(&mut self, log: DriverTimeLog) -> Result<(), AppError>;

    fn find_earnings_for_request(
        &self,
        request_id: Uuid,
    ) -> Result<Option<DriverEarnings>, AppError>;
    /// Fails with `Conflict` if the request already has an earnings record.
    fn create_earnings(&mut self, earnings: DriverEarnings) -> Result<(), AppError>;
}

pub trait UnitOfWork: Send + Sync {
    /// Runs `work` atomically: either every write it staged is applied, or
    /// none is.
    fn transaction<T, F>(&self, work: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut dyn SettlementTx) -> Result<T, AppError>;
}
