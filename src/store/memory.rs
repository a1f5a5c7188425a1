use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard};

use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::DriverProfile;
use crate::models::ledger::{DriverAssignment, DriverEarnings, DriverTimeLog};
use crate::models::request::DeliveryRequest;
use crate::store::{SettlementTx, UnitOfWork};

#[derive(Debug, Default)]
struct Tables {
    requests: HashMap<Uuid, DeliveryRequest>,
    drivers: HashMap<Uuid, DriverProfile>,
    assignments: HashMap<Uuid, DriverAssignment>,
    time_logs: HashMap<Uuid, DriverTimeLog>,
    earnings: HashMap<Uuid, DriverEarnings>,
}

/// Writes made during one transaction, applied on commit.
#[derive(Debug, Default)]
struct WriteSet {
    requests: HashMap<Uuid, DeliveryRequest>,
    drivers: HashMap<Uuid, DriverProfile>,
    completed_jobs: HashMap<Uuid, u64>,
    assignments: HashMap<Uuid, DriverAssignment>,
    time_logs: HashMap<Uuid, DriverTimeLog>,
    earnings: HashMap<Uuid, DriverEarnings>,
}

impl WriteSet {
    fn apply(self, tables: &mut Tables) {
        tables.requests.extend(self.requests);
        tables.drivers.extend(self.drivers);
        for (driver_id, increment) in self.completed_jobs {
            if let Some(driver) = tables.drivers.get_mut(&driver_id) {
                driver.completed_jobs = driver.completed_jobs.saturating_add(increment);
            }
        }
        tables.assignments.extend(self.assignments);
        tables.time_logs.extend(self.time_logs);
        tables.earnings.extend(self.earnings);
    }
}

/// In-process settlement store. Transactions are serialized behind a
/// write lock, so concurrent callers observe each other's effects in a
/// single total order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct StoreCounts {
    pub drivers: usize,
    pub requests: usize,
    pub open_time_logs: usize,
    pub earnings: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> Result<StoreCounts, AppError> {
        let tables = self.read()?;
        Ok(StoreCounts {
            drivers: tables.drivers.len(),
            requests: tables.requests.len(),
            open_time_logs: tables.time_logs.values().filter(|log| log.is_open()).count(),
            earnings: tables.earnings.len(),
        })
    }

    /// Committed state only; does not wait behind in-flight transactions.
    pub fn find_request(&self, id: Uuid) -> Result<Option<DeliveryRequest>, AppError> {
        Ok(self.read()?.requests.get(&id).cloned())
    }

    pub fn find_driver(&self, id: Uuid) -> Result<Option<DriverProfile>, AppError> {
        Ok(self.read()?.drivers.get(&id).cloned())
    }

    pub fn time_logs_for_request(&self, request_id: Uuid) -> Result<Vec<DriverTimeLog>, AppError> {
        let tables = self.read()?;
        let mut logs: Vec<DriverTimeLog> = tables
            .time_logs
            .values()
            .filter(|log| log.request_id == request_id)
            .cloned()
            .collect();
        logs.sort_by_key(|log| log.start_time);
        Ok(logs)
    }

    pub fn earnings_for_request(&self, request_id: Uuid) -> Result<Vec<DriverEarnings>, AppError> {
        let tables = self.read()?;
        Ok(tables
            .earnings
            .values()
            .filter(|earnings| earnings.request_id == request_id)
            .cloned()
            .collect())
    }

    pub fn assignments_for_request(
        &self,
        request_id: Uuid,
    ) -> Result<Vec<DriverAssignment>, AppError> {
        let tables = self.read()?;
        Ok(tables
            .assignments
            .values()
            .filter(|assignment| assignment.request_id == request_id)
            .cloned()
            .collect())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, AppError> {
        self.tables
            .read()
            .map_err(|_| AppError::Internal("settlement store lock poisoned".to_string()))
    }
}

impl UnitOfWork for MemoryStore {
    fn transaction<T, F>(&self, work: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut dyn SettlementTx) -> Result<T, AppError>,
    {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| AppError::Internal("settlement store lock poisoned".to_string()))?;

        let mut tx = MemoryTx {
            base: &tables,
            writes: WriteSet::default(),
        };
        let outcome = work(&mut tx);
        let writes = tx.writes;

        if outcome.is_ok() {
            writes.apply(&mut tables);
        }
        outcome
    }
}

struct MemoryTx<'a> {
    base: &'a Tables,
    writes: WriteSet,
}

impl MemoryTx<'_> {
    fn time_log(&self, id: &Uuid) -> Option<&DriverTimeLog> {
        self.writes
            .time_logs
            .get(id)
            .or_else(|| self.base.time_logs.get(id))
    }

    fn all_earnings(&self) -> impl Iterator<Item = &DriverEarnings> {
        self.writes.earnings.values().chain(
            self.base
                .earnings
                .values()
                .filter(|earnings| !self.writes.earnings.contains_key(&earnings.id)),
        )
    }
}

impl SettlementTx for MemoryTx<'_> {
    fn find_request(&self, id: Uuid) -> Result<Option<DeliveryRequest>, AppError> {
        Ok(self
            .writes
            .requests
            .get(&id)
            .or_else(|| self.base.requests.get(&id))
            .cloned())
    }

    fn create_request(&mut self, request: DeliveryRequest) -> Result<(), AppError> {
        if self.find_request(request.id)?.is_some() {
            return Err(AppError::Conflict(format!("request {} already exists", request.id)));
        }
        self.writes.requests.insert(request.id, request);
        Ok(())
    }

    fn update_request(&mut self, request: DeliveryRequest) -> Result<(), AppError> {
        if self.find_request(request.id)?.is_none() {
            return Err(AppError::NotFound(format!("request {} not found", request.id)));
        }
        self.writes.requests.insert(request.id, request);
        Ok(())
    }

    fn find_driver(&self, id: Uuid) -> Result<Option<DriverProfile>, AppError> {
        let driver = self
            .writes
            .drivers
            .get(&id)
            .or_else(|| self.base.drivers.get(&id))
            .cloned()
            .map(|mut driver| {
                let pending = self.writes.completed_jobs.get(&id).copied().unwrap_or(0);
                driver.completed_jobs = driver.completed_jobs.saturating_add(pending);
                driver
            });
        Ok(driver)
    }

    fn list_drivers(&self) -> Result<Vec<DriverProfile>, AppError> {
        let mut ids: Vec<Uuid> = self.base.drivers.keys().copied().collect();
        ids.extend(
            self.writes
                .drivers
                .keys()
                .filter(|id| !self.base.drivers.contains_key(*id)),
        );

        let mut drivers = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(driver) = self.find_driver(id)? {
                drivers.push(driver);
            }
        }
        drivers.sort_by_key(|driver| driver.created_at);
        Ok(drivers)
    }

    fn create_driver(&mut self, driver: DriverProfile) -> Result<(), AppError> {
        if self.find_driver(driver.id)?.is_some() {
            return Err(AppError::Conflict(format!("driver {} already exists", driver.id)));
        }
        self.writes.drivers.insert(driver.id, driver);
        Ok(())
    }

    fn increment_completed_jobs(&mut self, driver_id: Uuid) -> Result<(), AppError> {
        if self.find_driver(driver_id)?.is_none() {
            return Err(AppError::NotFound(format!("driver {driver_id} not found")));
        }
        *self.writes.completed_jobs.entry(driver_id).or_insert(0) += 1;
        Ok(())
    }

    fn create_assignment(&mut self, assignment: DriverAssignment) -> Result<(), AppError> {
        self.writes.assignments.insert(assignment.id, assignment);
        Ok(())
    }

    fn open_time_logs(
        &self,
        driver_id: Uuid,
        request_id: Uuid,
    ) -> Result<Vec<DriverTimeLog>, AppError> {
        let ids = self
            .base
            .time_logs
            .keys()
            .chain(
                self.writes
                    .time_logs
                    .keys()
                    .filter(|id| !self.base.time_logs.contains_key(*id)),
            );

        let mut logs: Vec<DriverTimeLog> = ids
            .filter_map(|id| self.time_log(id))
            .filter(|log| {
                log.driver_id == driver_id && log.request_id == request_id && log.is_open()
            })
            .cloned()
            .collect();
        logs.sort_by_key(|log| log.start_time);
        Ok(logs)
    }

    fn create_time_log(&mut self, log: DriverTimeLog) -> Result<(), AppError> {
        if self.time_log(&log.id).is_some() {
            return Err(AppError::Conflict(format!("time log {} already exists", log.id)));
        }
        self.writes.time_logs.insert(log.id, log);
        Ok(())
    }

    fn update_time_log(&mut self, log: DriverTimeLog) -> Result<(), AppError> {
        if self.time_log(&log.id).is_none() {
            return Err(AppError::NotFound(format!("time log {} not found", log.id)));
        }
        self.writes.time_logs.insert(log.id, log);
        Ok(())
    }

    fn find_earnings_for_request(
        &self,
        request_id: Uuid,
    ) -> Result<Option<DriverEarnings>, AppError> {
        Ok(self
            .all_earnings()
            .find(|earnings| earnings.request_id == request_id)
            .cloned())
    }

    fn create_earnings(&mut self, earnings: DriverEarnings) -> Result<(), AppError> {
        if self.find_earnings_for_request(earnings.request_id)?.is_some() {
            return Err(AppError::Conflict(format!(
                "earnings already recorded for request {}",
                earnings.request_id
            )));
        }
        self.writes.earnings.insert(earnings.id, earnings);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::MemoryStore;
    use crate::error::AppError;
    use crate::models::ledger::{DriverEarnings, DriverTimeLog, EarningStatus};
    use crate::models::request::DeliveryRequest;
    use crate::store::UnitOfWork;

    fn earnings(request_id: Uuid) -> DriverEarnings {
        DriverEarnings {
            id: Uuid::new_v4(),
            driver_id: Uuid::new_v4(),
            request_id,
            amount_cents: 1000,
            status: EarningStatus::Pending,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn failed_transaction_leaves_no_writes() {
        let store = MemoryStore::new();
        let request = DeliveryRequest::new(Uuid::new_v4(), Utc::now());
        let request_id = request.id;

        let result: Result<(), AppError> = store.transaction(|tx| {
            tx.create_request(request)?;
            tx.create_time_log(DriverTimeLog::open(Uuid::new_v4(), request_id, Utc::now()))?;
            Err(AppError::InvalidState("abort".to_string()))
        });

        assert!(result.is_err());
        let counts = store.counts().unwrap();
        assert_eq!(counts.requests, 0);
        assert_eq!(counts.open_time_logs, 0);
    }

    #[test]
    fn writes_are_visible_inside_the_same_transaction() {
        let store = MemoryStore::new();
        let request = DeliveryRequest::new(Uuid::new_v4(), Utc::now());
        let request_id = request.id;

        let found = store
            .transaction(|tx| {
                tx.create_request(request)?;
                tx.find_request(request_id)
            })
            .unwrap();

        assert!(found.is_some());
        assert_eq!(store.counts().unwrap().requests, 1);
    }

    #[test]
    fn earnings_are_unique_per_request() {
        let store = MemoryStore::new();
        let request_id = Uuid::new_v4();

        store
            .transaction(|tx| tx.create_earnings(earnings(request_id)))
            .unwrap();
        let second = store.transaction(|tx| tx.create_earnings(earnings(request_id)));

        assert!(matches!(second, Err(AppError::Conflict(_))));
        assert_eq!(store.earnings_for_request(request_id).unwrap().len(), 1);
    }

    #[test]
    fn direct_reads_see_only_committed_requests() {
        let store = MemoryStore::new();
        let committed = DeliveryRequest::new(Uuid::new_v4(), Utc::now());
        let committed_id = committed.id;
        let aborted = DeliveryRequest::new(Uuid::new_v4(), Utc::now());
        let aborted_id = aborted.id;

        store
            .transaction(|tx| tx.create_request(committed))
            .unwrap();
        let _ = store.transaction(|tx| {
            tx.create_request(aborted)?;
            Err::<(), _>(AppError::InvalidState("abort".to_string()))
        });

        assert_eq!(store.find_request(committed_id).unwrap().unwrap().id, committed_id);
        assert!(store.find_request(aborted_id).unwrap().is_none());
        assert!(store.find_driver(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn closed_logs_are_not_open() {
        let store = MemoryStore::new();
        let driver_id = Uuid::new_v4();
        let request_id = Uuid::new_v4();
        let log = DriverTimeLog::open(driver_id, request_id, Utc::now());

        store.transaction(|tx| tx.create_time_log(log.clone())).unwrap();
        store
            .transaction(|tx| {
                let mut open = tx.open_time_logs(driver_id, request_id)?;
                assert_eq!(open.len(), 1);
                let mut log = open.remove(0);
                log.close(Utc::now());
                tx.update_time_log(log)?;
                assert!(tx.open_time_logs(driver_id, request_id)?.is_empty());
                Ok(())
            })
            .unwrap();

        assert_eq!(store.counts().unwrap().open_time_logs, 0);
    }
}
