pub mod dispute;
pub mod driver;
pub mod event;
pub mod ledger;
pub mod receipt;
pub mod request;
