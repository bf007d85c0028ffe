pub mod audit;
pub mod error;
pub mod geocode;
pub mod identity;
pub mod notify;
pub mod reports;
pub mod security;
pub mod server;
pub mod storage;
pub mod telemetry;
