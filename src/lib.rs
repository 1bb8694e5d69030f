pub mod config;
pub mod crl;
pub mod device;
pub mod logger;
pub mod pool;
pub mod push;
pub mod telemetry;
