// Re-export the protocol crate so downstream binaries can reach message
// types through netcal_core::protocol::*.
pub use netcal_protocol as protocol;

pub mod assignment;
pub mod cancel;
pub mod config;
pub mod error;
pub mod evallog;
pub mod params;
pub mod pipeline;
pub mod population;
pub mod strategy;
pub mod tally;
pub mod transit;

pub use error::{NcResult, NetcalError};
