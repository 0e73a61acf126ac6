//! Serial ground-control link for a deployable rover: single-byte mode
//! commands out, delimited telemetry records and JPEG image frames back
//! over the same half-duplex radio channel.

pub mod capture;
pub mod cli;
pub mod error;
pub mod port;
pub mod scan;
pub mod session;
pub mod store;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testutil;
