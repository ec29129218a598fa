//! Transport NSW departure monitor
//!
//! Finds the next departure at a stop via the Transport for NSW trip planner
//! [departure monitor](https://opendata.transport.nsw.gov.au) and enriches it
//! with the live vehicle position from the GTFS-realtime vehicle position
//! feeds.
//!
//! # Architecture
//!
//! [`DepartureClient`] defines the lookup, implemented by
//! [`TransportNswClient`], which returns typed [`Departure`]s and explicit
//! errors. [`DepartureMonitor`] wraps a client, remembers the last departure
//! it found and hands out flat [`DepartureInfo`] records, falling back to the
//! previous record whenever a query fails.
//!
//! # Example
//!
//! ```rust,ignore
//! use integration_transport_nsw::{
//!     DepartureMonitor, DepartureQuery, TransportNswClient, TransportNswConfig,
//! };
//!
//! let client = TransportNswClient::new(&TransportNswConfig::default())?;
//! let mut monitor = DepartureMonitor::new(client);
//!
//! let query = DepartureQuery::new("200060", api_key).with_route("T1");
//! let info = monitor.get_departures(&query).await;
//! println!("{info}");
//! ```

#![warn(missing_docs)]

mod client;
mod config;
mod departures;
mod error;
mod models;
mod monitor;
mod vehicle_positions;

pub use client::{DepartureClient, TransportNswClient};
pub use config::{PositionFailurePolicy, TransportNswConfig};
pub use error::TransportNswError;
pub use models::{
    Departure, DepartureInfo, DepartureQuery, NOT_AVAILABLE, TransportMode, VehicleFeed,
    VehiclePosition,
};
pub use monitor::DepartureMonitor;
