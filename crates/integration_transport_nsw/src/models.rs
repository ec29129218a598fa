//! Departure data models
//!
//! Typed representations of a departure query, the enriched departure it
//! yields, and the flat eleven-field record handed to callers.

use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Placeholder rendered for every field of a record with no departure
pub const NOT_AVAILABLE: &str = "n/a";

/// Parameters of a single departure query
#[derive(Debug, Clone)]
pub struct DepartureQuery {
    /// Stop identifier as used by the trip planner (e.g. "200060")
    pub stop_id: String,
    /// Route number filter, empty for any route
    pub route: String,
    /// Destination name filter, empty for any destination
    pub destination: String,
    /// Open data API key
    pub api_key: SecretString,
    /// Departures due in this many minutes or fewer are skipped
    pub min_due_minutes: i64,
}

impl DepartureQuery {
    /// Query for the next departure of any route at a stop
    pub fn new(stop_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            stop_id: stop_id.into(),
            route: String::new(),
            destination: String::new(),
            api_key: SecretString::from(api_key.into()),
            min_due_minutes: 0,
        }
    }

    /// Restrict to departures of one route number
    #[must_use]
    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = route.into();
        self
    }

    /// Restrict to departures heading to one destination
    #[must_use]
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }

    /// Skip departures due in `minutes` or fewer
    #[must_use]
    pub fn with_min_due_minutes(mut self, minutes: i64) -> Self {
        self.min_due_minutes = minutes;
        self
    }
}

/// Transport mode derived from the trip planner's product class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportMode {
    /// Sydney Trains and NSW TrainLink
    Train,
    /// Light rail
    Lightrail,
    /// Bus
    Bus,
    /// Coach
    Coach,
    /// Ferry
    Ferry,
    /// School bus
    Schoolbus,
}

impl TransportMode {
    /// Map a product class (icon code) to a mode; unknown codes yield `None`
    #[must_use]
    pub const fn from_icon_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Train),
            4 => Some(Self::Lightrail),
            5 => Some(Self::Bus),
            7 => Some(Self::Coach),
            9 => Some(Self::Ferry),
            11 => Some(Self::Schoolbus),
            _ => None,
        }
    }

    /// Human-readable mode name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Train => "Train",
            Self::Lightrail => "Lightrail",
            Self::Bus => "Bus",
            Self::Coach => "Coach",
            Self::Ferry => "Ferry",
            Self::Schoolbus => "Schoolbus",
        }
    }

    /// Vehicle position feed that tracks this mode, if any
    #[must_use]
    pub const fn vehicle_feed(&self) -> Option<VehicleFeed> {
        match self {
            Self::Train => Some(VehicleFeed::SydneyTrains),
            Self::Bus => Some(VehicleFeed::Buses),
            Self::Lightrail | Self::Coach | Self::Ferry | Self::Schoolbus => None,
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// GTFS-realtime vehicle position feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VehicleFeed {
    /// Sydney Trains vehicle positions
    SydneyTrains,
    /// Bus vehicle positions
    Buses,
}

impl VehicleFeed {
    /// Path of the feed relative to the API base URL
    #[must_use]
    pub const fn path(&self) -> &'static str {
        match self {
            Self::SydneyTrains => "/gtfs/vehiclepos/sydneytrains",
            Self::Buses => "/gtfs/vehiclepos/buses",
        }
    }
}

/// Last reported position of a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehiclePosition {
    /// Latitude in WGS84 degrees
    pub latitude: f32,
    /// Longitude in WGS84 degrees
    pub longitude: f32,
}

/// The next qualifying departure at a stop, enriched with live data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Departure {
    /// Stop the departure was queried for
    pub stop_id: String,
    /// Route number (e.g. "T1")
    pub route: String,
    /// Minutes until the estimated departure, rounded
    pub due_minutes: i64,
    /// Signed minutes between estimated and planned departure
    pub delay_minutes: i64,
    /// Timetabled departure time
    pub planned: DateTime<Utc>,
    /// Estimated departure time (equals `planned` without realtime data)
    pub estimated: DateTime<Utc>,
    /// Whether the estimate comes from live tracking
    pub real_time: bool,
    /// Destination name
    pub destination: String,
    /// Transport mode, `None` for unknown product classes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<TransportMode>,
    /// Occupancy descriptor as reported by the API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupancy: Option<String>,
    /// Realtime trip identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<String>,
    /// Vehicle position matched through the trip identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<VehiclePosition>,
}

/// Flat departure record with `"n/a"` for every unknown field
///
/// Built in one step from an optional [`Departure`], so a record is either
/// entirely the placeholder set or entirely describes one departure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartureInfo {
    /// Stop the departure was queried for
    pub stop_id: String,
    /// Route number
    pub route: String,
    /// Minutes until departure
    pub due: String,
    /// Signed delay in minutes
    pub delay: String,
    /// `"y"`/`"n"` realtime flag
    pub real_time: String,
    /// Destination name
    pub destination: String,
    /// Transport mode name
    pub mode: String,
    /// Occupancy descriptor
    pub occupancy: String,
    /// Realtime trip identifier
    pub trip_id: String,
    /// Vehicle latitude
    pub latitude: String,
    /// Vehicle longitude
    pub longitude: String,
}

impl DepartureInfo {
    /// Record with every field set to `"n/a"`
    #[must_use]
    pub fn not_available() -> Self {
        let na = || NOT_AVAILABLE.to_string();
        Self {
            stop_id: na(),
            route: na(),
            due: na(),
            delay: na(),
            real_time: na(),
            destination: na(),
            mode: na(),
            occupancy: na(),
            trip_id: na(),
            latitude: na(),
            longitude: na(),
        }
    }

    /// Whether this record describes a departure
    #[must_use]
    pub fn is_available(&self) -> bool {
        *self != Self::not_available()
    }
}

impl Default for DepartureInfo {
    fn default() -> Self {
        Self::not_available()
    }
}

impl From<&Departure> for DepartureInfo {
    fn from(departure: &Departure) -> Self {
        let or_na = |value: Option<String>| value.unwrap_or_else(|| NOT_AVAILABLE.to_string());
        Self {
            stop_id: departure.stop_id.clone(),
            route: departure.route.clone(),
            due: departure.due_minutes.to_string(),
            delay: departure.delay_minutes.to_string(),
            real_time: if departure.real_time { "y" } else { "n" }.to_string(),
            destination: departure.destination.clone(),
            mode: or_na(departure.mode.map(|m| m.as_str().to_string())),
            occupancy: or_na(departure.occupancy.clone()),
            trip_id: or_na(departure.trip_id.clone()),
            latitude: or_na(departure.position.map(|p| p.latitude.to_string())),
            longitude: or_na(departure.position.map(|p| p.longitude.to_string())),
        }
    }
}

impl From<Option<&Departure>> for DepartureInfo {
    fn from(departure: Option<&Departure>) -> Self {
        departure.map_or_else(Self::not_available, Self::from)
    }
}

impl fmt::Display for DepartureInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_available() {
            return write!(f, "No departure information");
        }

        write!(
            f,
            "{} {} to {} in {} min (delay {} min, realtime {})",
            self.mode, self.route, self.destination, self.due, self.delay, self.real_time
        )?;

        if self.latitude != NOT_AVAILABLE {
            write!(f, " at {},{}", self.latitude, self.longitude)?;
        }

        Ok(())
    }
}
