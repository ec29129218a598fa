//! Transport NSW open data client
//!
//! Queries the trip planner departure monitor for a stop and looks up the
//! live position of the departing vehicle in the GTFS-realtime feeds.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
#[cfg(test)]
use mockall::automock;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument, warn};

use crate::config::{PositionFailurePolicy, TransportNswConfig};
use crate::departures::{self, EventFilter, EventOutcome};
use crate::error::TransportNswError;
use crate::models::{Departure, DepartureQuery, VehicleFeed, VehiclePosition};
use crate::vehicle_positions;

/// Path of the trip planner departure monitor
const DEPARTURE_MONITOR_PATH: &str = "/tp/departure_mon";

/// Fixed departure monitor parameters; `name_dm` carries the stop
const DEPARTURE_MONITOR_PARAMS: [(&str, &str); 7] = [
    ("outputFormat", "rapidJSON"),
    ("coordOutputFormat", "EPSG:4326"),
    ("mode", "direct"),
    ("type_dm", "stop"),
    ("departureMonitorMacro", "true"),
    ("TfNSWDM", "true"),
    ("version", "10.2.1.42"),
];

/// Trait for departure lookups
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DepartureClient: Send + Sync {
    /// Find the next departure matching the query
    ///
    /// Returns `Ok(None)` when the stop has no qualifying departure.
    async fn next_departure(
        &self,
        query: &DepartureQuery,
    ) -> Result<Option<Departure>, TransportNswError>;

    /// Check if the API is reachable
    async fn is_healthy(&self) -> bool;
}

/// Client for the Transport NSW open data API
#[derive(Debug)]
pub struct TransportNswClient {
    client: Client,
    config: TransportNswConfig,
}

impl TransportNswClient {
    /// Create a new Transport NSW client
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be initialized.
    pub fn new(config: &TransportNswConfig) -> Result<Self, TransportNswError> {
        config
            .validate()
            .map_err(TransportNswError::ConfigurationError)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| TransportNswError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// The configuration this client was built with
    #[must_use]
    pub const fn config(&self) -> &TransportNswConfig {
        &self.config
    }

    /// Look up the current position of the vehicle running `trip_id`
    ///
    /// Returns `Ok(None)` when no vehicle in the feed serves the trip.
    #[instrument(skip(self, api_key))]
    pub async fn vehicle_position(
        &self,
        feed: VehicleFeed,
        trip_id: &str,
        api_key: &SecretString,
    ) -> Result<Option<VehiclePosition>, TransportNswError> {
        let url = format!("{}{}", self.config.base_url, feed.path());

        debug!(?url, "Fetching vehicle positions");

        let request = self
            .client
            .get(&url)
            .header(AUTHORIZATION, authorization(api_key));
        let bytes = self
            .send(request)
            .await?
            .bytes()
            .await
            .map_err(|e| TransportNswError::ConnectionFailed(e.to_string()))?;

        let message = vehicle_positions::decode_feed(&bytes)?;
        debug!(entities = message.entity.len(), "Vehicle position feed decoded");

        let position = vehicle_positions::find_vehicle_position(&message, trip_id);
        if position.is_none() {
            debug!("Trip not present in vehicle position feed");
        }
        Ok(position)
    }

    /// Fetch the raw departure monitor body for a stop
    async fn fetch_departure_monitor(
        &self,
        query: &DepartureQuery,
    ) -> Result<String, TransportNswError> {
        let url = format!("{}{DEPARTURE_MONITOR_PATH}", self.config.base_url);

        debug!(?url, "Querying departure monitor");

        let request = self
            .client
            .get(&url)
            .query(&DEPARTURE_MONITOR_PARAMS)
            .query(&[("name_dm", query.stop_id.as_str())])
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, authorization(&query.api_key));

        self.send(request)
            .await?
            .text()
            .await
            .map_err(|e| TransportNswError::ParseError(e.to_string()))
    }

    /// Position for an enriched departure, honoring the failure policy
    async fn locate_vehicle(
        &self,
        departure: &Departure,
        api_key: &SecretString,
    ) -> Result<Option<VehiclePosition>, TransportNswError> {
        let Some(feed) = departure.mode.and_then(|mode| mode.vehicle_feed()) else {
            debug!(mode = ?departure.mode, "No vehicle position feed for mode");
            return Ok(None);
        };

        let Some(trip_id) = departure.trip_id.as_deref() else {
            debug!("Departure has no realtime trip id; skipping position lookup");
            return Ok(None);
        };

        match self.vehicle_position(feed, trip_id, api_key).await {
            Ok(position) => Ok(position),
            Err(e) => match self.config.position_failure {
                PositionFailurePolicy::AbortQuery => Err(e),
                PositionFailurePolicy::KeepDeparture => {
                    warn!(
                        error = %e,
                        "Vehicle position lookup failed; keeping departure without position"
                    );
                    Ok(None)
                },
            },
        }
    }

    /// Send a request once and map transport and status failures
    async fn send(&self, request: RequestBuilder) -> Result<Response, TransportNswError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportNswError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                }
            } else {
                TransportNswError::ConnectionFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TransportNswError::Unauthorized {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            return Err(TransportNswError::RequestFailed(format!("HTTP {status}")));
        }

        Ok(response)
    }
}

#[async_trait]
impl DepartureClient for TransportNswClient {
    #[instrument(
        skip(self, query),
        fields(stop_id = %query.stop_id, route = %query.route, destination = %query.destination)
    )]
    async fn next_departure(
        &self,
        query: &DepartureQuery,
    ) -> Result<Option<Departure>, TransportNswError> {
        let body = self.fetch_departure_monitor(query).await?;

        let Some(events) = departures::parse_departure_monitor(&body)?.stop_events else {
            return Err(TransportNswError::NoStopEvents {
                stop_id: query.stop_id.clone(),
            });
        };

        let now = Utc::now();
        let filter = EventFilter::from_query(query);

        for value in filter.apply(&events) {
            let event = departures::parse_stop_event(value)?;
            match departures::evaluate_event(&event, query, now)? {
                EventOutcome::Enriched(mut departure) => {
                    departure.position = self.locate_vehicle(&departure, &query.api_key).await?;
                    debug!(
                        route = %departure.route,
                        due = departure.due_minutes,
                        delay = departure.delay_minutes,
                        "Departure found"
                    );
                    return Ok(Some(departure));
                },
                EventOutcome::NotInFuture => {
                    debug!(route = %event.transportation.number, "Skipping departure in the past");
                },
                EventOutcome::BelowThreshold { due_minutes } => {
                    debug!(
                        route = %event.transportation.number,
                        due_minutes,
                        min_due_minutes = query.min_due_minutes,
                        "Skipping departure below minimum due time"
                    );
                },
            }
        }

        debug!(?filter, "No qualifying departure");
        Ok(None)
    }

    async fn is_healthy(&self) -> bool {
        let url = format!("{}{DEPARTURE_MONITOR_PATH}", self.config.base_url);
        self.client.get(&url).send().await.is_ok()
    }
}

/// `Authorization` header value for an open data API key
fn authorization(api_key: &SecretString) -> String {
    format!("apikey {}", api_key.expose_secret())
}
