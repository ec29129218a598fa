//! Departure monitor with last-known-result fallback

use tracing::{debug, warn};

use crate::client::DepartureClient;
use crate::models::{Departure, DepartureInfo, DepartureQuery};

/// Polls a [`DepartureClient`] and remembers the last departure it found
///
/// Failed or empty queries never clear what was found before: the previous
/// record (or the `"n/a"` placeholder before the first success) is returned
/// unchanged.
#[derive(Debug)]
pub struct DepartureMonitor<C> {
    client: C,
    last: Option<Departure>,
}

impl<C: DepartureClient> DepartureMonitor<C> {
    /// Create a monitor with no known departure
    pub const fn new(client: C) -> Self {
        Self { client, last: None }
    }

    /// Query the next departure and return the current record
    ///
    /// Errors are logged and swallowed; the record is replaced only when a
    /// qualifying departure was found.
    pub async fn get_departures(&mut self, query: &DepartureQuery) -> DepartureInfo {
        match self.client.next_departure(query).await {
            Ok(Some(departure)) => {
                self.last = Some(departure);
            },
            Ok(None) => {
                debug!(stop_id = %query.stop_id, "No qualifying departure; keeping last result");
            },
            Err(e) => {
                warn!(
                    stop_id = %query.stop_id,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Departure query failed; returning last known result"
                );
            },
        }

        self.info()
    }

    /// The current record without querying
    #[must_use]
    pub fn info(&self) -> DepartureInfo {
        DepartureInfo::from(self.last.as_ref())
    }

    /// The last departure found, if any
    #[must_use]
    pub const fn last_departure(&self) -> Option<&Departure> {
        self.last.as_ref()
    }

    /// The underlying client
    #[must_use]
    pub const fn client(&self) -> &C {
        &self.client
    }
}
