//! Departure monitor response handling
//!
//! Raw `stopEvents` deserialization, candidate filtering, and the per-event
//! evaluation that turns a scheduled stop event into a [`Departure`].

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::Deserialize;
use serde::de::{Deserializer, IgnoredAny};
use serde_json::Value;
use tracing::debug;

use crate::error::TransportNswError;
use crate::models::{Departure, DepartureQuery, TransportMode};

/// Timestamp format used by the trip planner (always UTC)
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Which stop events are considered, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EventFilter<'a> {
    /// Events heading to this destination name
    Destination(&'a str),
    /// Events of this route number
    Route(&'a str),
    /// Every event
    Any,
}

impl<'a> EventFilter<'a> {
    /// Destination beats route; empty strings mean no filter
    pub(crate) fn from_query(query: &'a DepartureQuery) -> Self {
        if !query.destination.is_empty() {
            Self::Destination(&query.destination)
        } else if !query.route.is_empty() {
            Self::Route(&query.route)
        } else {
            Self::Any
        }
    }

    /// Events lacking the filtered field never match
    fn matches(self, event: &Value) -> bool {
        match self {
            Self::Destination(name) => {
                string_at(event, "/transportation/destination/name") == Some(name)
            },
            Self::Route(number) => string_at(event, "/transportation/number") == Some(number),
            Self::Any => true,
        }
    }

    /// Matching events in response order
    pub(crate) fn apply<'e>(self, events: &'e [Value]) -> impl Iterator<Item = &'e Value> {
        events.iter().filter(move |event| self.matches(event))
    }
}

fn string_at<'v>(event: &'v Value, pointer: &str) -> Option<&'v str> {
    event.pointer(pointer).and_then(Value::as_str)
}

/// Result of evaluating one stop event
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EventOutcome {
    /// The estimated departure is not after now
    NotInFuture,
    /// Due in no more than the configured minimum
    BelowThreshold {
        /// Minutes until departure
        due_minutes: i64,
    },
    /// A usable departure, still without a vehicle position
    Enriched(Departure),
}

/// Evaluate a stop event against `now` and the query's minimum due time
pub(crate) fn evaluate_event(
    event: &RawStopEvent,
    query: &DepartureQuery,
    now: DateTime<Utc>,
) -> Result<EventOutcome, TransportNswError> {
    let planned = parse_timestamp(&event.departure_time_planned)?;

    let (estimated, real_time) = if event.is_realtime_controlled {
        let raw = event.departure_time_estimated.as_deref().ok_or_else(|| {
            TransportNswError::ParseError(
                "departureTimeEstimated missing on a realtime controlled event".to_string(),
            )
        })?;
        (parse_timestamp(raw)?, true)
    } else {
        (planned, false)
    };

    if estimated <= now {
        return Ok(EventOutcome::NotInFuture);
    }

    let due = due_minutes(estimated, now);
    if due <= query.min_due_minutes {
        return Ok(EventOutcome::BelowThreshold { due_minutes: due });
    }

    let transportation = &event.transportation;
    Ok(EventOutcome::Enriched(Departure {
        stop_id: query.stop_id.clone(),
        route: transportation.number.clone(),
        due_minutes: due,
        delay_minutes: delay_minutes(planned, estimated),
        planned,
        estimated,
        real_time,
        destination: transportation.destination.name.clone(),
        mode: TransportMode::from_icon_code(transportation.product.class),
        occupancy: event
            .location
            .as_ref()
            .and_then(|location| location.properties.as_ref())
            .and_then(|properties| properties.occupancy.clone()),
        trip_id: event
            .properties
            .as_ref()
            .and_then(|properties| properties.realtime_trip_id.clone()),
        position: None,
    }))
}

/// Parse a trip planner timestamp such as `2026-03-02T10:05:00Z`
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, TransportNswError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| TransportNswError::ParseError(format!("Invalid timestamp {raw:?}: {e}")))
}

/// Minutes from `now` until `estimated`, rounded
pub(crate) fn due_minutes(estimated: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    rounded_minutes(estimated - now)
}

/// Signed delay of `estimated` against `planned`; early departures are negative
pub(crate) fn delay_minutes(planned: DateTime<Utc>, estimated: DateTime<Utc>) -> i64 {
    if estimated >= planned {
        rounded_minutes(estimated - planned)
    } else {
        -rounded_minutes(planned - estimated)
    }
}

/// Whole minutes in `delta`, halves rounded to even
fn rounded_minutes(delta: TimeDelta) -> i64 {
    let seconds = delta.num_seconds();
    let minutes = seconds.div_euclid(60);
    match seconds.rem_euclid(60) {
        31.. => minutes + 1,
        30 if minutes % 2 != 0 => minutes + 1,
        _ => minutes,
    }
}

// --- Raw API response types for deserialization ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawDepartureMonitor {
    pub(crate) stop_events: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawStopEvent {
    pub(crate) transportation: RawTransportation,
    pub(crate) departure_time_planned: String,
    pub(crate) departure_time_estimated: Option<String>,
    #[serde(default, deserialize_with = "key_present")]
    pub(crate) is_realtime_controlled: bool,
    pub(crate) location: Option<RawLocation>,
    pub(crate) properties: Option<RawEventProperties>,
}

/// The key marks a live estimate whatever its value, `null` included
fn key_present<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    IgnoredAny::deserialize(deserializer).map(|_| true)
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTransportation {
    pub(crate) number: String,
    pub(crate) destination: RawDestination,
    pub(crate) product: RawProduct,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawDestination {
    pub(crate) name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawProduct {
    pub(crate) class: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawLocation {
    pub(crate) properties: Option<RawLocationProperties>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawLocationProperties {
    pub(crate) occupancy: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawEventProperties {
    #[serde(rename = "RealtimeTripId")]
    pub(crate) realtime_trip_id: Option<String>,
}

/// Parse a departure monitor response body
///
/// Stop events stay as JSON values; each is typed by [`parse_stop_event`]
/// only when it is evaluated.
pub(crate) fn parse_departure_monitor(
    body: &str,
) -> Result<RawDepartureMonitor, TransportNswError> {
    let monitor: RawDepartureMonitor =
        serde_json::from_str(body).map_err(|e| TransportNswError::ParseError(e.to_string()))?;

    if let Some(events) = &monitor.stop_events {
        debug!(count = events.len(), "Stop events received");
    }

    Ok(monitor)
}

/// Type one entry of `stopEvents`
pub(crate) fn parse_stop_event(event: &Value) -> Result<RawStopEvent, TransportNswError> {
    RawStopEvent::deserialize(event)
        .map_err(|e| TransportNswError::ParseError(format!("Invalid stop event: {e}")))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, minute, second).unwrap()
    }

    fn event(number: &str, destination: &str, class: i64, planned: &str) -> RawStopEvent {
        RawStopEvent {
            transportation: RawTransportation {
                number: number.to_string(),
                destination: RawDestination {
                    name: destination.to_string(),
                },
                product: RawProduct { class },
            },
            departure_time_planned: planned.to_string(),
            departure_time_estimated: None,
            is_realtime_controlled: false,
            location: None,
            properties: None,
        }
    }

    fn realtime(mut event: RawStopEvent, estimated: &str) -> RawStopEvent {
        event.departure_time_estimated = Some(estimated.to_string());
        event.is_realtime_controlled = true;
        event
    }

    fn raw_event(number: &str, destination: &str, planned: &str) -> Value {
        serde_json::json!({
            "departureTimePlanned": planned,
            "transportation": {
                "number": number,
                "destination": { "name": destination },
                "product": { "class": 1 }
            }
        })
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("2026-03-02T10:05:00Z").unwrap(), at(10, 5, 0));
        assert!(parse_timestamp("2026-03-02T10:05:00+10:00").is_err());
        assert!(parse_timestamp("not a time").is_err());
    }

    #[test]
    fn test_rounded_minutes_halves_to_even() {
        assert_eq!(rounded_minutes(TimeDelta::seconds(0)), 0);
        assert_eq!(rounded_minutes(TimeDelta::seconds(29)), 0);
        assert_eq!(rounded_minutes(TimeDelta::seconds(30)), 0);
        assert_eq!(rounded_minutes(TimeDelta::seconds(31)), 1);
        assert_eq!(rounded_minutes(TimeDelta::seconds(90)), 2);
        assert_eq!(rounded_minutes(TimeDelta::seconds(150)), 2);
        assert_eq!(rounded_minutes(TimeDelta::seconds(600)), 10);
    }

    #[test]
    fn test_due_minutes() {
        assert_eq!(due_minutes(at(10, 5, 0), at(9, 50, 0)), 15);
        assert_eq!(due_minutes(at(10, 0, 40), at(10, 0, 0)), 1);
    }

    #[test]
    fn test_delay_sign_convention() {
        assert_eq!(delay_minutes(at(10, 0, 0), at(10, 5, 0)), 5);
        assert_eq!(delay_minutes(at(10, 5, 0), at(10, 0, 0)), -5);
        assert_eq!(delay_minutes(at(10, 0, 0), at(10, 0, 0)), 0);
    }

    #[test]
    fn test_filter_priority() {
        let query = DepartureQuery::new("200060", "key");
        assert_eq!(EventFilter::from_query(&query), EventFilter::Any);

        let query = query.with_route("T1");
        assert_eq!(EventFilter::from_query(&query), EventFilter::Route("T1"));

        let query = query.with_destination("Central");
        assert_eq!(EventFilter::from_query(&query), EventFilter::Destination("Central"));
    }

    #[test]
    fn test_destination_filter_wins_over_route() {
        let events = vec![
            raw_event("T1", "Hornsby", "2026-03-02T10:00:00Z"),
            raw_event("T2", "Central", "2026-03-02T10:02:00Z"),
            raw_event("T1", "Central", "2026-03-02T10:04:00Z"),
        ];
        let query = DepartureQuery::new("200060", "key")
            .with_route("T1")
            .with_destination("Central");

        let matched: Vec<&str> = EventFilter::from_query(&query)
            .apply(&events)
            .filter_map(|e| string_at(e, "/departureTimePlanned"))
            .collect();
        assert_eq!(matched, vec!["2026-03-02T10:02:00Z", "2026-03-02T10:04:00Z"]);
    }

    #[test]
    fn test_route_filter_keeps_order() {
        let events = vec![
            raw_event("T1", "Hornsby", "2026-03-02T10:00:00Z"),
            raw_event("T2", "Central", "2026-03-02T10:02:00Z"),
            raw_event("T1", "Emu Plains", "2026-03-02T10:04:00Z"),
        ];
        let query = DepartureQuery::new("200060", "key").with_route("T1");

        let matched: Vec<&str> = EventFilter::from_query(&query)
            .apply(&events)
            .filter_map(|e| string_at(e, "/transportation/destination/name"))
            .collect();
        assert_eq!(matched, vec!["Hornsby", "Emu Plains"]);
    }

    #[test]
    fn test_empty_filters_match_everything() {
        let events = vec![
            raw_event("T1", "Hornsby", "2026-03-02T10:00:00Z"),
            raw_event("", "", "2026-03-02T10:02:00Z"),
        ];
        let query = DepartureQuery::new("200060", "key");
        assert_eq!(EventFilter::from_query(&query).apply(&events).count(), 2);
    }

    #[test]
    fn test_filter_skips_events_missing_the_field() {
        let events = vec![
            serde_json::json!({ "transportation": { "destination": { "name": "Footpath" } } }),
            raw_event("T1", "Central", "2026-03-02T10:00:00Z"),
        ];
        let query = DepartureQuery::new("200060", "key").with_route("T1");
        assert_eq!(EventFilter::from_query(&query).apply(&events).count(), 1);
    }

    #[test]
    fn test_realtime_event_is_enriched() {
        let event = realtime(
            event("T1", "Central", 1, "2026-03-02T10:00:00Z"),
            "2026-03-02T10:05:00Z",
        );
        let query = DepartureQuery::new("200060", "key");

        let outcome = evaluate_event(&event, &query, at(9, 55, 0)).unwrap();
        let EventOutcome::Enriched(departure) = outcome else {
            panic!("expected an enriched departure");
        };
        assert_eq!(departure.stop_id, "200060");
        assert_eq!(departure.route, "T1");
        assert_eq!(departure.due_minutes, 10);
        assert_eq!(departure.delay_minutes, 5);
        assert!(departure.real_time);
        assert_eq!(departure.destination, "Central");
        assert_eq!(departure.mode, Some(TransportMode::Train));
        assert_eq!(departure.planned, at(10, 0, 0));
        assert_eq!(departure.estimated, at(10, 5, 0));
        assert!(departure.position.is_none());
    }

    #[test]
    fn test_scheduled_event_uses_planned_time() {
        let event = event("333", "Bondi Beach", 5, "2026-03-02T10:00:00Z");
        let query = DepartureQuery::new("200060", "key");

        let outcome = evaluate_event(&event, &query, at(9, 50, 0)).unwrap();
        let EventOutcome::Enriched(departure) = outcome else {
            panic!("expected an enriched departure");
        };
        assert_eq!(departure.due_minutes, 10);
        assert_eq!(departure.delay_minutes, 0);
        assert!(!departure.real_time);
        assert_eq!(departure.estimated, departure.planned);
        assert_eq!(departure.mode, Some(TransportMode::Bus));
        assert!(departure.occupancy.is_none());
        assert!(departure.trip_id.is_none());
    }

    #[test]
    fn test_past_event_is_rejected() {
        let event = event("T1", "Central", 1, "2026-03-02T10:00:00Z");
        let query = DepartureQuery::new("200060", "key");
        assert_eq!(
            evaluate_event(&event, &query, at(10, 0, 0)).unwrap(),
            EventOutcome::NotInFuture
        );
        assert_eq!(
            evaluate_event(&event, &query, at(10, 1, 0)).unwrap(),
            EventOutcome::NotInFuture
        );
    }

    #[test]
    fn test_late_estimate_keeps_past_planned_event() {
        let event = realtime(
            event("T1", "Central", 1, "2026-03-02T09:58:00Z"),
            "2026-03-02T10:04:00Z",
        );
        let query = DepartureQuery::new("200060", "key");

        let outcome = evaluate_event(&event, &query, at(10, 0, 0)).unwrap();
        let EventOutcome::Enriched(departure) = outcome else {
            panic!("expected an enriched departure");
        };
        assert_eq!(departure.due_minutes, 4);
        assert_eq!(departure.delay_minutes, 6);
    }

    #[test]
    fn test_due_equal_to_threshold_is_rejected() {
        let event = event("T1", "Central", 1, "2026-03-02T10:05:00Z");
        let query = DepartureQuery::new("200060", "key").with_min_due_minutes(5);
        assert_eq!(
            evaluate_event(&event, &query, at(10, 0, 0)).unwrap(),
            EventOutcome::BelowThreshold { due_minutes: 5 }
        );

        let query = query.with_min_due_minutes(4);
        assert!(matches!(
            evaluate_event(&event, &query, at(10, 0, 0)).unwrap(),
            EventOutcome::Enriched(_)
        ));
    }

    #[test]
    fn test_unknown_icon_code_has_no_mode() {
        let event = event("F1", "Manly", 42, "2026-03-02T10:30:00Z");
        let query = DepartureQuery::new("10101100", "key");
        let outcome = evaluate_event(&event, &query, at(10, 0, 0)).unwrap();
        let EventOutcome::Enriched(departure) = outcome else {
            panic!("expected an enriched departure");
        };
        assert!(departure.mode.is_none());
    }

    #[test]
    fn test_realtime_flag_without_estimate_is_error() {
        let mut event = event("T1", "Central", 1, "2026-03-02T10:00:00Z");
        event.is_realtime_controlled = true;
        let query = DepartureQuery::new("200060", "key");
        assert!(matches!(
            evaluate_event(&event, &query, at(9, 0, 0)),
            Err(TransportNswError::ParseError(_))
        ));
    }

    #[test]
    fn test_parse_full_stop_event() {
        let json = r#"{
            "version": "10.2.1.42",
            "stopEvents": [{
                "isRealtimeControlled": true,
                "location": {
                    "id": "2000334",
                    "name": "Central Station, Platform 16",
                    "properties": { "occupancy": "MANY_SEATS" }
                },
                "departureTimePlanned": "2026-03-02T10:00:00Z",
                "departureTimeEstimated": "2026-03-02T10:02:00Z",
                "transportation": {
                    "number": "T1",
                    "destination": { "name": "Emu Plains" },
                    "product": { "class": 1, "name": "Sydney Trains Network" }
                },
                "properties": { "RealtimeTripId": "112X.1401.133.8.A.8.83251098" }
            }]
        }"#;

        let monitor = parse_departure_monitor(json).unwrap();
        let events = monitor.stop_events.unwrap();
        assert_eq!(events.len(), 1);

        let event = parse_stop_event(&events[0]).unwrap();
        assert!(event.is_realtime_controlled);

        let query = DepartureQuery::new("200060", "key");
        let outcome = evaluate_event(&event, &query, at(9, 52, 0)).unwrap();
        let EventOutcome::Enriched(departure) = outcome else {
            panic!("expected an enriched departure");
        };
        assert_eq!(departure.occupancy.as_deref(), Some("MANY_SEATS"));
        assert_eq!(
            departure.trip_id.as_deref(),
            Some("112X.1401.133.8.A.8.83251098")
        );
        assert_eq!(departure.delay_minutes, 2);
        assert_eq!(departure.due_minutes, 10);
    }

    #[test]
    fn test_parse_missing_stop_events() {
        let monitor = parse_departure_monitor(r#"{ "version": "10.2.1.42" }"#).unwrap();
        assert!(monitor.stop_events.is_none());
    }

    #[test]
    fn test_null_realtime_flag_still_marks_estimate() {
        let mut value = raw_event("T1", "Central", "2026-03-02T10:00:00Z");
        value["isRealtimeControlled"] = Value::Null;
        value["departureTimeEstimated"] = Value::from("2026-03-02T10:03:00Z");

        let event = parse_stop_event(&value).unwrap();
        assert!(event.is_realtime_controlled);

        let query = DepartureQuery::new("200060", "key");
        let outcome = evaluate_event(&event, &query, at(9, 50, 0)).unwrap();
        let EventOutcome::Enriched(departure) = outcome else {
            panic!("expected an enriched departure");
        };
        assert!(departure.real_time);
        assert_eq!(departure.delay_minutes, 3);
    }

    #[test]
    fn test_absent_realtime_flag_uses_planned_time() {
        let mut value = raw_event("T1", "Central", "2026-03-02T10:00:00Z");
        value["departureTimeEstimated"] = Value::from("2026-03-02T10:03:00Z");

        let event = parse_stop_event(&value).unwrap();
        assert!(!event.is_realtime_controlled);
    }

    #[test]
    fn test_malformed_event_is_rejected_only_when_typed() {
        let body = r#"{
            "stopEvents": [
                {
                    "departureTimePlanned": "2026-03-02T10:00:00Z",
                    "transportation": {
                        "number": "T1",
                        "destination": { "name": "Central" },
                        "product": { "class": 1 }
                    }
                },
                {
                    "departureTimePlanned": "2026-03-02T10:05:00Z",
                    "transportation": {
                        "destination": { "name": "Footpath" },
                        "product": { "class": 99 }
                    }
                }
            ]
        }"#;

        let events = parse_departure_monitor(body).unwrap().stop_events.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(parse_stop_event(&events[0]).unwrap().transportation.number, "T1");
        assert!(matches!(
            parse_stop_event(&events[1]),
            Err(TransportNswError::ParseError(_))
        ));
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(matches!(
            parse_departure_monitor("not json"),
            Err(TransportNswError::ParseError(_))
        ));
    }

    mod proptest_tests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn delay_sign_follows_estimate(offset in -86_400i64..86_400) {
                let planned = at(10, 0, 0);
                let estimated = planned + TimeDelta::seconds(offset);
                let delay = delay_minutes(planned, estimated);

                if offset > 30 {
                    prop_assert!(delay > 0);
                } else if offset < -30 {
                    prop_assert!(delay < 0);
                } else {
                    prop_assert_eq!(delay, 0);
                }
                prop_assert_eq!(delay, -delay_minutes(estimated, planned));
            }

            #[test]
            fn due_is_never_negative_for_future_departures(ahead in 1i64..172_800) {
                let now = at(10, 0, 0);
                prop_assert!(due_minutes(now + TimeDelta::seconds(ahead), now) >= 0);
            }
        }
    }
}
