//! GTFS-realtime vehicle position lookup
//!
//! Decodes a vehicle position feed and finds the vehicle serving a trip.

use prost::Message;

use crate::error::TransportNswError;
use crate::models::VehiclePosition;

/// Maximum accepted feed size (50 MB)
const MAX_FEED_SIZE: usize = 50 * 1024 * 1024;

/// Decode a protobuf-encoded vehicle position feed
pub(crate) fn decode_feed(bytes: &[u8]) -> Result<gtfs_realtime::FeedMessage, TransportNswError> {
    if bytes.len() > MAX_FEED_SIZE {
        return Err(TransportNswError::ParseError(format!(
            "Vehicle position feed too large: {} bytes (max {MAX_FEED_SIZE} bytes)",
            bytes.len()
        )));
    }

    Ok(gtfs_realtime::FeedMessage::decode(bytes)?)
}

/// Position of the first vehicle in feed order whose trip matches `trip_id`
pub(crate) fn find_vehicle_position(
    feed: &gtfs_realtime::FeedMessage,
    trip_id: &str,
) -> Option<VehiclePosition> {
    feed.entity
        .iter()
        .filter_map(|entity| entity.vehicle.as_ref())
        .find(|vehicle| {
            vehicle
                .trip
                .as_ref()
                .and_then(|trip| trip.trip_id.as_deref())
                == Some(trip_id)
        })
        .and_then(|vehicle| vehicle.position.as_ref())
        .map(|position| VehiclePosition {
            latitude: position.latitude,
            longitude: position.longitude,
        })
}
