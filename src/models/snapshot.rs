use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::trip::{RawRecord, Trip};

/// Envelope written to both stores on every commit. The revision lets a
/// session recognize its own writes when they come back over the
/// subscription.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub revision: String,
    #[serde(rename = "savedAt")]
    pub saved_at: DateTime<Utc>,
    pub trips: Vec<Trip>,
}

impl Snapshot {
    pub fn new(trips: Vec<Trip>) -> Self {
        Self::with_revision(Uuid::new_v4().to_string(), trips)
    }

    pub fn with_revision(revision: String, trips: Vec<Trip>) -> Self {
        Snapshot {
            revision,
            saved_at: Utc::now(),
            trips,
        }
    }
}

/// A snapshot read back from a store. Payloads written by the original
/// frontend are bare trip arrays and carry no revision.
#[derive(Debug, Clone)]
pub struct IncomingSnapshot {
    pub revision: Option<String>,
    pub trips: Vec<Trip>,
}

/// Decodes whatever a store hands back, or `None` when there is nothing
/// usable. Accepted shapes: the snapshot envelope, a bare array of records,
/// or an index-keyed object of records (how the realtime store re-serializes
/// sparse arrays).
pub fn decode(value: &Value) -> Option<IncomingSnapshot> {
    match value {
        Value::Array(rows) => Some(IncomingSnapshot {
            revision: None,
            trips: trips_from(rows.iter()),
        }),
        Value::Object(map) => {
            if let Some(trips) = map.get("trips") {
                let rows = trips.as_array()?;
                Some(IncomingSnapshot {
                    revision: map
                        .get("revision")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    trips: trips_from(rows.iter()),
                })
            } else {
                let mut entries: Vec<(&String, &Value)> =
                    map.iter().filter(|(_, value)| value.is_object()).collect();
                if entries.is_empty() {
                    return None;
                }
                // index keys come back as strings, so "10" sorts before "2"
                // unless we order them numerically
                entries.sort_by_key(|(key, _)| key.parse::<u64>().unwrap_or(u64::MAX));
                Some(IncomingSnapshot {
                    revision: None,
                    trips: trips_from(entries.into_iter().map(|(_, value)| value)),
                })
            }
        }
        _ => None,
    }
}

fn trips_from<'a>(rows: impl Iterator<Item = &'a Value>) -> Vec<Trip> {
    rows.filter_map(Value::as_object)
        .map(|fields| {
            fields
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect::<RawRecord>()
        })
        .map(|raw| Trip::from_raw(&raw))
        .filter(|trip| !trip.trip_id.is_empty())
        .collect()
}
