use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// The four recognized event codes. Anything else in the feed is an
/// unrecognized code and is orphaned by the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCode {
    Released,
    Arrived,
    Departed,
    Placed,
}

impl EventCode {
    pub fn description(&self) -> &'static str {
        match self {
            EventCode::Released => "Released",
            EventCode::Arrived => "Arrived",
            EventCode::Departed => "Departed",
            EventCode::Placed => "Placed",
        }
    }
}

impl TryFrom<&str> for EventCode {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "W" => Ok(EventCode::Released),
            "A" => Ok(EventCode::Arrived),
            "D" => Ok(EventCode::Departed),
            "Z" => Ok(EventCode::Placed),
            other => Err(format!("unknown event code '{other}'")),
        }
    }
}

/// Human-readable description for a stored event code, "Unknown" for
/// anything outside the recognized set.
pub fn describe_event_code(code: &str) -> &'static str {
    EventCode::try_from(code)
        .map(|c| c.description())
        .unwrap_or("Unknown")
}

/// Reference data: a city with its IANA time zone identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct City {
    pub id: i32,
    pub name: String,
    pub time_zone: String,
}

#[derive(Debug)]
pub(crate) struct CityEntry {
    pub city: City,
    pub zone: Option<Tz>,
}

/// Immutable city lookup for one batch run. Time zone identifiers are
/// resolved once at construction; a city whose zone id does not parse stays
/// in the directory and surfaces as a per-event skip at normalization time.
#[derive(Debug, Default)]
pub struct CityDirectory {
    entries: HashMap<i32, CityEntry>,
}

impl CityDirectory {
    pub fn new(cities: Vec<City>) -> Self {
        let mut entries = HashMap::with_capacity(cities.len());
        for city in cities {
            let zone = match city.time_zone.parse::<Tz>() {
                Ok(zone) => Some(zone),
                Err(_) => {
                    tracing::warn!(
                        city_id = city.id,
                        zone = %city.time_zone,
                        "city has an unparseable time zone id"
                    );
                    None
                }
            };
            entries.insert(city.id, CityEntry { city, zone });
        }
        Self { entries }
    }

    pub fn get(&self, id: i32) -> Option<&City> {
        self.entries.get(&id).map(|entry| &entry.city)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entry(&self, id: i32) -> Option<&CityEntry> {
        self.entries.get(&id)
    }
}

/// One row of the uploaded feed, in file order, untyped beyond column
/// decoding. No semantic validation has happened yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub equipment_id: String,
    pub event_code: String,
    pub event_time: NaiveDateTime,
    pub city_id: i32,
}

/// A raw event whose city resolved successfully, with the local wall-clock
/// time converted to UTC. The local time is kept verbatim for audit; all
/// downstream ordering uses `event_time_utc`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedEvent {
    pub equipment_id: String,
    pub event_code: String,
    pub event_time_local: NaiveDateTime,
    pub event_time_utc: DateTime<Utc>,
    pub city_id: i32,
}

/// One bounded movement interval for a piece of equipment, from a W
/// (Released) event at the origin to a Z (Placed) event at the destination,
/// or closed as incomplete by the assembler's recovery policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trip {
    pub equipment_id: String,
    pub origin_city_id: i32,
    pub destination_city_id: i32,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub total_hours: f64,
    pub events: Vec<NormalizedEvent>,
}

/// Aggregate outcome of one batch upload, returned to the caller. Per-event
/// anomalies never fail the batch; the counters communicate how much of the
/// input was usable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub success: bool,
    pub trips_created: usize,
    pub events_processed: usize,
    pub orphaned_events: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl BatchResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            ..Self::default()
        }
    }
}
