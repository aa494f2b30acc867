use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::model::{EventCode, NormalizedEvent, Trip};

/// Trip currently being built for one equipment. The `events` sequence is
/// non-empty from the moment the trip opens (it always holds the opening W).
#[derive(Debug)]
struct OpenTrip {
    origin_city_id: i32,
    start_utc: DateTime<Utc>,
    events: Vec<NormalizedEvent>,
}

impl OpenTrip {
    fn start(event: &NormalizedEvent) -> Self {
        Self {
            origin_city_id: event.city_id,
            start_utc: event.event_time_utc,
            events: vec![event.clone()],
        }
    }

    fn attach(&mut self, event: &NormalizedEvent) {
        self.events.push(event.clone());
    }

    /// Close on a Z (Placed) event: destination and end come from the Z.
    fn place(mut self, equipment_id: &str, event: &NormalizedEvent) -> Trip {
        self.events.push(event.clone());
        self.into_trip(equipment_id, event.city_id, event.event_time_utc)
    }

    /// Close without a matching Z: the last attached event stands in as the
    /// destination/end. With nothing beyond the opening W this degenerates
    /// to destination = origin and end = start.
    fn close_incomplete(self, equipment_id: &str) -> Trip {
        let (destination_city_id, end_utc) = match self.events.last() {
            Some(last) => (last.city_id, last.event_time_utc),
            None => (self.origin_city_id, self.start_utc),
        };
        self.into_trip(equipment_id, destination_city_id, end_utc)
    }

    fn into_trip(
        self,
        equipment_id: &str,
        destination_city_id: i32,
        end_utc: DateTime<Utc>,
    ) -> Trip {
        let total_hours = (end_utc - self.start_utc).num_seconds() as f64 / 3600.0;
        Trip {
            equipment_id: equipment_id.to_string(),
            origin_city_id: self.origin_city_id,
            destination_city_id,
            start_utc: self.start_utc,
            end_utc,
            total_hours,
            events: self.events,
        }
    }
}

/// Walk one equipment's events, sorted ascending by UTC time, and partition
/// them into trips.
///
/// State machine per equipment: no open trip, or exactly one open trip.
///   - W opens a trip (closing any previous one as incomplete first; a
///     second W while open signals a missed closing event, and
///     close-and-restart keeps the structure self-healing instead of
///     dropping data).
///   - A and D attach to the open trip; with none open they are orphaned.
///   - Z sets destination/end and emits the trip; with none open it is
///     orphaned.
///   - An unrecognized code is orphaned and leaves the state untouched.
/// A trip still open when the input ends is emitted as incomplete.
pub fn assemble_trips(equipment_id: &str, events: &[NormalizedEvent]) -> (Vec<Trip>, usize) {
    let mut trips = Vec::new();
    let mut orphaned = 0usize;
    let mut open: Option<OpenTrip> = None;

    for event in events {
        match EventCode::try_from(event.event_code.as_str()) {
            Ok(EventCode::Released) => {
                if let Some(previous) = open.take() {
                    warn!(
                        equipment_id,
                        "new W event while a trip was still open; previous trip closed as incomplete"
                    );
                    trips.push(previous.close_incomplete(equipment_id));
                }
                open = Some(OpenTrip::start(event));
            }
            Ok(EventCode::Arrived) | Ok(EventCode::Departed) => match open.as_mut() {
                Some(trip) => trip.attach(event),
                None => {
                    orphaned += 1;
                    debug!(
                        equipment_id,
                        code = %event.event_code,
                        time = %event.event_time_utc,
                        "orphaned intermediate event (no open trip)"
                    );
                }
            },
            Ok(EventCode::Placed) => match open.take() {
                Some(trip) => trips.push(trip.place(equipment_id, event)),
                None => {
                    orphaned += 1;
                    debug!(
                        equipment_id,
                        time = %event.event_time_utc,
                        "orphaned Z event (no open trip)"
                    );
                }
            },
            Err(_) => {
                orphaned += 1;
                warn!(equipment_id, code = %event.event_code, "unrecognized event code");
            }
        }
    }

    if let Some(trip) = open.take() {
        info!(
            equipment_id,
            "trip still open at end of events, emitted as incomplete"
        );
        trips.push(trip.close_incomplete(equipment_id));
    }

    (trips, orphaned)
}
