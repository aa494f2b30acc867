use std::collections::HashMap;

use tracing::{info, warn};

use crate::assemble::assemble_trips;
use crate::errors::ParseError;
use crate::model::{BatchResult, CityDirectory, NormalizedEvent, Trip};
use crate::normalize::normalize_event;
use crate::parser::parse_events;

/// In-memory outcome of one batch run, before persistence. `orphaned_events`
/// already folds in the events skipped during normalization.
#[derive(Debug)]
pub struct ProcessedBatch {
    pub trips: Vec<Trip>,
    pub events_processed: usize,
    pub orphaned_events: usize,
}

impl ProcessedBatch {
    pub fn result(&self) -> BatchResult {
        BatchResult {
            success: true,
            trips_created: self.trips.len(),
            events_processed: self.events_processed,
            orphaned_events: self.orphaned_events,
            error_message: None,
        }
    }
}

/// Run the full pipeline over one upload: parse, normalize, group by
/// equipment, sort by UTC time, assemble.
///
/// Per-event failures (unknown city, unresolvable zone) are logged and
/// counted, never propagated; only a parse failure aborts. Trip order across
/// different equipment ids is not a contract; within one equipment the trips
/// come out in closing order.
pub fn process_batch(
    input: &[u8],
    directory: &CityDirectory,
) -> Result<ProcessedBatch, ParseError> {
    let raw_events = parse_events(input)?;
    info!(
        count = raw_events.len(),
        cities = directory.len(),
        "parsed raw events from upload"
    );

    let mut normalized = Vec::with_capacity(raw_events.len());
    let mut skipped = 0usize;
    for raw in &raw_events {
        match normalize_event(raw, directory) {
            Ok(event) => normalized.push(event),
            Err(err) => {
                warn!(%err, "skipping event");
                skipped += 1;
            }
        }
    }

    let events_processed = normalized.len();

    let mut groups: HashMap<String, Vec<NormalizedEvent>> = HashMap::new();
    for event in normalized {
        groups
            .entry(event.equipment_id.clone())
            .or_default()
            .push(event);
    }

    let mut trips = Vec::new();
    let mut orphaned_events = skipped;
    for (equipment_id, mut events) in groups {
        events.sort_by_key(|event| event.event_time_utc);
        let (equipment_trips, orphaned) = assemble_trips(&equipment_id, &events);
        trips.extend(equipment_trips);
        orphaned_events += orphaned;
    }

    info!(
        events = events_processed,
        trips = trips.len(),
        orphaned = orphaned_events,
        skipped,
        "assembled batch"
    );

    Ok(ProcessedBatch {
        trips,
        events_processed,
        orphaned_events,
    })
}
