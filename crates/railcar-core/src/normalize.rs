use chrono::offset::LocalResult;
use chrono::{DateTime, Duration, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::{OffsetComponents, Tz};
use tracing::{debug, warn};

use crate::errors::NormalizeError;
use crate::model::{CityDirectory, NormalizedEvent, RawEvent};

/// Resolve a raw event's city and convert its naive local time to UTC.
///
/// Failure here means the event is skipped (counted orphaned) by the caller,
/// never that the batch aborts. DST spring-forward gaps are repaired by the
/// adjustment policy in [`local_to_utc`] and are not an error at all.
pub fn normalize_event(
    raw: &RawEvent,
    directory: &CityDirectory,
) -> Result<NormalizedEvent, NormalizeError> {
    let entry = directory
        .entry(raw.city_id)
        .ok_or_else(|| NormalizeError::UnknownCity {
            city_id: raw.city_id,
            equipment_id: raw.equipment_id.trim().to_string(),
            event_code: raw.event_code.trim().to_string(),
        })?;

    let zone = entry.zone.ok_or_else(|| NormalizeError::InvalidTimeZone {
        city_id: raw.city_id,
        zone: entry.city.time_zone.clone(),
    })?;

    let event_time_utc = local_to_utc(raw.event_time, zone, &raw.equipment_id, &raw.event_code);

    Ok(NormalizedEvent {
        equipment_id: raw.equipment_id.trim().to_string(),
        event_code: raw.event_code.trim().to_ascii_uppercase(),
        event_time_local: raw.event_time,
        event_time_utc,
        city_id: raw.city_id,
    })
}

/// Interpret a naive wall-clock time in `zone` and convert it to UTC.
///
/// A local time inside a spring-forward gap does not exist; it is pushed
/// forward by the active rule's daylight delta (one hour when no rule can be
/// probed) and converted from there, so this never fails. Fall-back
/// ambiguous times resolve to the earlier occurrence, a documented
/// approximation rather than a precision guarantee.
pub fn local_to_utc(
    local: NaiveDateTime,
    zone: Tz,
    equipment_id: &str,
    event_code: &str,
) -> DateTime<Utc> {
    match zone.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earlier, _later) => {
            debug!(
                equipment_id,
                event_code,
                %local,
                %zone,
                "ambiguous local time (DST fall-back), using earlier occurrence"
            );
            earlier.with_timezone(&Utc)
        }
        LocalResult::None => {
            let delta = daylight_delta(zone, local);
            let adjusted = local + delta;
            warn!(
                equipment_id,
                event_code,
                %local,
                %zone,
                %adjusted,
                "invalid local time (DST gap), adjusted forward"
            );
            match zone.from_local_datetime(&adjusted) {
                LocalResult::Single(dt) => dt.with_timezone(&Utc),
                LocalResult::Ambiguous(earlier, _later) => earlier.with_timezone(&Utc),
                LocalResult::None => {
                    // Still inside a gap wider than the probed delta; fall
                    // back to the zone's offset at that instant.
                    let offset = zone.offset_from_utc_datetime(&adjusted).fix();
                    let seconds = i64::from(offset.local_minus_utc());
                    Utc.from_utc_datetime(&(adjusted - Duration::seconds(seconds)))
                }
            }
        }
    }
}

/// Daylight delta of the adjustment rule active right after a gap. Probes a
/// few instants past the gap for an unambiguous local time carrying a
/// non-zero DST offset; one hour when nothing matches.
fn daylight_delta(zone: Tz, local: NaiveDateTime) -> Duration {
    for hours in [3i64, 6, 12, 24] {
        if let LocalResult::Single(dt) = zone.from_local_datetime(&(local + Duration::hours(hours)))
        {
            let dst = dt.offset().dst_offset();
            if !dst.is_zero() {
                return dst;
            }
        }
    }
    Duration::hours(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::City;

    fn toronto_directory() -> CityDirectory {
        CityDirectory::new(vec![City {
            id: 21,
            name: "Toronto".to_string(),
            time_zone: "America/Toronto".to_string(),
        }])
    }

    fn raw(event_time: &str) -> RawEvent {
        RawEvent {
            equipment_id: " CN101 ".to_string(),
            event_code: " w ".to_string(),
            event_time: NaiveDateTime::parse_from_str(event_time, "%Y-%m-%d %H:%M:%S")
                .expect("fixture timestamp"),
            city_id: 21,
        }
    }

    #[test]
    fn normalizes_and_trims_fields() {
        let event =
            normalize_event(&raw("2024-01-15 08:00:00"), &toronto_directory()).expect("normalize");

        assert_eq!(event.equipment_id, "CN101");
        assert_eq!(event.event_code, "W");
        assert_eq!(event.city_id, 21);
        // EST is UTC-5 in January
        assert_eq!(event.event_time_utc.to_rfc3339(), "2024-01-15T13:00:00+00:00");
        assert_eq!(
            event.event_time_local,
            raw("2024-01-15 08:00:00").event_time
        );
    }

    #[test]
    fn unknown_city_is_reported() {
        let mut event = raw("2024-01-15 08:00:00");
        event.city_id = 999;
        let err = normalize_event(&event, &toronto_directory()).expect_err("expected skip");
        assert!(matches!(err, NormalizeError::UnknownCity { city_id: 999, .. }));
    }

    #[test]
    fn invalid_zone_id_is_reported() {
        let directory = CityDirectory::new(vec![City {
            id: 21,
            name: "Toronto".to_string(),
            time_zone: "Eastern Standard Time".to_string(),
        }]);
        let err = normalize_event(&raw("2024-01-15 08:00:00"), &directory).expect_err("skip");
        assert!(matches!(err, NormalizeError::InvalidTimeZone { city_id: 21, .. }));
    }

    #[test]
    fn spring_forward_gap_is_adjusted_not_failed() {
        // 2024-03-10 02:30 does not exist in America/Toronto; clocks jumped
        // from 02:00 to 03:00. Policy pushes it forward by the daylight
        // delta, so it converts as 03:30 EDT = 07:30 UTC.
        let event =
            normalize_event(&raw("2024-03-10 02:30:00"), &toronto_directory()).expect("normalize");
        assert_eq!(event.event_time_utc.to_rfc3339(), "2024-03-10T07:30:00+00:00");
    }

    #[test]
    fn fall_back_ambiguity_uses_earlier_occurrence() {
        // 2024-11-03 01:30 occurs twice in America/Toronto; earlier is the
        // EDT (UTC-4) reading.
        let event =
            normalize_event(&raw("2024-11-03 01:30:00"), &toronto_directory()).expect("normalize");
        assert_eq!(event.event_time_utc.to_rfc3339(), "2024-11-03T05:30:00+00:00");
    }

    #[test]
    fn regina_has_no_dst() {
        let directory = CityDirectory::new(vec![City {
            id: 11,
            name: "Regina".to_string(),
            time_zone: "America/Regina".to_string(),
        }]);
        let mut event = raw("2024-03-10 02:30:00");
        event.city_id = 11;
        let normalized = normalize_event(&event, &directory).expect("normalize");
        // CST is UTC-6 year-round in Saskatchewan
        assert_eq!(
            normalized.event_time_utc.to_rfc3339(),
            "2024-03-10T08:30:00+00:00"
        );
    }
}
