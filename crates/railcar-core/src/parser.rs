use chrono::NaiveDateTime;
use csv::{ReaderBuilder, StringRecord, Trim};

use crate::errors::ParseError;
use crate::model::RawEvent;

pub const EQUIPMENT_ID_COLUMN: &str = "Equipment Id";
pub const EVENT_CODE_COLUMN: &str = "Event Code";
pub const EVENT_TIME_COLUMN: &str = "Event Time";
pub const CITY_ID_COLUMN: &str = "City Id";

/// Accepted `Event Time` layouts. The feed carries no zone offset; the
/// upstream exporters have used both ISO-ish and US-style timestamps.
const EVENT_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

struct ColumnIndexes {
    equipment_id: usize,
    event_code: usize,
    event_time: usize,
    city_id: usize,
}

impl ColumnIndexes {
    fn from_headers(headers: &StringRecord) -> Result<Self, ParseError> {
        let find = |column: &'static str| {
            headers
                .iter()
                .position(|header| header.trim().eq_ignore_ascii_case(column))
                .ok_or(ParseError::MissingColumn { column })
        };

        Ok(Self {
            equipment_id: find(EQUIPMENT_ID_COLUMN)?,
            event_code: find(EVENT_CODE_COLUMN)?,
            event_time: find(EVENT_TIME_COLUMN)?,
            city_id: find(CITY_ID_COLUMN)?,
        })
    }
}

/// Decode the uploaded feed into raw events, in file order. Columns are
/// matched by header name and may appear in any order. A missing column or
/// an undecodable cell is fatal; semantic checks (unknown codes, unknown
/// cities) are left to the downstream stages.
pub fn parse_events(input: &[u8]) -> Result<Vec<RawEvent>, ParseError> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(input);

    let headers = reader.headers()?.clone();
    let columns = ColumnIndexes::from_headers(&headers)?;

    let mut events = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        // header occupies line 1
        let row = index + 2;

        let equipment_id = field(&record, columns.equipment_id, EQUIPMENT_ID_COLUMN, row)?;
        let event_code = field(&record, columns.event_code, EVENT_CODE_COLUMN, row)?;
        let event_time_raw = field(&record, columns.event_time, EVENT_TIME_COLUMN, row)?;
        let city_id_raw = field(&record, columns.city_id, CITY_ID_COLUMN, row)?;

        let event_time = parse_event_time(event_time_raw).ok_or_else(|| ParseError::DataRow {
            row,
            message: format!("'{event_time_raw}' is not a recognizable date-time"),
        })?;

        let city_id: i32 = city_id_raw.parse().map_err(|_| ParseError::DataRow {
            row,
            message: format!("'{city_id_raw}' is not a valid city id"),
        })?;

        events.push(RawEvent {
            equipment_id: equipment_id.to_string(),
            event_code: event_code.to_string(),
            event_time,
            city_id,
        });
    }

    Ok(events)
}

fn field<'r>(
    record: &'r StringRecord,
    index: usize,
    column: &'static str,
    row: usize,
) -> Result<&'r str, ParseError> {
    record.get(index).ok_or_else(|| ParseError::DataRow {
        row,
        message: format!("missing value for column '{column}'"),
    })
}

fn parse_event_time(value: &str) -> Option<NaiveDateTime> {
    EVENT_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_in_file_order_with_trimming() {
        let input = b"Equipment Id, Event Code, Event Time, City Id\n CN101 , w ,2024-03-01 08:00:00, 21 \nCN102,A,2024-03-01 09:30:00,30\n";
        let events = parse_events(input).expect("parse failed");

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].equipment_id, "CN101");
        assert_eq!(events[0].event_code, "w");
        assert_eq!(events[0].city_id, 21);
        assert_eq!(events[1].equipment_id, "CN102");
    }

    #[test]
    fn header_columns_may_be_reordered() {
        let input = b"City Id,Event Time,Event Code,Equipment Id\n21,2024-03-01 08:00:00,W,CN101\n";
        let events = parse_events(input).expect("parse failed");
        assert_eq!(events[0].equipment_id, "CN101");
        assert_eq!(events[0].city_id, 21);
    }

    #[test]
    fn missing_column_is_fatal() {
        let input = b"Equipment Id,Event Code,Event Time\nCN101,W,2024-03-01 08:00:00\n";
        let err = parse_events(input).expect_err("expected header error");
        assert!(matches!(
            err,
            ParseError::MissingColumn {
                column: CITY_ID_COLUMN
            }
        ));
    }

    #[test]
    fn non_numeric_city_id_is_fatal() {
        let input = b"Equipment Id,Event Code,Event Time,City Id\nCN101,W,2024-03-01 08:00:00,Toronto\n";
        let err = parse_events(input).expect_err("expected row error");
        match err {
            ParseError::DataRow { row, message } => {
                assert_eq!(row, 2);
                assert!(message.contains("Toronto"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unparsable_timestamp_is_fatal() {
        let input = b"Equipment Id,Event Code,Event Time,City Id\nCN101,W,not-a-time,21\n";
        assert!(matches!(
            parse_events(input),
            Err(ParseError::DataRow { row: 2, .. })
        ));
    }

    #[test]
    fn accepts_alternate_timestamp_layouts() {
        let input = b"Equipment Id,Event Code,Event Time,City Id\nCN101,W,2024-03-01T08:00:00,21\nCN101,Z,03/02/2024 14:30,30\n";
        let events = parse_events(input).expect("parse failed");
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1].event_time,
            NaiveDateTime::parse_from_str("2024-03-02 14:30:00", "%Y-%m-%d %H:%M:%S").unwrap()
        );
    }

    #[test]
    fn empty_input_reports_missing_header() {
        assert!(matches!(
            parse_events(b""),
            Err(ParseError::MissingColumn { .. })
        ));
    }
}
