use thiserror::Error;

/// Fatal input errors. Any of these aborts the whole batch before anything
/// is persisted.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("missing required column '{column}' in header row")]
    MissingColumn { column: &'static str },

    #[error("CSV error: {source}")]
    Csv {
        #[from]
        source: csv::Error,
    },

    #[error("data row {row} invalid: {message}")]
    DataRow { row: usize, message: String },
}

/// Per-event normalization failures. These are never fatal: the caller skips
/// the event and folds it into the orphaned count.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("unknown city id {city_id} for event {equipment_id}/{event_code}")]
    UnknownCity {
        city_id: i32,
        equipment_id: String,
        event_code: String,
    },

    #[error("city {city_id} has unrecognized time zone id '{zone}'")]
    InvalidTimeZone { city_id: i32, zone: String },
}
