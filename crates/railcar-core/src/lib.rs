pub mod assemble;
pub mod batch;
pub mod errors;
pub mod model;
pub mod normalize;
pub mod parser;

pub use batch::{process_batch, ProcessedBatch};
pub use errors::{NormalizeError, ParseError};
pub use model::{
    describe_event_code, BatchResult, City, CityDirectory, EventCode, NormalizedEvent, RawEvent,
    Trip,
};
