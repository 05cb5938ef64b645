pub mod controller;
pub mod driver;
pub mod extractor;

pub use controller::IngestionController;
pub use driver::{ingest_file, ingest_reader, IngestOptions, IngestOutcome, IngestionSummary};
pub use extractor::{ExtractError, Extracted, RecordExtractor};
