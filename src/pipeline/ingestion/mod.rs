// Pipeline ingestion: decoding upstream payloads into raw records

pub mod payload;

pub use payload::{decode_records, retain_upcoming};
