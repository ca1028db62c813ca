// Data pipeline: upstream ingestion, then processing into canonical shapes

pub mod ingestion;
pub mod processing;
