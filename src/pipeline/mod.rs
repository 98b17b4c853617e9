// Data pipeline: ingestion, processing, aggregation, and storage

pub mod aggregate;
pub mod ingestion;
pub mod processing;
pub mod storage;
