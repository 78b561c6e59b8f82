// Primitives
pub mod sequence;
pub mod units;

// Master data
pub mod catalog;
pub mod incoming;
pub mod resolution;

// Transaction persistence and batch entry points
pub mod ingest;
pub mod transactions;

// Aggregation
pub mod ledger;
pub mod month_end;
