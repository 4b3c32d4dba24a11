// CSV import pipeline - parse rows into observations, reconcile them
// against the inventory, commit the accepted changes atomically

pub mod analyzer;
pub mod commit;
pub mod csv;

pub use analyzer::{BatchAnalysis, BatchSummary, ItemAction, ItemAnalysis, ReconciliationAnalyzer};
pub use commit::build_plan;
pub use csv::{read_observations, CsvOptions, Delimiter};
