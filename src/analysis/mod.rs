//! Aggregation over loaded records: per-group summaries, merged raw
//! tables, and ranking of treatment groups.

mod aggregator;

pub use aggregator::{merge, pick_optimal, study_overview, summarize_environment, summarize_growth};
