pub mod accountant;

pub use accountant::{metrics_at_frame, metrics_series, summarize, totals_at_frame};
