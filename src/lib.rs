//! DMARC summary aggregation.
//!
//! Takes the per-message SPF/DKIM outcomes reported for a domain over a
//! period, buckets them into `pass`, `fail`, `passDkimOnly` and
//! `passSpfOnly`, and upserts one summary document per `(domain, period)`
//! along with the edge linking it to the domain.
//!
//! ```text
//! report files -> report::group_reports -> pipeline::run
//!                                           |- aggregate::aggregate
//!                                           `- writer::write_summary -> store
//! ```

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod message;
pub mod period;
pub mod pipeline;
pub mod report;
pub mod store;
pub mod summary;
pub mod writer;

pub use aggregate::aggregate;
pub use classify::{classify, Category, ClassificationError};
pub use message::{MessageRecord, Verdict};
pub use period::{normalize_period, PeriodKey};
pub use pipeline::{FailureKind, SummaryError, SummaryJob};
pub use summary::{AggregationResult, SummaryDocument, SummaryEdge};
pub use writer::{write_summary, WriteError, WriteOutcome};
