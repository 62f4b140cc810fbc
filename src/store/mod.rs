//! Storage collaborators: a scoped transaction over the domain, summary and edge collections.
//!
//! A [`SummaryTransaction`] is a unit of work. Nothing it does is visible to
//! other writers until [`SummaryTransaction::commit`] succeeds, and dropping it
//! without committing rolls every step back.

pub mod memory;
pub mod mysql;

use std::fmt;
use thiserror::Error;

use super::summary::{DocumentId, SummaryDocument, SummaryEdge};

/// The individual operations a summary write is made of.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	FindDomain,
	FindEdge,
	InsertSummary,
	ReplaceSummary,
	InsertEdge
}

impl fmt::Display for Operation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Operation::FindDomain => "find_domain",
			Operation::FindEdge => "find_edge",
			Operation::InsertSummary => "insert_summary",
			Operation::ReplaceSummary => "replace_summary",
			Operation::InsertEdge => "insert_edge",
		};
		f.write_str(name)
	}
}

#[derive(Debug, Error)]
pub enum StoreError {
	#[error("database error: {0}")]
	Database(#[from] ::mysql::Error),

	#[error("could not encode summary document: {0}")]
	Encoding(#[from] serde_json::Error),

	#[error("storage unavailable: {0}")]
	Unavailable(String),

	#[error("operation rejected: {0}")]
	Rejected(String),
}

pub trait SummaryStore {
	/// Opens a unit of work. Each call gets its own handle; handles are never shared across units.
	fn begin(&mut self) -> Result<Box<dyn SummaryTransaction + '_>, StoreError>;

	/// Every summary linked to `domain`, as `(startDate, summary)` ordered by `startDate`.
	/// Empty for an unknown domain.
	fn summaries_for_domain(&mut self, domain: &str) -> Result<Vec<(String, SummaryDocument)>, StoreError>;
}

pub trait SummaryTransaction {
	/// Looks up a domain by name, locking it for the rest of the transaction.
	fn domain_id(&mut self, domain: &str) -> Result<Option<DocumentId>, StoreError>;

	/// The edge for `(domain, start_date)`, if there is one.
	fn summary_edge(&mut self, domain: DocumentId, start_date: &str) -> Result<Option<SummaryEdge>, StoreError>;

	fn insert_summary(&mut self, summary: &SummaryDocument) -> Result<DocumentId, StoreError>;

	/// Overwrites every field of an existing summary.
	fn replace_summary(&mut self, id: DocumentId, summary: &SummaryDocument) -> Result<(), StoreError>;

	fn insert_edge(&mut self, from: DocumentId, to: DocumentId, start_date: &str) -> Result<DocumentId, StoreError>;

	fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
