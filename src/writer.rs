use thiserror::Error;
use tracing::{error, info, warn};

use super::period::PeriodKey;
use super::store::{Operation, StoreError, SummaryStore};
use super::summary::{AggregationResult, DocumentId, SummaryDocument};

/// What a successful write did to the `(domain, period)` slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
	/// No edge existed, so a summary and its edge were created.
	Created(DocumentId),
	/// The linked summary was overwritten in place.
	Replaced(DocumentId)
}

impl WriteOutcome {
	pub fn summary_id(&self) -> DocumentId {
		match self {
			WriteOutcome::Created(id) | WriteOutcome::Replaced(id) => *id,
		}
	}
}

#[derive(Debug, Error)]
pub enum WriteError {
	#[error("could not open transaction: {0}")]
	Begin(#[source] StoreError),

	#[error("domain '{0}' does not exist")]
	DomainNotFound(String),

	#[error("query failed during {step}: {source}")]
	Query { step: Operation, source: StoreError },

	#[error("transaction step {step} failed: {source}")]
	Step { step: Operation, source: StoreError },

	#[error("transaction commit failed: {0}")]
	Commit(#[source] StoreError),
}

/// Upserts the summary for `(domain, period)` in a single transaction.
///
/// The edge is the upsert key: if one already links the domain to a summary
/// for this period, that summary is overwritten; otherwise a new summary and
/// edge are created. Any failure drops the transaction, which rolls back
/// every step taken so far.
pub fn write_summary<S>(store: &mut S, domain: &str, period: &PeriodKey, result: &AggregationResult) -> Result<WriteOutcome, WriteError>
	where S: SummaryStore + ?Sized
{
	let start_date = period.start_date();
	let document = SummaryDocument::from(result);

	let mut tx = store.begin().map_err(|err| {
		log_failure(domain, period, "begin", &err);
		WriteError::Begin(err)
	})?;

	let domain_id = match tx.domain_id(domain) {
		Ok(Some(id)) => id,
		Ok(None) => {
			warn!(domain = %domain, period = %period, "domain not found, nothing written");
			return Err(WriteError::DomainNotFound(domain.to_string()));
		},
		Err(err) => {
			log_failure(domain, period, "find_domain", &err);
			return Err(WriteError::Query { step: Operation::FindDomain, source: err });
		},
	};

	let edge = tx.summary_edge(domain_id, &start_date).map_err(|err| {
		log_failure(domain, period, "find_edge", &err);
		WriteError::Query { step: Operation::FindEdge, source: err }
	})?;

	let outcome = match edge {
		Some(edge) => {
			tx.replace_summary(edge.to, &document).map_err(|err| step_failed(domain, period, Operation::ReplaceSummary, err))?;
			WriteOutcome::Replaced(edge.to)
		},
		None => {
			let summary_id = tx.insert_summary(&document).map_err(|err| step_failed(domain, period, Operation::InsertSummary, err))?;
			tx.insert_edge(domain_id, summary_id, &start_date).map_err(|err| step_failed(domain, period, Operation::InsertEdge, err))?;
			WriteOutcome::Created(summary_id)
		},
	};

	tx.commit().map_err(|err| {
		log_failure(domain, period, "commit", &err);
		WriteError::Commit(err)
	})?;

	info!(
		domain = %domain,
		period = %period,
		mode = %period.write_mode(),
		summary = outcome.summary_id(),
		total_messages = document.total_messages,
		"summary written"
	);

	Ok(outcome)
}

fn log_failure(domain: &str, period: &PeriodKey, action: &str, err: &StoreError) {
	error!(domain = %domain, period = %period, action, error = %err, "summary write failed");
}

fn step_failed(domain: &str, period: &PeriodKey, step: Operation, err: StoreError) -> WriteError {
	log_failure(domain, period, &step.to_string(), &err);
	WriteError::Step { step, source: err }
}
