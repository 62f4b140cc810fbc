//! One unit of work per `(domain, period)`: aggregate, then upsert.
//!
//! Units share no in-memory state and each opens its own store handle, so a
//! batch of them runs in parallel. Failures are logged with their full
//! detail where they happen; callers only see a [`SummaryError`] naming the
//! domain, the period, and what kind of failure it was.

use rayon::prelude::*;
use rayon::{ThreadPoolBuildError, ThreadPoolBuilder};
use thiserror::Error;
use tracing::{info, info_span, warn};

use super::aggregate::aggregate;
use super::message::MessageRecord;
use super::period::PeriodKey;
use super::store::{StoreError, SummaryStore};
use super::writer::{self, WriteError, WriteOutcome};

/// Messages for one domain over one period.
#[derive(Clone, Debug, PartialEq)]
pub struct SummaryJob {
	pub domain: String,
	pub period: PeriodKey,
	pub messages: Vec<MessageRecord>
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
	Classification,
	Unavailable,
	DomainNotFound,
	Query,
	TransactionStep,
	TransactionCommit
}

impl From<&WriteError> for FailureKind {
	fn from(err: &WriteError) -> FailureKind {
		match err {
			WriteError::Begin(_) => FailureKind::Unavailable,
			WriteError::DomainNotFound(_) => FailureKind::DomainNotFound,
			WriteError::Query { .. } => FailureKind::Query,
			WriteError::Step { .. } => FailureKind::TransactionStep,
			WriteError::Commit(_) => FailureKind::TransactionCommit,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unable to complete aggregation for {domain} ({period})")]
pub struct SummaryError {
	kind: FailureKind,
	domain: String,
	period: PeriodKey
}

impl SummaryError {
	fn new(kind: FailureKind, job: &SummaryJob) -> SummaryError {
		SummaryError {
			kind,
			domain: job.domain.clone(),
			period: job.period,
		}
	}

	pub fn kind(&self) -> FailureKind {
		self.kind
	}

	pub fn domain(&self) -> &str {
		&self.domain
	}

	pub fn period(&self) -> &PeriodKey {
		&self.period
	}
}

/// Aggregates a job's messages and writes the summary. Safe to retry: a rerun overwrites the same slot.
pub fn run<S>(store: &mut S, job: &SummaryJob) -> Result<WriteOutcome, SummaryError>
	where S: SummaryStore + ?Sized
{
	let span = info_span!("summary", domain = %job.domain, period = %job.period);
	let _guard = span.enter();

	let result = aggregate(&job.messages, &job.domain, &job.period).map_err(|err| {
		warn!(error = %err, action = "aggregate", "rejecting batch");
		SummaryError::new(FailureKind::Classification, job)
	})?;

	writer::write_summary(store, &job.domain, &job.period, &result)
		.map_err(|err| SummaryError::new(FailureKind::from(&err), job))
}

#[derive(Debug, Default)]
pub struct BatchReport {
	pub created: usize,
	pub replaced: usize,
	pub failures: Vec<SummaryError>
}

impl BatchReport {
	pub fn succeeded(&self) -> bool {
		self.failures.is_empty()
	}
}

/// Runs every job on `workers` threads. `open` is called once per job for a fresh store handle.
pub fn run_batch<F, S>(jobs: &[SummaryJob], workers: usize, open: F) -> Result<BatchReport, ThreadPoolBuildError>
	where
		F: Fn() -> Result<S, StoreError> + Sync,
		S: SummaryStore
{
	let pool = ThreadPoolBuilder::new().num_threads(workers.max(1)).build()?;

	let results: Vec<Result<WriteOutcome, SummaryError>> = pool.install(|| {
		jobs.par_iter()
			.map(|job| {
				let mut store = open().map_err(|err| {
					warn!(domain = %job.domain, period = %job.period, error = %err, action = "open_store", "storage unavailable");
					SummaryError::new(FailureKind::Unavailable, job)
				})?;
				run(&mut store, job)
			})
			.collect()
	});

	let mut report = BatchReport::default();
	for result in results {
		match result {
			Ok(WriteOutcome::Created(_)) => report.created += 1,
			Ok(WriteOutcome::Replaced(_)) => report.replaced += 1,
			Err(err) => report.failures.push(err),
		}
	}

	info!(
		jobs = jobs.len(),
		created = report.created,
		replaced = report.replaced,
		failed = report.failures.len(),
		"batch finished"
	);

	Ok(report)
}
