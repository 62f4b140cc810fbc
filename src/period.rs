use chrono::{DateTime, Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Period identifier for the rolling window. Always holds the most recent data.
pub const THIRTY_DAYS: &str = "thirtyDays";

const SECONDS_PER_DAY: i64 = 86_400;

/// A reporting window a summary belongs to.
///
/// `ThirtyDays` is the rolling trailing window; there is only ever one of
/// these per domain, and every run overwrites it. `Month` is a fixed
/// calendar month, stored as its first day, and accumulates one summary
/// per month.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PeriodKey {
	ThirtyDays,
	Month(NaiveDate)
}

/// Whether a write refreshes the current view or corrects a historical one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
	Latest,
	Historical
}

impl fmt::Display for WriteMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			WriteMode::Latest => f.write_str("latest"),
			WriteMode::Historical => f.write_str("historical"),
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PeriodError {
	#[error("period '{0}' is neither 'thirtyDays' nor an ISO calendar date")]
	Invalid(String),

	#[error("timestamp {0} is out of range")]
	Timestamp(i64),
}

impl PeriodKey {
	/// The calendar month containing `date`.
	pub fn month_of(date: NaiveDate) -> PeriodKey {
		PeriodKey::Month(date.with_day(1).unwrap_or(date))
	}

	/// The calendar month containing a unix timestamp (UTC).
	pub fn month_of_timestamp(timestamp: i64) -> Result<PeriodKey, PeriodError> {
		let moment = DateTime::from_timestamp(timestamp, 0).ok_or(PeriodError::Timestamp(timestamp))?;
		Ok(PeriodKey::month_of(moment.date_naive()))
	}

	/// The value stored in the edge's `startDate`.
	pub fn start_date(&self) -> String {
		self.to_string()
	}

	pub fn is_rolling(&self) -> bool {
		*self == PeriodKey::ThirtyDays
	}

	pub fn write_mode(&self) -> WriteMode {
		match self {
			PeriodKey::ThirtyDays => WriteMode::Latest,
			PeriodKey::Month(_) => WriteMode::Historical,
		}
	}
}

impl fmt::Display for PeriodKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PeriodKey::ThirtyDays => f.write_str(THIRTY_DAYS),
			PeriodKey::Month(start) => write!(f, "{}", start.format("%Y-%m-%d")),
		}
	}
}

impl FromStr for PeriodKey {
	type Err = PeriodError;

	fn from_str(input: &str) -> Result<PeriodKey, PeriodError> {
		normalize_period(input)
	}
}

/// Normalizes a period identifier.
///
/// Accepts the `thirtyDays` sentinel, an ISO date (`2021-01-17`, normalized to
/// the first of its month) or a bare month (`2021-01`).
pub fn normalize_period(input: &str) -> Result<PeriodKey, PeriodError> {
	let trimmed = input.trim();
	if trimmed == THIRTY_DAYS {
		return Ok(PeriodKey::ThirtyDays);
	}

	let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
		.or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", trimmed), "%Y-%m-%d"))
		.map_err(|_| PeriodError::Invalid(input.to_string()))?;

	Ok(PeriodKey::month_of(date))
}

/// Whether a report ending at `end` (unix seconds) still falls inside the rolling window ending at `now`.
pub fn within_rolling_window(end: i64, now: i64, window_days: u32) -> bool {
	now.saturating_sub(end) <= i64::from(window_days) * SECONDS_PER_DAY
}
