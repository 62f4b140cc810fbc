use tracing::debug;

use super::classify::{self, ClassificationError};
use super::message::MessageRecord;
use super::period::PeriodKey;
use super::summary::{AggregationResult, CategoryPercentages, CategoryTotals, DetailRow, DetailTables, PercentageBreakdown};

/// Folds one domain's messages for one period into totals, percentages and detail tables.
///
/// Counts are weighted by each record's message count. Rows keep the order
/// they arrived in. A single unclassifiable record fails the whole batch, so
/// a summary is never written from a partial count.
pub fn aggregate(messages: &[MessageRecord], domain: &str, period: &PeriodKey) -> Result<AggregationResult, ClassificationError> {
	let mut totals = CategoryTotals::default();
	let mut tables = DetailTables::default();
	let mut total_messages: u64 = 0;

	for (index, record) in messages.iter().enumerate() {
		let category = classify::classify_record(index, record)?;
		let overflow = || ClassificationError::VolumeOverflow {
			index,
			source_ip: record.source_ip.clone(),
		};
		total_messages = total_messages.checked_add(record.count).ok_or_else(overflow)?;
		totals.add(category, record.count).ok_or_else(overflow)?;
		tables.table_mut(category).push(DetailRow::from_record(record));
	}
	let percentages = CategoryPercentages::from_totals(&totals, total_messages);

	debug!(
		domain = %domain,
		period = %period,
		records = messages.len(),
		total_messages,
		"aggregated"
	);

	Ok(AggregationResult {
		category_totals: totals,
		category_percentages: PercentageBreakdown {
			total_messages,
			category_percentages: percentages,
		},
		detail_tables: tables,
	})
}
