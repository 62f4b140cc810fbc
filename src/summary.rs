use serde::{Deserialize, Serialize};

use super::classify::Category;
use super::message::MessageRecord;

/// Storage-assigned identity of a document or edge.
pub type DocumentId = u64;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotals {
	pub pass: u64,
	pub fail: u64,
	pub pass_dkim_only: u64,
	pub pass_spf_only: u64
}

impl CategoryTotals {
	pub fn get(&self, category: Category) -> u64 {
		match category {
			Category::Pass => self.pass,
			Category::Fail => self.fail,
			Category::PassDkimOnly => self.pass_dkim_only,
			Category::PassSpfOnly => self.pass_spf_only,
		}
	}

	/// Adds `count` to a category. `None` if that total would overflow, leaving it unchanged.
	pub fn add(&mut self, category: Category, count: u64) -> Option<()> {
		let slot = match category {
			Category::Pass => &mut self.pass,
			Category::Fail => &mut self.fail,
			Category::PassDkimOnly => &mut self.pass_dkim_only,
			Category::PassSpfOnly => &mut self.pass_spf_only,
		};
		*slot = slot.checked_add(count)?;
		Some(())
	}

	/// `None` when the categories together exceed `u64::MAX`.
	pub fn sum(&self) -> Option<u64> {
		Category::ALL.iter().try_fold(0u64, |acc, c| acc.checked_add(self.get(*c)))
	}
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPercentages {
	pub pass: f64,
	pub fail: f64,
	pub pass_dkim_only: f64,
	pub pass_spf_only: f64
}

impl CategoryPercentages {
	/// Share of `total` in each category as a percentage with one decimal of
	/// precision (`33.3`, not `33`). All zero when `total` is zero.
	pub fn from_totals(totals: &CategoryTotals, total: u64) -> CategoryPercentages {
		let percent = |count: u64| {
			if total == 0 {
				return 0.0;
			}
			let value = count as f64 / total as f64 * 100.0;
			(value * 10.0).round() / 10.0
		};

		CategoryPercentages {
			pass: percent(totals.pass),
			fail: percent(totals.fail),
			pass_dkim_only: percent(totals.pass_dkim_only),
			pass_spf_only: percent(totals.pass_spf_only),
		}
	}

	pub fn get(&self, category: Category) -> f64 {
		match category {
			Category::Pass => self.pass,
			Category::Fail => self.fail,
			Category::PassDkimOnly => self.pass_dkim_only,
			Category::PassSpfOnly => self.pass_spf_only,
		}
	}
}

/// Percentages as the aggregator hands them over: the message total travels with them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentageBreakdown {
	pub total_messages: u64,
	pub category_percentages: CategoryPercentages
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailRow {
	pub source_ip_address: String,
	pub envelope_from: String,
	pub header_from: String,
	pub disposition: String,
	pub spf_domains: String,
	pub spf_results: String,
	pub spf_aligned: bool,
	pub dkim_domains: String,
	pub dkim_selectors: String,
	pub dkim_results: String,
	pub dkim_aligned: bool,
	pub total_messages: u64
}

impl DetailRow {
	pub fn from_record(record: &MessageRecord) -> DetailRow {
		let join = |values: Vec<&str>| values.into_iter().filter(|v| !v.is_empty()).collect::<Vec<_>>().join(", ");

		DetailRow {
			source_ip_address: record.source_ip.clone(),
			envelope_from: record.envelope_from.clone(),
			header_from: record.header_from.clone(),
			disposition: record.disposition.clone(),
			spf_domains: join(record.spf_results.iter().map(|r| r.domain.as_str()).collect()),
			spf_results: join(record.spf_results.iter().map(|r| r.result.as_str()).collect()),
			spf_aligned: record.spf.map_or(false, |v| v.passed()),
			dkim_domains: join(record.dkim_results.iter().map(|r| r.domain.as_str()).collect()),
			dkim_selectors: join(record.dkim_results.iter().map(|r| r.selector.as_str()).collect()),
			dkim_results: join(record.dkim_results.iter().map(|r| r.result.as_str()).collect()),
			dkim_aligned: record.dkim.map_or(false, |v| v.passed()),
			total_messages: record.count,
		}
	}
}

/// Rows backing each category, in report order. Empty tables stay present (serialized as `[]`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailTables {
	pub dkim_failure: Vec<DetailRow>,
	pub dmarc_failure: Vec<DetailRow>,
	pub full_pass: Vec<DetailRow>,
	pub spf_failure: Vec<DetailRow>
}

impl DetailTables {
	/// The table a category's rows are filed under.
	pub fn table_mut(&mut self, category: Category) -> &mut Vec<DetailRow> {
		match category {
			Category::Pass => &mut self.full_pass,
			Category::PassDkimOnly => &mut self.spf_failure,
			Category::PassSpfOnly => &mut self.dkim_failure,
			Category::Fail => &mut self.dmarc_failure,
		}
	}

	pub fn table(&self, category: Category) -> &[DetailRow] {
		match category {
			Category::Pass => &self.full_pass,
			Category::PassDkimOnly => &self.spf_failure,
			Category::PassSpfOnly => &self.dkim_failure,
			Category::Fail => &self.dmarc_failure,
		}
	}
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
	pub category_totals: CategoryTotals,
	pub category_percentages: PercentageBreakdown,
	pub detail_tables: DetailTables
}

impl AggregationResult {
	pub fn total_messages(&self) -> u64 {
		self.category_percentages.total_messages
	}
}

/// The stored summary. Replaced wholesale on re-aggregation, never patched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDocument {
	pub category_totals: CategoryTotals,
	pub category_percentages: CategoryPercentages,
	pub total_messages: u64,
	pub detail_tables: DetailTables
}

impl From<&AggregationResult> for SummaryDocument {
	fn from(result: &AggregationResult) -> SummaryDocument {
		SummaryDocument {
			category_totals: result.category_totals.clone(),
			category_percentages: result.category_percentages.category_percentages.clone(),
			total_messages: result.category_percentages.total_messages,
			detail_tables: result.detail_tables.clone(),
		}
	}
}

/// Domain -> summary link, one per `(domain, startDate)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryEdge {
	pub id: DocumentId,
	#[serde(rename = "_from")]
	pub from: DocumentId,
	#[serde(rename = "_to")]
	pub to: DocumentId,
	#[serde(rename = "startDate")]
	pub start_date: String
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::message::{AuthResult, Verdict};
	use serde_json::json;

	#[test]
	fn empty_document_keeps_every_field() {
		let document = SummaryDocument::from(&AggregationResult::default());
		let value = serde_json::to_value(&document).unwrap();

		assert_eq!(value["categoryTotals"], json!({ "pass": 0, "fail": 0, "passDkimOnly": 0, "passSpfOnly": 0 }));
		assert_eq!(value["categoryPercentages"], json!({ "pass": 0.0, "fail": 0.0, "passDkimOnly": 0.0, "passSpfOnly": 0.0 }));
		assert_eq!(value["totalMessages"], json!(0));
		assert_eq!(
			value["detailTables"],
			json!({ "dkimFailure": [], "dmarcFailure": [], "fullPass": [], "spfFailure": [] })
		);
		assert_eq!(value.as_object().unwrap().len(), 4);
	}

	#[test]
	fn total_messages_is_hoisted_out_of_percentages() {
		let mut result = AggregationResult::default();
		result.category_percentages.total_messages = 12;
		result.category_percentages.category_percentages.pass = 100.0;

		let document = SummaryDocument::from(&result);
		assert_eq!(document.total_messages, 12);
		assert_eq!(document.category_percentages.pass, 100.0);
	}

	#[test]
	fn percentages_round_to_one_decimal() {
		let totals = CategoryTotals { pass: 1, fail: 2, pass_dkim_only: 0, pass_spf_only: 0 };
		let percentages = CategoryPercentages::from_totals(&totals, 3);
		assert_eq!(percentages.pass, 33.3);
		assert_eq!(percentages.fail, 66.7);
		assert_eq!(percentages.pass_dkim_only, 0.0);
	}

	#[test]
	fn overflowing_totals_are_refused() {
		let mut totals = CategoryTotals::default();
		assert_eq!(totals.add(Category::Pass, u64::MAX), Some(()));
		assert_eq!(totals.add(Category::Pass, 1), None);
		assert_eq!(totals.pass, u64::MAX);

		assert_eq!(totals.add(Category::Fail, 1), Some(()));
		assert_eq!(totals.sum(), None);
	}

	#[test]
	fn zero_total_gives_zero_percentages() {
		let percentages = CategoryPercentages::from_totals(&CategoryTotals::default(), 0);
		for category in Category::ALL.iter() {
			assert_eq!(percentages.get(*category), 0.0);
		}
	}

	#[test]
	fn edge_uses_graph_field_names() {
		let edge = SummaryEdge { id: 3, from: 1, to: 2, start_date: "thirtyDays".to_string() };
		let value = serde_json::to_value(&edge).unwrap();
		assert_eq!(value, json!({ "id": 3, "_from": 1, "_to": 2, "startDate": "thirtyDays" }));
	}

	#[test]
	fn detail_row_flattens_auth_results() {
		let mut record = MessageRecord::new("198.51.100.4", "domain.ca", Verdict::Pass, Verdict::Fail, 7);
		record.envelope_from = "bounce.domain.ca".to_string();
		record.spf_results = vec![AuthResult { domain: "bounce.domain.ca".into(), selector: String::new(), result: "pass".into() }];
		record.dkim_results = vec![
			AuthResult { domain: "domain.ca".into(), selector: "s1".into(), result: "fail".into() },
			AuthResult { domain: "esp.example".into(), selector: "k2".into(), result: "pass".into() },
		];

		let row = DetailRow::from_record(&record);
		assert_eq!(row.source_ip_address, "198.51.100.4");
		assert_eq!(row.spf_domains, "bounce.domain.ca");
		assert!(row.spf_aligned);
		assert_eq!(row.dkim_domains, "domain.ca, esp.example");
		assert_eq!(row.dkim_selectors, "s1, k2");
		assert_eq!(row.dkim_results, "fail, pass");
		assert!(!row.dkim_aligned);
		assert_eq!(row.total_messages, 7);
	}
}
