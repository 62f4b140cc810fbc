use serde::Deserialize;

use crate::message::{AuthResult, MessageRecord, Verdict};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReportDateRange {
	pub begin: i64,
	pub end: i64
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReportMetadata {
	pub org_name: String,
	pub email: String,
	pub extra_contact_info: String,
	pub report_id: String,
	pub date_range: ReportDateRange,
	pub error: String
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Policy {
	pub domain: String,
	pub adkim: String,
	pub aspf: String,
	pub p: String,
	pub sp: String,
	pub pct: u8
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RecordRowPolicy {
	pub disposition: String,
	pub dkim: String,
	pub spf: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RecordRow {
	pub source_ip: String,
	pub count: u64,
	pub policy_evaluated: RecordRowPolicy
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RecordIdentifiers {
	pub header_from: String,
	pub envelope_from: String
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RecordDKIMResult {
	pub domain: String,
	pub result: String,
	pub selector: String
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RecordSPFResult {
	pub domain: String,
	pub scope: String,
	pub result: String
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RecordResults {
	pub dkim: Vec<RecordDKIMResult>,
	pub spf: Vec<RecordSPFResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Record {
	pub row: RecordRow,
	pub identifiers: RecordIdentifiers,
	pub auth_results: RecordResults
}

impl Record {
	/// Flattens the record into the shape the aggregator consumes.
	pub fn to_message(&self) -> MessageRecord {
		let evaluated = &self.row.policy_evaluated;

		MessageRecord {
			source_ip: self.row.source_ip.trim().to_string(),
			header_from: self.identifiers.header_from.trim().to_lowercase(),
			envelope_from: self.identifiers.envelope_from.trim().to_lowercase(),
			spf: Verdict::parse(&evaluated.spf),
			dkim: Verdict::parse(&evaluated.dkim),
			disposition: evaluated.disposition.trim().to_string(),
			spf_results: self.auth_results.spf.iter()
				.map(|r| AuthResult {
					domain: r.domain.clone(),
					selector: String::new(),
					result: r.result.clone(),
				})
				.collect(),
			dkim_results: self.auth_results.dkim.iter()
				.map(|r| AuthResult {
					domain: r.domain.clone(),
					selector: r.selector.clone(),
					result: r.result.clone(),
				})
				.collect(),
			count: self.row.count,
		}
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Report {
	pub report_metadata: ReportMetadata,
	pub policy_published: Policy,
	pub record: Vec<Record>
}
