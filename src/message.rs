use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of an SPF or DKIM check, as evaluated (and aligned) by the reporter's DMARC policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
	Pass,
	Fail
}

impl Verdict {
	/// Parses a `policy_evaluated` result. Anything other than "pass" is a failure, blank means the reporter left it out.
	pub fn parse(value: &str) -> Option<Verdict> {
		match value.trim().to_lowercase().as_str() {
			"" => None,
			"pass" => Some(Verdict::Pass),
			_ => Some(Verdict::Fail),
		}
	}

	pub fn passed(self) -> bool {
		self == Verdict::Pass
	}
}

impl fmt::Display for Verdict {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Verdict::Pass => f.write_str("pass"),
			Verdict::Fail => f.write_str("fail"),
		}
	}
}

/// A raw auth_results entry. SPF entries leave the selector blank.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResult {
	pub domain: String,
	pub selector: String,
	pub result: String
}

/// One row of an aggregate report: `count` identical messages from a single source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageRecord {
	pub source_ip: String,
	pub header_from: String,
	pub envelope_from: String,
	pub spf: Option<Verdict>,
	pub dkim: Option<Verdict>,
	pub disposition: String,
	pub spf_results: Vec<AuthResult>,
	pub dkim_results: Vec<AuthResult>,
	pub count: u64
}

impl MessageRecord {
	pub fn new(source_ip: &str, header_from: &str, spf: Verdict, dkim: Verdict, count: u64) -> MessageRecord {
		MessageRecord {
			source_ip: source_ip.to_string(),
			header_from: header_from.to_string(),
			spf: Some(spf),
			dkim: Some(dkim),
			disposition: "none".to_string(),
			count,
			..MessageRecord::default()
		}
	}
}
