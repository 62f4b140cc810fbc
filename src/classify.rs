use std::fmt;
use thiserror::Error;

use super::message::{MessageRecord, Verdict};

/// The four mutually exclusive buckets a message can land in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
	Pass,
	Fail,
	PassDkimOnly,
	PassSpfOnly
}

impl Category {
	pub const ALL: [Category; 4] = [
		Category::Pass,
		Category::Fail,
		Category::PassDkimOnly,
		Category::PassSpfOnly,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Category::Pass => "pass",
			Category::Fail => "fail",
			Category::PassDkimOnly => "passDkimOnly",
			Category::PassSpfOnly => "passSpfOnly",
		}
	}
}

impl fmt::Display for Category {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ClassificationError {
	#[error("record {index} from '{source_ip}' has no SPF result")]
	MissingSpf { index: usize, source_ip: String },

	#[error("record {index} from '{source_ip}' has no DKIM result")]
	MissingDkim { index: usize, source_ip: String },

	#[error("record {index} from '{source_ip}' has a message count of zero")]
	ZeroVolume { index: usize, source_ip: String },

	#[error("record {index} from '{source_ip}' pushes the message total past u64::MAX")]
	VolumeOverflow { index: usize, source_ip: String },
}

/// Buckets a message by its individual SPF and DKIM outcomes.
///
/// The overall DMARC disposition is deliberately not consulted: a message that
/// passed DMARC on DKIM alone is still `PassDkimOnly`.
pub fn classify(spf: Verdict, dkim: Verdict) -> Category {
	match (spf.passed(), dkim.passed()) {
		(true, true) => Category::Pass,
		(false, true) => Category::PassDkimOnly,
		(true, false) => Category::PassSpfOnly,
		(false, false) => Category::Fail,
	}
}

/// Classifies the `index`th record of a batch, rejecting records that can't be counted.
pub fn classify_record(index: usize, record: &MessageRecord) -> Result<Category, ClassificationError> {
	let spf = record.spf.ok_or_else(|| ClassificationError::MissingSpf {
		index,
		source_ip: record.source_ip.clone(),
	})?;
	let dkim = record.dkim.ok_or_else(|| ClassificationError::MissingDkim {
		index,
		source_ip: record.source_ip.clone(),
	})?;
	if record.count == 0 {
		return Err(ClassificationError::ZeroVolume {
			index,
			source_ip: record.source_ip.clone(),
		});
	}

	Ok(classify(spf, dkim))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn every_verdict_pair_maps_to_one_category() {
		assert_eq!(classify(Verdict::Pass, Verdict::Pass), Category::Pass);
		assert_eq!(classify(Verdict::Fail, Verdict::Pass), Category::PassDkimOnly);
		assert_eq!(classify(Verdict::Pass, Verdict::Fail), Category::PassSpfOnly);
		assert_eq!(classify(Verdict::Fail, Verdict::Fail), Category::Fail);
	}

	#[test]
	fn dmarc_pass_on_one_mechanism_is_still_partial() {
		let mut record = MessageRecord::new("192.0.2.1", "domain.ca", Verdict::Fail, Verdict::Pass, 3);
		record.disposition = "none".to_string();
		assert_eq!(classify_record(0, &record), Ok(Category::PassDkimOnly));
	}

	#[test]
	fn missing_results_are_rejected() {
		let mut record = MessageRecord::new("192.0.2.7", "domain.ca", Verdict::Pass, Verdict::Pass, 1);
		record.spf = None;
		assert!(matches!(
			classify_record(4, &record),
			Err(ClassificationError::MissingSpf { index: 4, .. })
		));

		record.spf = Some(Verdict::Pass);
		record.dkim = None;
		assert!(matches!(
			classify_record(5, &record),
			Err(ClassificationError::MissingDkim { index: 5, .. })
		));
	}

	#[test]
	fn zero_volume_is_rejected() {
		let record = MessageRecord::new("192.0.2.9", "domain.ca", Verdict::Pass, Verdict::Pass, 0);
		assert!(matches!(
			classify_record(0, &record),
			Err(ClassificationError::ZeroVolume { .. })
		));
	}

	#[test]
	fn category_names_match_persisted_keys() {
		let names: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
		assert_eq!(names, ["pass", "fail", "passDkimOnly", "passSpfOnly"]);
	}
}
