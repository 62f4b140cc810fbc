//! Input feed: turns DMARC aggregate report files into per-domain, per-period batches.

pub mod types;

use flate2::read::GzDecoder;
use simple_error::{bail, SimpleError};
use std::boxed::Box;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::error::Error;
use std::fs;
use std::io::{prelude::*, Cursor};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::message::MessageRecord;
use crate::period::{self, PeriodKey};
use crate::pipeline::SummaryJob;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportFileType {
	Gzip,
	Zip,
	Xml
}

impl ReportFileType {
	/// Guesses the container from the file extension.
	pub fn from_path(path: &Path) -> Option<ReportFileType> {
		let extension = path.extension()?.to_str()?.to_lowercase();
		match extension.as_str() {
			"gz" | "gzip" => Some(ReportFileType::Gzip),
			"zip" => Some(ReportFileType::Zip),
			"xml" => Some(ReportFileType::Xml),
			_ => None,
		}
	}
}

/// Given a report type and the raw data in bytes, decompresses the report into a String containing XML.
pub fn read_report(report_type: ReportFileType, data: Vec<u8>) -> Result<String, Box<dyn Error>> {
	let body_reader = Cursor::new(data);
	match report_type {
		ReportFileType::Gzip => {
			let mut d = GzDecoder::new(body_reader);
			let mut result = String::new();
			d.read_to_string(&mut result)?;
			Ok(result)
		},
		ReportFileType::Zip => {
			let mut archive = zip::ZipArchive::new(body_reader)?;

			if archive.len() != 1 {
				bail!("ZIP archive has multiple or no files");
			}

			let mut report_file = archive.by_index(0)?;
			let mut result = String::new();
			report_file.read_to_string(&mut result)?;
			Ok(result)
		},
		ReportFileType::Xml => Ok(String::from_utf8(body_reader.into_inner())?),
	}
}

pub fn parse_report(xml: &str) -> Result<types::Report, Box<dyn Error>> {
	let report: types::Report = serde_xml_rs::from_str(xml)?;
	if report.policy_published.domain.trim().is_empty() {
		bail!("report '{}' has no published policy domain", report.report_metadata.report_id);
	}
	if report.report_metadata.date_range.begin <= 0 {
		bail!("report '{}' has no date range", report.report_metadata.report_id);
	}
	Ok(report)
}

/// Reads one report file from disk.
pub fn load_report(path: &Path) -> Result<types::Report, Box<dyn Error>> {
	let report_type = ReportFileType::from_path(path)
		.ok_or_else(|| SimpleError::new(format!("unrecognized report file type: {}", path.display())))?;

	let data = fs::read(path)?;
	parse_report(&read_report(report_type, data)?)
}

/// Loads every report in `folder`, in path order. Files that can't be read or parsed are skipped.
///
/// A report is identified by its `(org_name, report_id)`. Only the first file
/// carrying a given identity is kept, so a report saved twice (say as `.xml`
/// and `.xml.gz`) is counted once.
pub fn load_reports(folder: &Path) -> Result<Vec<types::Report>, Box<dyn Error>> {
	let mut paths: Vec<PathBuf> = fs::read_dir(folder)?
		.filter_map(|entry| entry.ok().map(|e| e.path()))
		.filter(|path| path.is_file() && ReportFileType::from_path(path).is_some())
		.collect();
	paths.sort();

	let mut seen: HashSet<(String, String)> = HashSet::new();
	let mut reports = Vec::new();
	for path in paths {
		match load_report(&path) {
			Ok(report) => {
				let metadata = &report.report_metadata;
				if !metadata.report_id.is_empty()
					&& !seen.insert((metadata.org_name.clone(), metadata.report_id.clone())) {
					warn!(
						path = %path.display(),
						org = %metadata.org_name,
						report = %metadata.report_id,
						"skipping duplicate report"
					);
					continue;
				}
				debug!(path = %path.display(), records = report.record.len(), "loaded report");
				reports.push(report);
			},
			Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable report"),
		}
	}

	Ok(reports)
}

/// Buckets report records by `(policy domain, period)`.
///
/// Every report counts toward the calendar month its date range begins in.
/// Reports whose range ends within `window_days` of `now` (unix seconds) also
/// count toward the rolling `thirtyDays` period. A domain with no report in
/// the window still gets an empty `thirtyDays` job, so its rolling summary
/// drops to zero instead of keeping stale counts.
pub fn group_reports(reports: &[types::Report], now: i64, window_days: u32) -> Vec<SummaryJob> {
	let mut groups: BTreeMap<(String, PeriodKey), Vec<MessageRecord>> = BTreeMap::new();

	for report in reports {
		let domain = report.policy_published.domain.trim().to_lowercase();
		let range = &report.report_metadata.date_range;

		let month = match PeriodKey::month_of_timestamp(range.begin) {
			Ok(month) => month,
			Err(err) => {
				warn!(domain = %domain, report = %report.report_metadata.report_id, error = %err, "skipping report with bad date range");
				continue;
			},
		};

		let mut periods = vec![month];
		if period::within_rolling_window(range.end, now, window_days) {
			periods.push(PeriodKey::ThirtyDays);
		}

		let messages: Vec<MessageRecord> = report.record.iter().map(|r| r.to_message()).collect();
		for period in periods {
			groups.entry((domain.clone(), period)).or_default().extend(messages.iter().cloned());
		}
	}

	let domains: BTreeSet<String> = groups.keys().map(|(domain, _)| domain.clone()).collect();
	let rolling: BTreeSet<String> = groups.keys()
		.filter(|(_, period)| period.is_rolling())
		.map(|(domain, _)| domain.clone())
		.collect();
	for domain in domains.difference(&rolling) {
		debug!(domain = %domain, "no reports in the rolling window");
		groups.insert((domain.clone(), PeriodKey::ThirtyDays), Vec::new());
	}

	groups.into_iter()
		.map(|((domain, period), messages)| SummaryJob { domain, period, messages })
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::message::Verdict;
	use flate2::write::GzEncoder;
	use flate2::Compression;
	use std::io::Write;

	// 2021-01-01 .. 2021-01-02 UTC
	const REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<feedback>
  <report_metadata>
    <org_name>google.com</org_name>
    <email>noreply-dmarc-support@google.com</email>
    <report_id>1234567890</report_id>
    <date_range>
      <begin>1609459200</begin>
      <end>1609545599</end>
    </date_range>
  </report_metadata>
  <policy_published>
    <domain>Domain.ca</domain>
    <adkim>r</adkim>
    <aspf>r</aspf>
    <p>none</p>
    <sp>none</sp>
    <pct>100</pct>
  </policy_published>
  <record>
    <row>
      <source_ip>192.0.2.10</source_ip>
      <count>3</count>
      <policy_evaluated>
        <disposition>none</disposition>
        <dkim>pass</dkim>
        <spf>fail</spf>
      </policy_evaluated>
    </row>
    <identifiers>
      <header_from>domain.ca</header_from>
    </identifiers>
    <auth_results>
      <dkim>
        <domain>domain.ca</domain>
        <result>pass</result>
        <selector>selector1</selector>
      </dkim>
      <spf>
        <domain>mailer.example</domain>
        <result>pass</result>
      </spf>
    </auth_results>
  </record>
  <record>
    <row>
      <source_ip>198.51.100.20</source_ip>
      <count>1</count>
      <policy_evaluated>
        <disposition>none</disposition>
        <dkim>pass</dkim>
        <spf>pass</spf>
      </policy_evaluated>
    </row>
    <identifiers>
      <header_from>domain.ca</header_from>
    </identifiers>
    <auth_results>
      <dkim>
        <domain>domain.ca</domain>
        <result>pass</result>
        <selector>selector1</selector>
      </dkim>
      <spf>
        <domain>domain.ca</domain>
        <result>pass</result>
      </spf>
    </auth_results>
  </record>
</feedback>
"#;

	const JAN_2ND: i64 = 1_609_545_599;

	#[test]
	fn parses_aggregate_report() {
		let report = parse_report(REPORT).unwrap();
		assert_eq!(report.report_metadata.report_id, "1234567890");
		assert_eq!(report.policy_published.pct, 100);
		assert_eq!(report.record.len(), 2);

		let message = report.record[0].to_message();
		assert_eq!(message.source_ip, "192.0.2.10");
		assert_eq!(message.spf, Some(Verdict::Fail));
		assert_eq!(message.dkim, Some(Verdict::Pass));
		assert_eq!(message.count, 3);
		assert_eq!(message.dkim_results[0].selector, "selector1");
		assert_eq!(message.spf_results[0].domain, "mailer.example");
	}

	#[test]
	fn decompresses_gzip_and_zip() {
		let mut gz = GzEncoder::new(Vec::new(), Compression::default());
		gz.write_all(REPORT.as_bytes()).unwrap();
		let gz = gz.finish().unwrap();
		assert_eq!(read_report(ReportFileType::Gzip, gz).unwrap(), REPORT);

		let mut buffer = Cursor::new(Vec::new());
		{
			let mut archive = zip::ZipWriter::new(&mut buffer);
			archive.start_file("report.xml", zip::write::FileOptions::default()).unwrap();
			archive.write_all(REPORT.as_bytes()).unwrap();
			archive.finish().unwrap();
		}
		assert_eq!(read_report(ReportFileType::Zip, buffer.into_inner()).unwrap(), REPORT);
	}

	#[test]
	fn empty_zip_is_rejected() {
		let mut buffer = Cursor::new(Vec::new());
		{
			let mut archive = zip::ZipWriter::new(&mut buffer);
			archive.finish().unwrap();
		}
		assert!(read_report(ReportFileType::Zip, buffer.into_inner()).is_err());
	}

	#[test]
	fn file_types_by_extension() {
		assert_eq!(ReportFileType::from_path(Path::new("a/b.xml.gz")), Some(ReportFileType::Gzip));
		assert_eq!(ReportFileType::from_path(Path::new("b.ZIP")), Some(ReportFileType::Zip));
		assert_eq!(ReportFileType::from_path(Path::new("b.xml")), Some(ReportFileType::Xml));
		assert_eq!(ReportFileType::from_path(Path::new("notes.txt")), None);
	}

	#[test]
	fn recent_reports_also_feed_the_rolling_window() {
		let reports = vec![parse_report(REPORT).unwrap()];

		let jobs = group_reports(&reports, JAN_2ND + 86_400, 30);
		assert_eq!(jobs.len(), 2);
		assert_eq!(jobs[0].period, PeriodKey::ThirtyDays);
		assert_eq!(jobs[1].period.start_date(), "2021-01-01");
		assert!(jobs.iter().all(|j| j.domain == "domain.ca" && j.messages.len() == 2));
	}

	#[test]
	fn old_reports_leave_an_empty_rolling_window() {
		let reports = vec![parse_report(REPORT).unwrap()];

		let jobs = group_reports(&reports, JAN_2ND + 90 * 86_400, 30);
		assert_eq!(jobs.len(), 2);
		assert_eq!(jobs[0].domain, "domain.ca");
		assert_eq!(jobs[0].period, PeriodKey::ThirtyDays);
		assert!(jobs[0].messages.is_empty());
		assert_eq!(jobs[1].period.start_date(), "2021-01-01");
		assert_eq!(jobs[1].messages.len(), 2);
	}

	#[test]
	fn report_without_date_range_is_rejected() {
		let range = "<date_range>\n      <begin>1609459200</begin>\n      <end>1609545599</end>\n    </date_range>";
		assert!(REPORT.contains(range));
		let undated = REPORT.replace(range, "");
		assert!(parse_report(&undated).is_err());

		let epoch = REPORT.replace("<begin>1609459200</begin>", "<begin>0</begin>");
		assert!(parse_report(&epoch).is_err());
	}

	#[test]
	fn duplicate_reports_load_once() {
		let dir = tempfile::tempdir().unwrap();
		fs::write(dir.path().join("a.xml"), REPORT).unwrap();

		let mut gz = GzEncoder::new(Vec::new(), Compression::default());
		gz.write_all(REPORT.as_bytes()).unwrap();
		fs::write(dir.path().join("b.xml.gz"), gz.finish().unwrap()).unwrap();

		let other = REPORT.replace("<report_id>1234567890</report_id>", "<report_id>1234567891</report_id>");
		fs::write(dir.path().join("c.xml"), other).unwrap();

		let reports = load_reports(dir.path()).unwrap();
		let ids: Vec<&str> = reports.iter().map(|r| r.report_metadata.report_id.as_str()).collect();
		assert_eq!(ids, ["1234567890", "1234567891"]);
	}
}
