use std::collections::BTreeSet;
use std::error::Error;
use std::fs;
use std::path::Path;
use std::process;

use chrono::Utc;
use tracing::{error, info};

use dmarc_summary::config;
use dmarc_summary::pipeline;
use dmarc_summary::report;
use dmarc_summary::store::mysql::{connect, MysqlStore};
use dmarc_summary::store::SummaryStore;

fn main() {
	let config_arg = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());

	/*
	 * config parsing
	 */
	let config_path = Path::new(&config_arg);
	if !config_path.exists() {
		println!("Could not find config, creating default...");
		let written = toml::to_string(&config::DEFAULT)
			.map_err(|err| err.to_string())
			.and_then(|text| fs::write(config_path, text).map_err(|err| err.to_string()));
		if let Err(err) = written {
			eprintln!("Could not write config file: {}", err);
			process::exit(1);
		}
	}

	let config_text = match fs::read_to_string(config_path) {
		Ok(text) => text,
		Err(err) => {
			eprintln!("Could not read config file: {}", err);
			process::exit(1);
		},
	};
	let config = match config::parse(&config_text) {
		Ok(config) => config,
		Err(err) => {
			eprintln!("Could not parse config file: {}", err);
			process::exit(1);
		},
	};

	tracing_subscriber::fmt()
		.with_env_filter(config.runner.log_level)
		.with_target(false)
		.with_thread_names(true)
		.init();

	match run(&config) {
		Ok(true) => {},
		Ok(false) => process::exit(1),
		Err(err) => {
			error!(error = %err, "summary run failed");
			process::exit(1);
		},
	}
}

/// Returns whether every summary was written.
fn run(config: &config::Config) -> Result<bool, Box<dyn Error>> {
	/*
	 * database connection
	 */
	let pool = connect(&config.database)?;
	MysqlStore::from_pool(&pool)?.ensure_schema()?;

	/*
	 * report loading
	 */
	let reports = report::load_reports(Path::new(config.reports.folder))?;
	let jobs = report::group_reports(&reports, Utc::now().timestamp(), config.reports.thirty_day_window);
	info!(reports = reports.len(), jobs = jobs.len(), "grouped reports");

	/*
	 * aggregation
	 */
	let batch = pipeline::run_batch(&jobs, config.runner.workers, || MysqlStore::from_pool(&pool))?;
	for failure in &batch.failures {
		error!(
			domain = failure.domain(),
			period = %failure.period(),
			kind = ?failure.kind(),
			"summary not written"
		);
	}

	/*
	 * stored summaries
	 */
	let domains: BTreeSet<&str> = jobs.iter().map(|job| job.domain.as_str()).collect();
	let mut store = MysqlStore::from_pool(&pool)?;
	for domain in domains {
		let stored = store.summaries_for_domain(domain)?;
		let periods: Vec<&str> = stored.iter().map(|(start_date, _)| start_date.as_str()).collect();
		let messages: u64 = stored.iter().map(|(_, summary)| summary.total_messages).fold(0, u64::saturating_add);
		info!(domain, periods = ?periods, messages, "stored summaries");
	}

	Ok(batch.succeeded())
}
