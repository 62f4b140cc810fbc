use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize)]
pub struct Config<'a> {
	#[serde(borrow)]
	pub database: DatabaseConfig<'a>,

	#[serde(borrow)]
	pub reports: ReportsConfig<'a>,

	#[serde(borrow)]
	pub runner: RunnerConfig<'a>
}

#[derive(Deserialize, Serialize)]
pub struct DatabaseConfig<'a> {
	pub host: &'a str,
	pub port: u16,
	pub username: &'a str,
	pub password: &'a str,
	pub database: &'a str
}

impl<'a> DatabaseConfig<'a> {
	pub fn url(&self) -> String {
		format!(
			"mysql://{}:{}@{}:{}/{}",
			self.username, self.password, self.host, self.port, self.database
		)
	}
}

#[derive(Deserialize, Serialize)]
pub struct ReportsConfig<'a> {
	/// Directory holding aggregate report files (.xml, .gz, .zip).
	pub folder: &'a str,
	/// Length of the rolling `thirtyDays` window, in days.
	pub thirty_day_window: u32
}

#[derive(Deserialize, Serialize)]
pub struct RunnerConfig<'a> {
	pub workers: usize,
	/// tracing env-filter directive, e.g. "info" or "dmarc_summary=debug"
	pub log_level: &'a str
}

pub const DEFAULT: Config = Config{
	database: DatabaseConfig{
		host: "localhost",
		port: 3306,
		username: "username",
		password: "password123",
		database: "tracker"
	},
	reports: ReportsConfig{
		folder: "reports",
		thirty_day_window: 30
	},
	runner: RunnerConfig{
		workers: 4,
		log_level: "info"
	}
};

pub fn parse(text: &str) -> Result<Config<'_>, toml::de::Error> {
	toml::from_str(text)
}
