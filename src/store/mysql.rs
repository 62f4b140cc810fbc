use mysql::prelude::*;
use mysql::{params, Pool, PooledConn, TxOpts};

use super::{StoreError, SummaryStore, SummaryTransaction};
use crate::config::DatabaseConfig;
use crate::summary::{DocumentId, SummaryDocument, SummaryEdge};

/// Collections as tables. Summaries are kept as JSON documents in their persisted shape.
pub const SCHEMA: &[&str] = &[
	"CREATE TABLE IF NOT EXISTS domains (
		id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
		domain VARCHAR(255) NOT NULL,
		UNIQUE KEY domain_name (domain)
	)",
	"CREATE TABLE IF NOT EXISTS dmarc_summaries (
		id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
		document LONGTEXT NOT NULL
	)",
	"CREATE TABLE IF NOT EXISTS domains_to_dmarc_summaries (
		id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
		_from BIGINT UNSIGNED NOT NULL,
		_to BIGINT UNSIGNED NOT NULL,
		start_date VARCHAR(32) NOT NULL,
		UNIQUE KEY domain_period (_from, start_date),
		FOREIGN KEY (_from) REFERENCES domains (id) ON DELETE CASCADE,
		FOREIGN KEY (_to) REFERENCES dmarc_summaries (id) ON DELETE CASCADE
	)",
];

/// Opens a connection pool from the `[database]` config section.
pub fn connect(config: &DatabaseConfig) -> Result<Pool, StoreError> {
	let pool = Pool::new(config.url().as_str())?;
	Ok(pool)
}

/// One pooled connection, used by exactly one unit of work.
pub struct MysqlStore {
	conn: PooledConn
}

impl MysqlStore {
	pub fn new(conn: PooledConn) -> MysqlStore {
		MysqlStore { conn }
	}

	pub fn from_pool(pool: &Pool) -> Result<MysqlStore, StoreError> {
		Ok(MysqlStore::new(pool.get_conn()?))
	}

	pub fn ensure_schema(&mut self) -> Result<(), StoreError> {
		for statement in SCHEMA {
			self.conn.query_drop(*statement)?;
		}
		Ok(())
	}
}

impl SummaryStore for MysqlStore {
	fn begin(&mut self) -> Result<Box<dyn SummaryTransaction + '_>, StoreError> {
		let tx = self.conn.start_transaction(TxOpts::default())?;
		Ok(Box::new(MysqlTransaction { tx }))
	}

	fn summaries_for_domain(&mut self, domain: &str) -> Result<Vec<(String, SummaryDocument)>, StoreError> {
		let mut cursor = self.conn.exec_iter(
			"SELECT e.start_date, s.document
			FROM domains d
			JOIN domains_to_dmarc_summaries e ON e._from = d.id
			JOIN dmarc_summaries s ON s.id = e._to
			WHERE d.domain = :domain
			ORDER BY e.start_date",
			params! { "domain" => domain },
		)?;

		let mut summaries = Vec::new();
		for row in cursor.by_ref() {
			let (start_date, document): (String, String) = mysql::from_row_opt(row?)
				.map_err(|_| StoreError::Rejected("unexpected summary row shape".to_string()))?;
			summaries.push((start_date, serde_json::from_str(&document)?));
		}

		Ok(summaries)
	}
}

struct MysqlTransaction<'a> {
	tx: mysql::Transaction<'a>
}

impl<'a> SummaryTransaction for MysqlTransaction<'a> {
	fn domain_id(&mut self, domain: &str) -> Result<Option<DocumentId>, StoreError> {
		// FOR UPDATE serializes concurrent writers for the same domain
		let id = self.tx.exec_first::<u64, _, _>(
			"SELECT id FROM domains WHERE domain = :domain FOR UPDATE",
			params! { "domain" => domain },
		)?;
		Ok(id)
	}

	fn summary_edge(&mut self, domain: DocumentId, start_date: &str) -> Result<Option<SummaryEdge>, StoreError> {
		let row = self.tx.exec_first::<(u64, u64, u64, String), _, _>(
			"SELECT id, _from, _to, start_date FROM domains_to_dmarc_summaries
			WHERE _from = :domain AND start_date = :start_date FOR UPDATE",
			params! { "domain" => domain, "start_date" => start_date },
		)?;

		Ok(row.map(|(id, from, to, start_date)| SummaryEdge { id, from, to, start_date }))
	}

	fn insert_summary(&mut self, summary: &SummaryDocument) -> Result<DocumentId, StoreError> {
		let document = serde_json::to_string(summary)?;
		self.tx.exec_drop(
			"INSERT INTO dmarc_summaries (document) VALUES (:document)",
			params! { "document" => document },
		)?;

		self.tx.last_insert_id()
			.ok_or_else(|| StoreError::Rejected("summary insert returned no id".to_string()))
	}

	fn replace_summary(&mut self, id: DocumentId, summary: &SummaryDocument) -> Result<(), StoreError> {
		let document = serde_json::to_string(summary)?;
		self.tx.exec_drop(
			"UPDATE dmarc_summaries SET document = :document WHERE id = :id",
			params! { "document" => document, "id" => id },
		)?;

		if self.tx.affected_rows() == 0 {
			// either gone, or byte-identical to what is stored
			let exists = self.tx.exec_first::<u64, _, _>(
				"SELECT id FROM dmarc_summaries WHERE id = :id",
				params! { "id" => id },
			)?;
			if exists.is_none() {
				return Err(StoreError::Rejected(format!("summary {} linked by edge does not exist", id)));
			}
		}

		Ok(())
	}

	fn insert_edge(&mut self, from: DocumentId, to: DocumentId, start_date: &str) -> Result<DocumentId, StoreError> {
		self.tx.exec_drop(
			"INSERT INTO domains_to_dmarc_summaries (_from, _to, start_date) VALUES (:from, :to, :start_date)",
			params! { "from" => from, "to" => to, "start_date" => start_date },
		)?;

		self.tx.last_insert_id()
			.ok_or_else(|| StoreError::Rejected("edge insert returned no id".to_string()))
	}

	fn commit(self: Box<Self>) -> Result<(), StoreError> {
		let this = *self;
		this.tx.commit()?;
		Ok(())
	}
}
