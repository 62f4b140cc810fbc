use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Operation, StoreError, SummaryStore, SummaryTransaction};
use crate::summary::{DocumentId, SummaryDocument, SummaryEdge};

#[derive(Clone, Debug, Default)]
struct State {
	next_id: DocumentId,
	domains: BTreeMap<DocumentId, String>,
	summaries: BTreeMap<DocumentId, SummaryDocument>,
	edges: BTreeMap<DocumentId, SummaryEdge>
}

impl State {
	fn allocate(&mut self) -> DocumentId {
		self.next_id += 1;
		self.next_id
	}
}

#[derive(Clone, Debug, Default)]
struct Faults {
	step: Option<Operation>,
	commit: bool
}

/// In-process store. Clones share the same collections.
///
/// A transaction holds the store's lock from `begin` until it is committed or
/// dropped, so concurrent units of work are fully serialized. Steps apply to
/// a private copy which replaces the shared state only on commit.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
	state: Arc<Mutex<State>>,
	faults: Faults
}

impl MemoryStore {
	pub fn new() -> MemoryStore {
		MemoryStore::default()
	}

	/// Makes every transaction opened through this handle fail at `step`.
	pub fn fail_on(mut self, step: Operation) -> MemoryStore {
		self.faults.step = Some(step);
		self
	}

	/// Makes every commit through this handle fail after its steps succeeded.
	pub fn fail_commit(mut self) -> MemoryStore {
		self.faults.commit = true;
		self
	}

	pub fn add_domain(&self, domain: &str) -> DocumentId {
		let mut state = self.snapshot();
		let id = state.allocate();
		state.domains.insert(id, domain.to_string());
		id
	}

	pub fn summaries(&self) -> Vec<(DocumentId, SummaryDocument)> {
		self.snapshot().summaries.iter().map(|(id, s)| (*id, s.clone())).collect()
	}

	pub fn edges(&self) -> Vec<SummaryEdge> {
		self.snapshot().edges.values().cloned().collect()
	}

	/// The summary linked to `domain` for `start_date`, following the edge.
	pub fn summary_for(&self, domain: &str, start_date: &str) -> Option<SummaryDocument> {
		let state = self.snapshot();
		let domain_id = find_domain(&state, domain)?;
		let edge = find_edge(&state, domain_id, start_date)?;
		state.summaries.get(&edge.to).cloned()
	}

	fn snapshot(&self) -> MutexGuard<'_, State> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

fn find_domain(state: &State, domain: &str) -> Option<DocumentId> {
	state.domains.iter().find(|(_, name)| name.as_str() == domain).map(|(id, _)| *id)
}

fn find_edge<'s>(state: &'s State, domain: DocumentId, start_date: &str) -> Option<&'s SummaryEdge> {
	state.edges.values().find(|e| e.from == domain && e.start_date == start_date)
}

impl SummaryStore for MemoryStore {
	fn begin(&mut self) -> Result<Box<dyn SummaryTransaction + '_>, StoreError> {
		let guard = self.state.lock()
			.map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))?;
		let working = guard.clone();

		Ok(Box::new(MemoryTransaction {
			guard,
			working,
			faults: self.faults.clone(),
		}))
	}

	fn summaries_for_domain(&mut self, domain: &str) -> Result<Vec<(String, SummaryDocument)>, StoreError> {
		let state = self.snapshot();
		let domain_id = match find_domain(&state, domain) {
			Some(id) => id,
			None => return Ok(Vec::new()),
		};

		let mut summaries: Vec<(String, SummaryDocument)> = state.edges.values()
			.filter(|e| e.from == domain_id)
			.filter_map(|e| state.summaries.get(&e.to).map(|s| (e.start_date.clone(), s.clone())))
			.collect();
		summaries.sort_by(|a, b| a.0.cmp(&b.0));
		Ok(summaries)
	}
}

struct MemoryTransaction<'a> {
	guard: MutexGuard<'a, State>,
	working: State,
	faults: Faults
}

impl<'a> MemoryTransaction<'a> {
	fn check(&self, step: Operation) -> Result<(), StoreError> {
		if self.faults.step == Some(step) {
			return Err(StoreError::Rejected(format!("injected failure in {}", step)));
		}
		Ok(())
	}
}

impl<'a> SummaryTransaction for MemoryTransaction<'a> {
	fn domain_id(&mut self, domain: &str) -> Result<Option<DocumentId>, StoreError> {
		self.check(Operation::FindDomain)?;
		Ok(find_domain(&self.working, domain))
	}

	fn summary_edge(&mut self, domain: DocumentId, start_date: &str) -> Result<Option<SummaryEdge>, StoreError> {
		self.check(Operation::FindEdge)?;
		Ok(find_edge(&self.working, domain, start_date).cloned())
	}

	fn insert_summary(&mut self, summary: &SummaryDocument) -> Result<DocumentId, StoreError> {
		self.check(Operation::InsertSummary)?;
		let id = self.working.allocate();
		self.working.summaries.insert(id, summary.clone());
		Ok(id)
	}

	fn replace_summary(&mut self, id: DocumentId, summary: &SummaryDocument) -> Result<(), StoreError> {
		self.check(Operation::ReplaceSummary)?;
		match self.working.summaries.get_mut(&id) {
			Some(stored) => {
				*stored = summary.clone();
				Ok(())
			},
			None => Err(StoreError::Rejected(format!("summary {} linked by edge does not exist", id))),
		}
	}

	fn insert_edge(&mut self, from: DocumentId, to: DocumentId, start_date: &str) -> Result<DocumentId, StoreError> {
		self.check(Operation::InsertEdge)?;
		if find_edge(&self.working, from, start_date).is_some() {
			return Err(StoreError::Rejected(format!("edge for ({}, {}) already exists", from, start_date)));
		}

		let id = self.working.allocate();
		self.working.edges.insert(id, SummaryEdge {
			id,
			from,
			to,
			start_date: start_date.to_string(),
		});
		Ok(id)
	}

	fn commit(self: Box<Self>) -> Result<(), StoreError> {
		let MemoryTransaction { mut guard, working, faults } = *self;
		if faults.commit {
			return Err(StoreError::Unavailable("injected commit failure".to_string()));
		}

		*guard = working;
		Ok(())
	}
}
