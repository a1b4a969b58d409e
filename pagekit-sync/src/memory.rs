//! In-process repository.
//!
//! Behaves like the remote authority (same record layout, same delete and swap
//! semantics) and can be told to reject calls, which makes rollback paths
//! reproducible without a network.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use pagekit_core::{ElementRecord, Project};

use crate::error::{RepositoryError, RepositoryResult};
use crate::repository::{ElementRepository, ProjectRepository};

/// Status used for injected rejections.
const REJECTED_STATUS: u16 = 422;

/// Status used when a create collides with an existing id.
const CONFLICT_STATUS: u16 = 409;

/// Thread-safe in-memory element and project repository.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    /// Records in insertion order.
    elements: Vec<ElementRecord>,
    projects: BTreeMap<String, Project>,
    public_scopes: HashMap<String, String>,
    reject_ids: HashMap<String, String>,
    reject_next: Option<String>,
    /// Rejections keyed by position in `calls`.
    reject_calls: HashMap<usize, String>,
    calls: Vec<String>,
}

impl MemoryState {
    fn position(&self, id: &str) -> Option<usize> {
        self.elements.iter().position(|r| r.id == id)
    }

    /// Record the call and apply any injected failure for `ids`.
    fn admit(&mut self, call: &str, ids: &[&str]) -> RepositoryResult<()> {
        let position = self.calls.len();
        self.calls.push(format!("{call}:{}", ids.join(",")));
        if let Some(reason) = self
            .reject_next
            .take()
            .or_else(|| self.reject_calls.remove(&position))
        {
            return Err(RepositoryError::Rejected {
                status: REJECTED_STATUS,
                reason,
            });
        }
        match ids.iter().find_map(|id| self.reject_ids.get(*id)) {
            Some(reason) => Err(RepositoryError::Rejected {
                status: REJECTED_STATUS,
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl MemoryRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository pre-populated with records.
    #[must_use]
    pub fn with_records(records: Vec<ElementRecord>) -> Self {
        let repository = Self::new();
        repository.lock().elements = records;
        repository
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reject every future mutating call that touches `id`.
    pub fn reject(&self, id: impl Into<String>, reason: impl Into<String>) {
        self.lock().reject_ids.insert(id.into(), reason.into());
    }

    /// Stop rejecting calls for `id`.
    pub fn accept(&self, id: &str) {
        self.lock().reject_ids.remove(id);
    }

    /// Reject the next mutating call, whatever it touches.
    pub fn reject_next(&self, reason: impl Into<String>) {
        self.lock().reject_next = Some(reason.into());
    }

    /// Reject the mutating call that lands at `position` in [`calls`].
    ///
    /// [`calls`]: Self::calls
    pub fn reject_call(&self, position: usize, reason: impl Into<String>) {
        self.lock().reject_calls.insert(position, reason.into());
    }

    /// Serve `project_id`'s elements under a public scope.
    pub fn publish(&self, scope: impl Into<String>, project_id: impl Into<String>) {
        self.lock()
            .public_scopes
            .insert(scope.into(), project_id.into());
    }

    /// Snapshot of stored records in insertion order.
    #[must_use]
    pub fn records(&self) -> Vec<ElementRecord> {
        self.lock().elements.clone()
    }

    /// One stored record.
    #[must_use]
    pub fn record(&self, id: &str) -> Option<ElementRecord> {
        self.lock().elements.iter().find(|r| r.id == id).cloned()
    }

    /// Log of mutating calls, as `name:id,id`.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }
}

#[async_trait]
impl ElementRepository for MemoryRepository {
    async fn create(&self, record: ElementRecord) -> RepositoryResult<()> {
        self.batch_create(vec![record]).await
    }

    async fn batch_create(&self, records: Vec<ElementRecord>) -> RepositoryResult<()> {
        let mut state = self.lock();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        let call = if records.len() == 1 { "create" } else { "batch_create" };
        state.admit(call, &ids)?;
        if let Some(existing) = ids.iter().find(|id| state.position(id).is_some()) {
            return Err(RepositoryError::Rejected {
                status: CONFLICT_STATUS,
                reason: format!("element {existing} already exists"),
            });
        }
        state.elements.extend(records);
        Ok(())
    }

    async fn update(&self, record: ElementRecord) -> RepositoryResult<()> {
        let mut state = self.lock();
        state.admit("update", &[record.id.as_str()])?;
        let index = state
            .position(&record.id)
            .ok_or_else(|| RepositoryError::NotFound(record.id.clone()))?;
        state.elements[index] = record;
        Ok(())
    }

    async fn delete(&self, id: &str) -> RepositoryResult<()> {
        let mut state = self.lock();
        state.admit("delete", &[id])?;
        let index = state
            .position(id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        state.elements.remove(index);
        for record in &mut state.elements {
            if record.parent_id.as_deref() == Some(id) {
                record.parent_id = None;
            }
        }
        Ok(())
    }

    async fn list_all(&self, scope: &str) -> RepositoryResult<Vec<ElementRecord>> {
        Ok(self
            .lock()
            .elements
            .iter()
            .filter(|r| r.project_id == scope)
            .cloned()
            .collect())
    }

    async fn list_public(&self, scope: &str) -> RepositoryResult<Vec<ElementRecord>> {
        let project_id = self
            .lock()
            .public_scopes
            .get(scope)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("public scope {scope}")))?;
        ElementRepository::list_all(self, &project_id).await
    }

    async fn swap_order(
        &self,
        first: ElementRecord,
        second: ElementRecord,
    ) -> RepositoryResult<()> {
        let mut state = self.lock();
        state.admit("swap_order", &[first.id.as_str(), second.id.as_str()])?;
        let a = state
            .position(&first.id)
            .ok_or_else(|| RepositoryError::NotFound(first.id.clone()))?;
        let b = state
            .position(&second.id)
            .ok_or_else(|| RepositoryError::NotFound(second.id.clone()))?;
        // The stored orders are swapped; the client's copies may be stale.
        let (order_a, order_b) = (state.elements[a].order, state.elements[b].order);
        state.elements[a].order = order_b;
        state.elements[b].order = order_a;
        Ok(())
    }
}

#[async_trait]
impl ProjectRepository for MemoryRepository {
    async fn create(&self, project: Project) -> RepositoryResult<Project> {
        let mut state = self.lock();
        state.admit("create_project", &[project.id.as_str()])?;
        if state.projects.contains_key(&project.id) {
            return Err(RepositoryError::Rejected {
                status: CONFLICT_STATUS,
                reason: format!("project {} already exists", project.id),
            });
        }
        state.projects.insert(project.id.clone(), project.clone());
        Ok(project)
    }

    async fn list_all(&self) -> RepositoryResult<Vec<Project>> {
        Ok(self.lock().projects.values().cloned().collect())
    }

    async fn get_by_id(&self, id: &str) -> RepositoryResult<Project> {
        self.lock()
            .projects
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn update(&self, project: Project) -> RepositoryResult<Project> {
        let mut state = self.lock();
        state.admit("update_project", &[project.id.as_str()])?;
        match state.projects.get_mut(&project.id) {
            Some(stored) => {
                *stored = project.clone();
                Ok(project)
            }
            None => Err(RepositoryError::NotFound(project.id)),
        }
    }

    async fn delete(&self, id: &str) -> RepositoryResult<()> {
        let mut state = self.lock();
        state.admit("delete_project", &[id])?;
        state
            .projects
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }
}
