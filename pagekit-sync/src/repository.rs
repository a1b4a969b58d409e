//! Remote capabilities the synchronizer talks to.

use async_trait::async_trait;
use pagekit_core::{ElementRecord, Project};

use crate::error::RepositoryResult;

/// Durable store of element records; the authority on what is persisted.
#[async_trait]
pub trait ElementRepository: Send + Sync {
    /// Persist one new element.
    async fn create(&self, record: ElementRecord) -> RepositoryResult<()>;

    /// Persist several new elements atomically (a pasted or dropped subtree,
    /// parents before children).
    async fn batch_create(&self, records: Vec<ElementRecord>) -> RepositoryResult<()>;

    /// Overwrite an existing element.
    async fn update(&self, record: ElementRecord) -> RepositoryResult<()>;

    /// Remove an element. The authority clears `parentId` on its children.
    async fn delete(&self, id: &str) -> RepositoryResult<()>;

    /// Every record in a project scope, flat.
    async fn list_all(&self, scope: &str) -> RepositoryResult<Vec<ElementRecord>>;

    /// Records of a published project, flat.
    async fn list_public(&self, scope: &str) -> RepositoryResult<Vec<ElementRecord>>;

    /// Exchange the stored `order` of two siblings. Both records are passed as
    /// they were before the swap; the stored values decide.
    async fn swap_order(&self, first: ElementRecord, second: ElementRecord)
        -> RepositoryResult<()>;
}

/// Durable store of project metadata.
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Persist a new project, returning the stored copy.
    async fn create(&self, project: Project) -> RepositoryResult<Project>;

    /// All projects visible to the caller.
    async fn list_all(&self) -> RepositoryResult<Vec<Project>>;

    /// One project by id.
    async fn get_by_id(&self, id: &str) -> RepositoryResult<Project>;

    /// Overwrite a project, returning the stored copy.
    async fn update(&self, project: Project) -> RepositoryResult<Project>;

    /// Remove a project.
    async fn delete(&self, id: &str) -> RepositoryResult<()>;
}
