//! # Pagekit Sync
//!
//! Optimistic synchronization between a published element forest and a
//! remote repository.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  apply + publish   ┌──────────────┐
//! │ ElementStore │ ─────────────────► │ subscribers  │
//! └──────┬───────┘                    └──────────────┘
//!        │ spawn confirm
//!        ▼
//! ┌──────────────────────────────┐
//! │ ElementRepository            │
//! │  - ApiClient (HTTP)          │
//! │  - MemoryRepository          │
//! └──────────────────────────────┘
//! ```
//!
//! A command is applied and published immediately. Its repository call runs
//! on a spawned task; if the call fails, the store rolls the command back and
//! emits a [`Notice`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod http;
pub mod memory;
pub mod repository;
pub mod store;

pub use error::{RepositoryError, RepositoryResult, SyncError};
pub use http::{ApiClient, HttpElementRepository, HttpProjectRepository, RetryConfig};
pub use memory::MemoryRepository;
pub use repository::{ElementRepository, ProjectRepository};
pub use store::{Confirmation, ElementStore, Notice, Subscription};
