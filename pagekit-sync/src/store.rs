//! # Optimistic element store
//!
//! [`ElementStore`] is the single owner of a project's published [`Forest`].
//! Every mutation runs in two phases:
//!
//! 1. **Apply and publish** (synchronous). The command is applied to the
//!    current forest under a short lock, the result is published to
//!    subscribers, and the command joins the pending log.
//! 2. **Confirm** (spawned task). The matching repository call is issued. On
//!    success the command is marked settled. On failure it is dropped from
//!    the log and the rest of the log is replayed onto the base forest.
//!
//! The base forest has every settled change folded in, so the published
//! forest is always the base plus the changes that have not failed. With
//! nothing else pending, a rollback restores the previous forest exactly.
//! With overlapping commands, later writes to the same field or sibling
//! order survive the rollback of an earlier one.
//!
//! Every rollback is broadcast as a [`Notice`].

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};

use pagekit_core::{
    assemble, mutation, pre_order, BuilderError, BuilderResult, Command, Element, ElementId,
    ElementPatch, ElementRecord, Forest, Insertion,
};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{RepositoryError, SyncError};
use crate::repository::ElementRepository;

/// Capacity of the notice broadcast channel.
const NOTICE_CAPACITY: usize = 64;

/// Something subscribers should tell the user about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A published change was refused by the repository and undone.
    RolledBack {
        /// Command name (`create`, `update`, ...).
        command: &'static str,
        /// The element the command targeted.
        target: ElementId,
        /// Reason reported by the repository.
        reason: String,
    },
}

type Listener = Arc<dyn Fn(&Forest) + Send + Sync>;

/// Published element forest with optimistic, repository-confirmed mutations.
#[derive(Clone)]
pub struct ElementStore {
    inner: Arc<Inner>,
}

struct Inner {
    repository: Arc<dyn ElementRepository>,
    state: Mutex<State>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener: AtomicU64,
    watch: watch::Sender<Arc<Forest>>,
    notices: broadcast::Sender<Notice>,
}

struct State {
    forest: Arc<Forest>,
    version: u64,
    /// `forest` minus every entry still in `pending`.
    base: Arc<Forest>,
    /// Published changes not yet folded into `base`, oldest first.
    pending: VecDeque<Pending>,
    next_seq: u64,
}

struct Pending {
    seq: u64,
    step: Step,
    settled: bool,
}

/// A change as the log replays it.
#[derive(Debug)]
enum Step {
    Command(Command),
    Select(Option<ElementId>),
}

impl Step {
    fn apply(&self, forest: &Forest) -> BuilderResult<Forest> {
        match self {
            Self::Command(command) => command.apply(forest).map(|applied| applied.forest),
            Self::Select(id) => mutation::select(forest, id.as_ref().map(ElementId::as_str)),
        }
    }
}

impl State {
    fn push(&mut self, step: Step, settled: bool) -> u64 {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.pending.push_back(Pending { seq, step, settled });
        seq
    }

    /// Fold the settled front of the log into `base`.
    fn fold(&mut self) {
        let mut folded = Vec::new();
        while let Some(entry) = self.pending.pop_front() {
            if !entry.settled {
                self.pending.push_front(entry);
                break;
            }
            folded.push(entry.step);
        }
        if self.pending.is_empty() {
            self.base = Arc::clone(&self.forest);
        } else if !folded.is_empty() {
            self.base = replay(&self.base, folded.iter());
        }
    }
}

/// Re-apply `steps` on top of `base`.
///
/// A step that no longer applies is skipped, except a create whose parent is
/// gone, which lands at the root the way `assemble` places orphans.
fn replay<'a>(base: &Arc<Forest>, steps: impl Iterator<Item = &'a Step>) -> Arc<Forest> {
    let mut forest = Arc::clone(base);
    for step in steps {
        let next = match step.apply(&forest) {
            Err(BuilderError::ParentNotFound(parent)) => match step {
                Step::Command(Command::Create { element, .. }) => {
                    warn!(
                        element = %element.id,
                        parent = %parent,
                        "parent gone, replaying create at the root"
                    );
                    Command::Create {
                        element: element.clone(),
                        parent_id: None,
                    }
                    .apply(&forest)
                    .map(|applied| applied.forest)
                }
                _ => Err(BuilderError::ParentNotFound(parent)),
            },
            other => other,
        };
        match next {
            Ok(next) => forest = Arc::new(next),
            Err(error) => warn!(?step, %error, "change no longer applies, skipped on replay"),
        }
    }
    forest
}

impl std::fmt::Debug for ElementStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock_state();
        f.debug_struct("ElementStore")
            .field("elements", &state.forest.len())
            .field("version", &state.version)
            .field("pending", &state.pending.len())
            .finish_non_exhaustive()
    }
}

impl ElementStore {
    /// Create a store with an empty forest.
    pub fn new(repository: Arc<dyn ElementRepository>) -> Self {
        Self::with_forest(repository, Forest::new())
    }

    /// Create a store publishing `forest`.
    pub fn with_forest(repository: Arc<dyn ElementRepository>, forest: Forest) -> Self {
        let forest = Arc::new(forest);
        let (watch, _) = watch::channel(Arc::clone(&forest));
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                repository,
                state: Mutex::new(State {
                    base: Arc::clone(&forest),
                    forest,
                    version: 0,
                    pending: VecDeque::new(),
                    next_seq: 0,
                }),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(1),
                watch,
                notices,
            }),
        }
    }

    /// Load every element of a project scope.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Load`] if the repository call fails. Records that
    /// cannot be placed are skipped with a warning.
    pub async fn load(
        repository: Arc<dyn ElementRepository>,
        scope: &str,
    ) -> Result<Self, SyncError> {
        let records = repository.list_all(scope).await?;
        Ok(Self::from_records(repository, scope, records))
    }

    /// Load the published elements of a public scope.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Load`] if the repository call fails.
    pub async fn load_public(
        repository: Arc<dyn ElementRepository>,
        scope: &str,
    ) -> Result<Self, SyncError> {
        let records = repository.list_public(scope).await?;
        Ok(Self::from_records(repository, scope, records))
    }

    fn from_records(
        repository: Arc<dyn ElementRepository>,
        scope: &str,
        records: Vec<ElementRecord>,
    ) -> Self {
        let total = records.len();
        let assembled = assemble(records);
        info!(
            scope,
            records = total,
            roots = assembled.forest.roots().len(),
            skipped = assembled.skipped.len(),
            "loaded element forest"
        );
        Self::with_forest(repository, assembled.forest)
    }

    /// The published forest.
    #[must_use]
    pub fn current_forest(&self) -> Arc<Forest> {
        Arc::clone(&self.inner.lock_state().forest)
    }

    /// Number of publishes so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.lock_state().version
    }

    /// Call `listener` with the full forest after every publish.
    ///
    /// The listener runs on the publishing thread, outside the store lock.
    /// Dropping the returned [`Subscription`] unsubscribes.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Forest) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        self.inner
            .lock_listeners()
            .push((id, Arc::new(listener)));
        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// A receiver that always holds the latest published forest.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Arc<Forest>> {
        self.inner.watch.subscribe()
    }

    /// A receiver of rollback notices.
    #[must_use]
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.inner.notices.subscribe()
    }

    /// Create `element` (with its subtree) under `parent_id` or at the root.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Mutation`] if the mutation is rejected locally.
    pub fn create(
        &self,
        element: Element,
        parent_id: Option<&ElementId>,
    ) -> Result<Confirmation, SyncError> {
        self.execute(Command::Create {
            element,
            parent_id: parent_id.cloned(),
        })
    }

    /// Carry out a placement decided by the insertion policy.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Mutation`] if the mutation is rejected locally.
    pub fn insert(&self, insertion: Insertion) -> Result<Confirmation, SyncError> {
        self.execute(insertion.into_command())
    }

    /// Merge `patch` into the element `id`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Mutation`] if the mutation is rejected locally.
    pub fn update(&self, id: &str, patch: ElementPatch) -> Result<Confirmation, SyncError> {
        self.execute(Command::Update {
            id: ElementId::from(id),
            patch,
        })
    }

    /// Delete the element `id`, detaching its children.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Mutation`] if the mutation is rejected locally.
    pub fn delete(&self, id: &str) -> Result<Confirmation, SyncError> {
        self.execute(Command::Delete {
            id: ElementId::from(id),
        })
    }

    /// Exchange the order of two siblings.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Mutation`] if the mutation is rejected locally.
    pub fn swap(&self, first: &str, second: &str) -> Result<Confirmation, SyncError> {
        self.execute(Command::Swap {
            first: ElementId::from(first),
            second: ElementId::from(second),
        })
    }

    /// Select one element, clearing any other selection. Local only.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Mutation`] if `id` does not resolve.
    pub fn select(&self, id: &str) -> Result<(), SyncError> {
        self.publish_local(Step::Select(Some(ElementId::from(id))))
    }

    /// Clear the selection. Local only.
    pub fn clear_selection(&self) {
        if let Err(error) = self.publish_local(Step::Select(None)) {
            warn!(%error, "clearing selection failed");
        }
    }

    /// Apply `command`, publish the result, and confirm it in the background.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Mutation`] if the command is rejected locally (the
    /// forest is not touched), or [`SyncError::TaskFailed`] outside a runtime.
    pub fn execute(&self, command: Command) -> Result<Confirmation, SyncError> {
        if matches!(&command, Command::Update { patch, .. } if patch.is_transient()) {
            self.publish_local(Step::Command(command))?;
            return Ok(Confirmation::ready());
        }

        let runtime = Handle::try_current().map_err(|e| SyncError::TaskFailed(e.to_string()))?;

        let (published, version, seq, call) = {
            let mut state = self.inner.lock_state();
            let applied = command.apply(&state.forest)?;
            let call = RemoteCall::plan(&command, &state.forest, &applied.forest)?;
            let seq = state.push(Step::Command(command.clone()), false);
            state.forest = Arc::new(applied.forest);
            state.version += 1;
            self.inner.watch.send_replace(Arc::clone(&state.forest));
            (Arc::clone(&state.forest), state.version, seq, call)
        };
        debug!(
            command = command.name(),
            target = %command.target(),
            version,
            "published optimistic change"
        );
        self.inner.notify(&published);

        let inner = Arc::clone(&self.inner);
        let handle = runtime.spawn(async move {
            match call.send(inner.repository.as_ref()).await {
                Ok(()) => {
                    debug!(
                        command = command.name(),
                        target = %command.target(),
                        version,
                        "remote confirmed"
                    );
                    inner.settle(seq);
                    Ok(())
                }
                Err(error) => {
                    let reason = error.to_string();
                    inner.roll_back(&command, seq, &reason);
                    Err(SyncError::RemoteRejected {
                        command: command.name(),
                        reason,
                    })
                }
            }
        });
        Ok(Confirmation {
            handle: Some(handle),
        })
    }

    /// Publish a local-only change. It joins the log already settled so a
    /// later replay keeps it.
    fn publish_local(&self, step: Step) -> Result<(), SyncError> {
        let published = {
            let mut state = self.inner.lock_state();
            let next = Arc::new(step.apply(&state.forest)?);
            state.push(step, true);
            state.forest = Arc::clone(&next);
            state.version += 1;
            state.fold();
            self.inner.watch.send_replace(Arc::clone(&next));
            next
        };
        self.inner.notify(&published);
        Ok(())
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listeners(&self) -> MutexGuard<'_, Vec<(u64, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, forest: &Forest) {
        let listeners: Vec<Listener> = self
            .lock_listeners()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(forest);
        }
    }

    fn settle(&self, seq: u64) {
        let mut state = self.lock_state();
        if let Some(entry) = state.pending.iter_mut().find(|entry| entry.seq == seq) {
            entry.settled = true;
        }
        state.fold();
    }

    fn roll_back(&self, command: &Command, seq: u64, reason: &str) {
        let (restored, pending) = {
            let mut state = self.lock_state();
            let restored = match state.pending.iter().position(|entry| entry.seq == seq) {
                Some(at) => {
                    state.pending.remove(at);
                    let next = replay(&state.base, state.pending.iter().map(|entry| &entry.step));
                    state.forest = Arc::clone(&next);
                    state.version += 1;
                    state.fold();
                    self.watch.send_replace(Arc::clone(&next));
                    Some(next)
                }
                None => None,
            };
            (restored, state.pending.len())
        };

        warn!(
            command = command.name(),
            target = %command.target(),
            seq,
            reason,
            restored = restored.is_some(),
            pending,
            "remote rejected change"
        );
        if let Some(forest) = restored {
            self.notify(&forest);
        }
        // No receivers is fine.
        let _ = self.notices.send(Notice::RolledBack {
            command: command.name(),
            target: command.target().clone(),
            reason: reason.to_string(),
        });
    }
}

/// The repository call that makes a command durable.
#[derive(Debug)]
enum RemoteCall {
    Create(ElementRecord),
    BatchCreate(Vec<ElementRecord>),
    Update(ElementRecord),
    Delete(String),
    Swap(ElementRecord, ElementRecord),
}

impl RemoteCall {
    fn plan(command: &Command, before: &Forest, after: &Forest) -> BuilderResult<Self> {
        let find = |forest: &Forest, id: &ElementId| -> BuilderResult<ElementRecord> {
            forest
                .find_by_id(id.as_str())
                .ok_or_else(|| BuilderError::ElementNotFound(id.to_string()))
                .and_then(ElementRecord::flat)
        };

        Ok(match command {
            Command::Create { element, .. } => {
                let created = after
                    .find_by_id(element.id.as_str())
                    .ok_or_else(|| BuilderError::ElementNotFound(element.id.to_string()))?;
                let mut records = pre_order(std::slice::from_ref(created))
                    .map(ElementRecord::flat)
                    .collect::<BuilderResult<Vec<_>>>()?;
                if records.len() == 1 {
                    Self::Create(records.remove(0))
                } else {
                    Self::BatchCreate(records)
                }
            }
            Command::Update { id, .. } => Self::Update(find(after, id)?),
            Command::Delete { id } => Self::Delete(id.to_string()),
            Command::Swap { first, second } => {
                Self::Swap(find(before, first)?, find(before, second)?)
            }
        })
    }

    async fn send(self, repository: &dyn ElementRepository) -> Result<(), RepositoryError> {
        match self {
            Self::Create(record) => repository.create(record).await,
            Self::BatchCreate(records) => repository.batch_create(records).await,
            Self::Update(record) => repository.update(record).await,
            Self::Delete(id) => repository.delete(&id).await,
            Self::Swap(first, second) => repository.swap_order(first, second).await,
        }
    }
}

/// Outcome of the background confirmation of one command.
///
/// Await it to learn whether the repository accepted the change. Dropping it
/// does not cancel the confirmation.
#[derive(Debug)]
#[must_use = "await the confirmation or call `detach`"]
pub struct Confirmation {
    handle: Option<JoinHandle<Result<(), SyncError>>>,
}

impl Confirmation {
    fn ready() -> Self {
        Self { handle: None }
    }

    /// Let the confirmation finish in the background.
    pub fn detach(self) {}

    /// Whether the repository call has completed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Future for Confirmation {
    type Output = Result<(), SyncError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.handle.as_mut() {
            None => Poll::Ready(Ok(())),
            Some(handle) => Pin::new(handle).poll(cx).map(|joined| {
                joined.unwrap_or_else(|e| Err(SyncError::TaskFailed(e.to_string())))
            }),
        }
    }
}

/// Listener registration; unsubscribes on drop.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    inner: Weak<Inner>,
}

impl Subscription {
    /// Stop receiving updates.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.lock_listeners().retain(|(id, _)| *id != self.id);
        }
    }
}
