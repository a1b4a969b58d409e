//! # Pagekit Core
//!
//! Element-tree model for a visual page builder.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 pagekit-core                 │
//! ├──────────────────────────────────────────────┤
//! │  Variant Model     │  Tree Locator           │
//! │  - Element kinds   │  - find / parent-of     │
//! │  - Record codec    │  - pre-order walk       │
//! ├──────────────────────────────────────────────┤
//! │  Mutation Engine   │  Insertion Policy       │
//! │  - Commands        │  - Drop / paste         │
//! │  - Compensation    │  - Defaults table       │
//! │  - Sibling swaps   │  - Grid snapping        │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Everything here is synchronous and free of I/O. Each mutation maps one
//! [`Forest`] value to the next; the synchronizer in `pagekit-sync` decides
//! when a forest is published and when it is rolled back.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod codec;
pub mod defaults;
pub mod element;
pub mod error;
pub mod insert;
pub mod mutation;
pub mod order;
pub mod project;
pub mod schema;
pub mod tree;

pub use defaults::{defaults_for, DefaultValue, Defaults};
pub use element::{
    Element, ElementId, ElementKind, ElementType, SelectOption, Settings, StyleMap,
};
pub use error::{BuilderError, BuilderResult};
pub use insert::{snap_to_grid, DropTarget, Insertion, InsertionPolicy, GRID_SIZE};
pub use mutation::{
    create, delete, reorder_swap, select, update, Applied, Command, Compensation, ElementPatch,
    Revert,
};
pub use order::{next_order, ordered, parent_of, swap_orders};
pub use project::Project;
pub use schema::{assemble, Assembled, ElementRecord, SkippedRecord};
pub use tree::{find_by_id, find_parent_of, flatten, pre_order, Forest, PreOrder};

/// Pagekit core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
