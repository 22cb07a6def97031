//! This crate lets route-activated components declare asynchronous data
//! dependencies and makes sure that data is loaded, once, in a stable
//! order, and with race-condition protection, before or during a route
//! transition.  Load status is recorded in a central observable store
//! that the rest of the application can subscribe to.
//!
//! ## Use case
//!
//! A navigation typically activates several components at once, each
//! needing its own data before it is worth rendering: the current user,
//! the post list, a sidebar.  Firing all of those fetches independently
//! invites two classic problems.  First, a component further down the
//! tree may depend on something an earlier component loads, so the
//! fetches need deterministic ordering across components while still
//! overlapping within one component.  Second, when the user navigates
//! again before the first load settles, the slow stale result must not
//! overwrite what the newer navigation produced.
//!
//! The pieces here address exactly that.  Components declare their
//! dependencies as ordered [`LoadDescriptor`] sequences via the
//! [`connect`] wrapper.  [`load_route`] runs one batch over the active
//! component list: components strictly in order, each component's
//! loaders concurrently, failures captured as data instead of failing
//! the batch.  Every start and settlement is written into the shared
//! [`LoadStateStore`].  The [`TransitionGuard`](guard::TransitionGuard)
//! sits on top for live navigation: it tags every trigger with a
//! generation token and only commits a batch's props when no newer
//! trigger has started and the guard is still attached.
//!
//! For a single non-reactive pre-render pass on the server,
//! [`load_on_server`] runs one batch and flips the store's global
//! loaded flag, so a guard activating afterwards against the same
//! state can commit immediately without loading anything again.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use serde_json::{json, Map};
//!
//! use async_connect::{
//!     connect, load_route, LoadContext, LoadDescriptor, LoadStateStore, Loading, RouteEntry,
//! };
//!
//! # tokio_test::block_on(async {
//! // A component declaring one async dependency.
//! let user = LoadDescriptor::keyed("user", |_ctx| {
//!     Loading::pending(async { Ok(json!("Alice")) })
//! });
//! let profile = connect(vec![user], ());
//! let entries = [RouteEntry::single(Arc::new(profile))];
//!
//! let store = LoadStateStore::new();
//! let context = LoadContext::new(Map::new(), store.clone());
//! let results = load_route(&entries, context).await;
//!
//! assert_eq!(results["user"], Ok(json!("Alice")));
//! assert!(store.key_state("user").unwrap().loaded);
//! # });
//! ```

pub mod descriptor;
pub mod error;
pub mod guard;
pub mod route;
pub mod store;


pub use descriptor::{connect, Connected, DataComponent, LoadContext, LoadDescriptor, Loading};
pub use error::LoadError;
pub use guard::{CommitOutcome, Generation, NavProps, TransitionGuard, TriggerHandle};
pub use route::{
    each_components, filter_and_flatten, load_on_server, load_route, load_route_filtered,
    BatchResult, RouteEntry,
};
pub use store::{KeyState, LoadStateStore};
