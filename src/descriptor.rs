use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{Map, Value};

use crate::error::LoadError;
use crate::store::LoadStateStore;

/// Context bag forwarded verbatim to every loader in a batch: the
/// navigation params plus a handle to the shared status store.
#[derive(Clone)]
pub struct LoadContext {
    pub params: Map<String, Value>,
    pub store: LoadStateStore,
}

impl LoadContext {
    pub fn new(params: Map<String, Value>, store: LoadStateStore) -> Self {
        Self { params, store }
    }
}

/// What a loader produced when invoked.
pub enum Loading {
    /// A value available synchronously.  Recorded as loaded right away;
    /// the key never enters the loading phase.
    Ready(Value),
    /// Work still in flight.  The key sits in the loading phase until
    /// the future settles.
    Pending(BoxFuture<'static, Result<Value, LoadError>>),
    /// Nothing to record for this invocation.
    Nothing,
}

impl Loading {
    /// Wrap a future as a pending load.
    pub fn pending<F>(fut: F) -> Self
    where
        F: Future<Output = Result<Value, LoadError>> + Send + 'static,
    {
        Loading::Pending(Box::pin(fut))
    }
}

type LoaderFn = dyn Fn(LoadContext) -> Loading + Send + Sync;

/// One declared data dependency of a component: an optional key and the
/// loader that produces the value for it.
///
/// A keyed descriptor's outcome, value or error, ends up under its key
/// in both the status store and the aggregated batch result.  A keyless
/// descriptor runs for its side effects only; its outcome is discarded
/// and its failure surfaces nowhere.
#[derive(Clone)]
pub struct LoadDescriptor {
    key: Option<String>,
    loader: Arc<LoaderFn>,
}

impl LoadDescriptor {
    pub fn keyed(
        key: impl Into<String>,
        loader: impl Fn(LoadContext) -> Loading + Send + Sync + 'static,
    ) -> Self {
        Self {
            key: Some(key.into()),
            loader: Arc::new(loader),
        }
    }

    pub fn keyless(loader: impl Fn(LoadContext) -> Loading + Send + Sync + 'static) -> Self {
        Self {
            key: None,
            loader: Arc::new(loader),
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub(crate) fn run(&self, context: LoadContext) -> Loading {
        (self.loader)(context)
    }
}

/// Seam between the batch runner and whatever component model the host
/// framework uses.  A bare component declares no data dependencies.
pub trait DataComponent: Send + Sync {
    /// The component's declared dependencies, in declaration order.
    /// That order is significant: it is the tie-break order when two
    /// descriptors of the same component share a key.
    fn load_descriptors(&self) -> &[LoadDescriptor] {
        &[]
    }

    /// Project every declared key onto the store's current value at
    /// that key, for prop injection by a state-binding layer.  Keys
    /// with no stored value map to null; keyless descriptors contribute
    /// nothing.
    fn state_to_props(&self, store: &LoadStateStore) -> Map<String, Value> {
        self.load_descriptors()
            .iter()
            .filter_map(LoadDescriptor::key)
            .map(|key| (key.to_owned(), store.value(key).unwrap_or(Value::Null)))
            .collect()
    }
}

/// A component with an attached descriptor sequence.
///
/// The wrapping is transparent: the inner component is reachable
/// through `Deref` and its behavior is untouched, the wrapper only adds
/// the [`DataComponent`] surface the batch runner reads.
pub struct Connected<C> {
    component: C,
    descriptors: Vec<LoadDescriptor>,
}

/// Attach an ordered descriptor sequence to a component.
pub fn connect<C>(descriptors: Vec<LoadDescriptor>, component: C) -> Connected<C> {
    Connected {
        component,
        descriptors,
    }
}

impl<C> Connected<C> {
    pub fn into_inner(self) -> C {
        self.component
    }
}

impl<C> Deref for Connected<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.component
    }
}

impl<C: Send + Sync> DataComponent for Connected<C> {
    fn load_descriptors(&self) -> &[LoadDescriptor] {
        &self.descriptors
    }
}
