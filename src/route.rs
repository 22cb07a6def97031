use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures::future::{join_all, FutureExt};
use serde_json::Value;
use tracing::debug;

use crate::descriptor::{DataComponent, LoadContext, LoadDescriptor, Loading};
use crate::error::LoadError;

/// One position in the active component list for a navigation.
///
/// A position is either a single component or a mapping of named slots;
/// named slots contribute their components at the position of their
/// parent, iterated in slot-name order.
#[derive(Clone)]
pub enum RouteEntry {
    Single(Arc<dyn DataComponent>),
    Named(BTreeMap<String, Arc<dyn DataComponent>>),
}

impl RouteEntry {
    pub fn single(component: Arc<dyn DataComponent>) -> Self {
        RouteEntry::Single(component)
    }

    pub fn named<I>(slots: I) -> Self
    where
        I: IntoIterator<Item = (String, Arc<dyn DataComponent>)>,
    {
        RouteEntry::Named(slots.into_iter().collect())
    }
}

/// Visit every component in the entry list, in flattened order.
pub fn each_components(entries: &[RouteEntry], mut f: impl FnMut(&Arc<dyn DataComponent>)) {
    for entry in entries {
        match entry {
            RouteEntry::Single(component) => f(component),
            RouteEntry::Named(slots) => {
                for component in slots.values() {
                    f(component);
                }
            }
        }
    }
}

/// Flatten the entry list down to the components that declare at least
/// one data dependency, preserving order.
pub fn filter_and_flatten(entries: &[RouteEntry]) -> Vec<Arc<dyn DataComponent>> {
    let mut flattened = Vec::new();
    each_components(entries, |component| {
        if !component.load_descriptors().is_empty() {
            flattened.push(Arc::clone(component));
        }
    });
    flattened
}

/// Aggregated outcome of one batch, keyed by descriptor key.  A failed
/// keyed loader shows up as `Err` under its key rather than failing the
/// batch.
pub type BatchResult = HashMap<String, Result<Value, LoadError>>;

/// Run a full batch over the entry list with the default always-true
/// filter.  See [`load_route_filtered`].
pub async fn load_route(entries: &[RouteEntry], context: LoadContext) -> BatchResult {
    load_route_filtered(entries, context, |_, _| true).await
}

/// Run a full batch over the entry list.
///
/// Components run strictly in flattened order: none of component N+1's
/// loaders is invoked until every loader of component N has settled.
/// Within one component all eligible loaders are launched before any is
/// awaited, so sibling sub-requests interleave freely.
///
/// Status transitions are written into the context's store as each
/// loader starts and settles.  An empty flattened list resolves to an
/// empty map without touching the store.  On key collision the last
/// writer in flattened descriptor order wins.
///
/// The returned future never fails; individual loader failures are
/// captured as data.
pub async fn load_route_filtered(
    entries: &[RouteEntry],
    context: LoadContext,
    filter: impl Fn(&LoadDescriptor, &dyn DataComponent) -> bool,
) -> BatchResult {
    let flattened = filter_and_flatten(entries);
    if flattened.is_empty() {
        return BatchResult::new();
    }
    debug!(components = flattened.len(), "running route batch");

    let mut merged = BatchResult::new();
    for component in flattened {
        let mut launched = Vec::new();
        for descriptor in component.load_descriptors() {
            if !filter(descriptor, component.as_ref()) {
                continue;
            }
            let key = descriptor.key().map(str::to_owned);
            match descriptor.run(context.clone()) {
                Loading::Ready(value) => {
                    // Synchronous values never enter the loading phase.
                    if let Some(key) = &key {
                        context.store.load_success(key, value.clone());
                    }
                    launched.push(futures::future::ready((key, Ok(value))).boxed());
                }
                Loading::Pending(fut) => {
                    if let Some(key) = &key {
                        context.store.load(key);
                    }
                    let store = context.store.clone();
                    launched.push(
                        async move {
                            let outcome = fut.await;
                            if let Some(key) = &key {
                                match &outcome {
                                    Ok(value) => store.load_success(key, value.clone()),
                                    Err(error) => store.load_fail(key, error.clone()),
                                }
                            }
                            (key, outcome)
                        }
                        .boxed(),
                    );
                }
                Loading::Nothing => {}
            }
        }

        // join_all preserves launch order, so inserting in settle order
        // keeps last-writer-wins over descriptor order.
        for (key, outcome) in join_all(launched).await {
            if let Some(key) = key {
                merged.insert(key, outcome);
            }
        }
    }
    merged
}

/// Run one full default-filter batch and then end the global load,
/// for a single non-reactive pre-render pass on the server.  No
/// staleness logic applies; there is exactly one invocation.
pub async fn load_on_server(entries: &[RouteEntry], context: LoadContext) -> BatchResult {
    let store = context.store.clone();
    let result = load_route(entries, context).await;
    store.end_global_load();
    result
}
