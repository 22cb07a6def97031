use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use serde_json::{Map, Value};
use tracing::debug;

use crate::descriptor::LoadContext;
use crate::route::{load_route, RouteEntry};
use crate::store::LoadStateStore;

/// The props describing one navigation: the active component list as
/// supplied by the route resolver, plus its opaque params bag.
#[derive(Clone)]
pub struct NavProps {
    pub entries: Arc<[RouteEntry]>,
    pub params: Map<String, Value>,
}

impl NavProps {
    pub fn new(entries: impl Into<Arc<[RouteEntry]>>, params: Map<String, Value>) -> Self {
        Self {
            entries: entries.into(),
            params,
        }
    }
}

/// Token identifying one trigger.  Compared against the guard's counter
/// when the trigger's batch settles; only the newest token may commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Generation(u64);

/// How a settled trigger was resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The trigger was still the newest one and its props were
    /// committed as renderable.
    Committed,
    /// A newer trigger started before this one settled; the props were
    /// discarded.
    Stale,
    /// The guard was deactivated before this trigger settled.
    Detached,
}

enum GuardPhase {
    Idle,
    Active,
    Detached,
}

struct GuardState {
    phase: GuardPhase,
    generation: u64,
    committed: Option<NavProps>,
}

struct GuardInner<R: 'static> {
    store: LoadStateStore,
    render: Arc<dyn Fn(&NavProps) -> R + Send + Sync>,
    state: Mutex<GuardState>,
}

/// Per-navigation coordinator.
///
/// A guard instance moves through `Idle -> Active -> Detached`, with
/// `Detached` terminal.  While active, every new set of navigation
/// props triggers a batch over the shared store; when a batch settles,
/// its props are committed as renderable only if no newer trigger has
/// started since and the guard is still active.  There is no
/// cancellation: a superseded batch keeps running and keeps writing
/// status into the store, only its commit is suppressed.
///
/// Regardless of staleness every settled trigger ends the global load,
/// so under overlapping triggers the store's flag tracks the most
/// recently settled batch.  That inaccuracy is deliberate and kept.
pub struct TransitionGuard<R: 'static> {
    inner: Arc<GuardInner<R>>,
}

impl<R: 'static> Clone for TransitionGuard<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// An in-flight trigger: the generation token handed out when it
/// started, and the batch future to drive.  Resolves to the trigger's
/// [`CommitOutcome`].
pub struct TriggerHandle {
    generation: Generation,
    batch: BoxFuture<'static, CommitOutcome>,
}

impl TriggerHandle {
    pub fn generation(&self) -> Generation {
        self.generation
    }
}

impl Future for TriggerHandle {
    type Output = CommitOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().batch.as_mut().poll(cx)
    }
}

impl<R: 'static> TransitionGuard<R> {
    pub fn new(
        store: LoadStateStore,
        render: impl Fn(&NavProps) -> R + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(GuardInner {
                store,
                render: Arc::new(render),
                state: Mutex::new(GuardState {
                    phase: GuardPhase::Idle,
                    generation: 0,
                    committed: None,
                }),
            }),
        }
    }

    /// Attach the guard to a live rendering context.
    ///
    /// If the store already reports a fully loaded state (data was
    /// precomputed before activation, e.g. on the server), the props
    /// are committed right away and no load is triggered.  Otherwise a
    /// trigger is started and its handle returned for the host to
    /// drive.  Activating a guard that is not idle does nothing.
    pub fn activate(&self, props: NavProps) -> Option<TriggerHandle> {
        {
            let mut state = self.inner.state.lock().unwrap();
            match state.phase {
                GuardPhase::Idle => state.phase = GuardPhase::Active,
                _ => return None,
            }
        }
        if self.inner.store.loaded() {
            debug!("store already loaded at activation, committing without a trigger");
            self.inner.state.lock().unwrap().committed = Some(props);
            None
        } else {
            Some(self.start_trigger(props))
        }
    }

    /// Handle a new set of navigation props.  Always triggers a fresh
    /// load while active, regardless of prior in-flight triggers; there
    /// is no same-props skip.  Returns `None` when the guard is not
    /// active.
    pub fn update(&self, props: NavProps) -> Option<TriggerHandle> {
        {
            let state = self.inner.state.lock().unwrap();
            if !matches!(state.phase, GuardPhase::Active) {
                return None;
            }
        }
        Some(self.start_trigger(props))
    }

    /// Detach the guard.  Terminal: in-flight triggers still settle and
    /// still end the global load, but none of them may commit anymore.
    pub fn deactivate(&self) {
        let mut state = self.inner.state.lock().unwrap();
        state.phase = GuardPhase::Detached;
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self.inner.state.lock().unwrap().phase,
            GuardPhase::Active
        )
    }

    /// The newest generation token handed out so far.
    pub fn current_generation(&self) -> Generation {
        Generation(self.inner.state.lock().unwrap().generation)
    }

    /// The committed props, once a trigger has committed.
    pub fn committed(&self) -> Option<NavProps> {
        self.inner.state.lock().unwrap().committed.clone()
    }

    /// Render the committed props, or nothing if no trigger has
    /// committed yet.  What "nothing" looks like is the host's call.
    pub fn rendered(&self) -> Option<R> {
        let committed = self.committed()?;
        Some((self.inner.render)(&committed))
    }

    /// Commit `props` for the trigger identified by `generation`, if it
    /// is still the newest one and the guard is still active.
    pub fn try_commit(&self, generation: Generation, props: NavProps) -> CommitOutcome {
        let mut state = self.inner.state.lock().unwrap();
        if !matches!(state.phase, GuardPhase::Active) {
            debug!(generation = generation.0, "suppressing commit, guard detached");
            CommitOutcome::Detached
        } else if state.generation != generation.0 {
            debug!(
                generation = generation.0,
                current = state.generation,
                "suppressing commit, trigger superseded"
            );
            CommitOutcome::Stale
        } else {
            state.committed = Some(props);
            CommitOutcome::Committed
        }
    }

    fn start_trigger(&self, props: NavProps) -> TriggerHandle {
        let generation = {
            let mut state = self.inner.state.lock().unwrap();
            state.generation += 1;
            Generation(state.generation)
        };
        debug!(generation = generation.0, "starting load trigger");
        self.inner.store.begin_global_load();

        let guard = self.clone();
        let batch = Box::pin(async move {
            let context =
                LoadContext::new(props.params.clone(), guard.inner.store.clone());
            let _results = load_route(&props.entries, context).await;
            let outcome = guard.try_commit(generation, props);
            // Unconditional, even for stale or detached triggers.
            guard.inner.store.end_global_load();
            outcome
        });
        TriggerHandle { generation, batch }
    }
}
