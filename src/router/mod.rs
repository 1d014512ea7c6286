//! State routing.
//!
//! A [`StateRouter`] holds handlers registered under state labels. For
//! each event it resolves the event's [`Address`], reads the stored state,
//! runs the first route registered for that state whose filter accepts
//! the event, and persists the [`Transition`] the handler returns.
//!
//! Route selection, in order:
//! 1. routes for the exact stored state (the default state when none is
//!    stored), in registration order;
//! 2. routes registered for any state, in registration order.
//!
//! Transitions for one address are not serialized. Two events for the
//! same address dispatched concurrently both see the state stored before
//! either finished, and the later `set_state` wins.

mod context;
mod route;

use std::any::TypeId;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, warn};

pub use context::{DispatchOutcome, ErrorContext, StateContext, Transition};
pub use route::{handler_name, Filter, HandlerHandle, RouteOptions, StateMatch};

use crate::storage::{self, Address, Addressed, StateStorage};

type HandlerFn<E> =
    Arc<dyn Fn(StateContext<E>) -> BoxFuture<'static, anyhow::Result<Transition>> + Send + Sync>;
type ErrorHookFn<E> =
    Arc<dyn Fn(ErrorContext<E>) -> BoxFuture<'static, anyhow::Result<bool>> + Send + Sync>;

struct Route<E> {
    handle: HandlerHandle,
    /// Handler type, for labels inferred from it.
    inferred_from: Option<TypeId>,
    states: Vec<StateMatch>,
    filter: Option<Filter<E>>,
    handler: HandlerFn<E>,
}

impl<E> Route<E> {
    fn accepts(&self, event: &E) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter(event))
    }
}

/// Registry of state-scoped handlers for one event type.
pub struct StateRouter<E> {
    storage: Arc<dyn StateStorage>,
    routes: Vec<Route<E>>,
    error_hooks: Vec<ErrorHookFn<E>>,
}

impl<E> StateRouter<E>
where
    E: Addressed + Send + Sync + 'static,
{
    pub fn new(storage: Arc<dyn StateStorage>) -> Self {
        Self {
            storage,
            routes: Vec::new(),
            error_hooks: Vec::new(),
        }
    }

    pub fn storage(&self) -> &Arc<dyn StateStorage> {
        &self.storage
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Register `handler` and return the handle naming its state.
    ///
    /// Without an explicit `state`, the label is the handler's
    /// fully-qualified path (see [`handler_name`]). The handler may return
    /// anything convertible to a [`Transition`]: `()` keeps the state, a
    /// string switches to that label.
    pub fn register<F, Fut, T>(&mut self, options: RouteOptions<E>, handler: F) -> HandlerHandle
    where
        F: Fn(StateContext<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Into<Transition> + Send + 'static,
    {
        let inferred_from = options.state.is_none().then(TypeId::of::<F>);
        let label = options
            .state
            .unwrap_or_else(|| handler_name::<F>().to_string());
        let handle = HandlerHandle::new(&label);

        if let Some(type_id) = inferred_from {
            if self.label_taken_by_other(&label, type_id) {
                warn!(
                    "Handler label {} is already used by another handler; \
                     name the state explicitly with RouteOptions::state",
                    label
                );
            }
        }

        let states = if options.any_state {
            vec![StateMatch::Any]
        } else if options.primary {
            vec![StateMatch::Exact(label), StateMatch::Default]
        } else {
            vec![StateMatch::Exact(label)]
        };

        let handler: HandlerFn<E> = Arc::new(move |ctx| {
            let fut = handler(ctx);
            async move { fut.await.map(Into::into) }.boxed()
        });

        debug!("Registered handler {} for {:?}", handle, states);
        self.routes.push(Route {
            handle: handle.clone(),
            inferred_from,
            states,
            filter: options.filter,
            handler,
        });

        handle
    }

    /// Whether a route with a label inferred from a handler type other
    /// than `type_id` already uses `label`. Closures defined in the same
    /// function share one path, so their inferred labels collide.
    fn label_taken_by_other(&self, label: &str, type_id: TypeId) -> bool {
        self.routes.iter().any(|route| {
            route.handle.label() == label
                && route.inferred_from.is_some_and(|other| other != type_id)
        })
    }

    /// Register a hook run when a handler fails.
    ///
    /// Hooks run in registration order regardless of the address's state.
    /// The first hook returning `Ok(true)` marks the error handled;
    /// otherwise the handler's error is returned from
    /// [`dispatch`](Self::dispatch).
    pub fn on_error<F, Fut>(&mut self, hook: F)
    where
        F: Fn(ErrorContext<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        self.error_hooks.push(Arc::new(move |ctx| hook(ctx).boxed()));
    }

    /// Route one event.
    ///
    /// # Errors
    /// Fails when the event has no valid address, when the handler fails
    /// and no error hook handles it, or when persisting the new state
    /// fails. Side effects of the handler are not rolled back.
    pub async fn dispatch(&self, event: E) -> anyhow::Result<DispatchOutcome> {
        let address = event.address()?;
        let state = self.current_state(address).await;

        let Some(route) = self.select(state.as_deref(), &event) else {
            debug!("No handler for {} in state {:?}", address, state);
            return Ok(DispatchOutcome::Unhandled);
        };

        let label = route.handle.label().to_string();
        debug!("Dispatching {} in state {:?} to {}", address, state, label);

        let event = Arc::new(event);
        let ctx = StateContext::new(event.clone(), address, state, self.storage.clone());

        match (route.handler)(ctx).await {
            Ok(transition) => {
                let next_state = self.apply(address, transition).await?;
                Ok(DispatchOutcome::Handled {
                    handler: label,
                    next_state,
                })
            }
            Err(error) => self.handle_error(event, address, label, error).await,
        }
    }

    /// Stored state of `address`. A failed lookup degrades to the default.
    async fn current_state(&self, address: Address) -> Option<String> {
        match self.storage.get_state(address, None).await {
            Ok(state) => state,
            Err(e) => {
                warn!("State lookup for {} failed, using default state: {}", address, e);
                None
            }
        }
    }

    fn select(&self, state: Option<&str>, event: &E) -> Option<&Route<E>> {
        self.routes
            .iter()
            .filter(|route| route.states.iter().any(|s| s.matches_exactly(state)))
            .find(|route| route.accepts(event))
            .or_else(|| {
                self.routes
                    .iter()
                    .filter(|route| route.states.contains(&StateMatch::Any))
                    .find(|route| route.accepts(event))
            })
    }

    async fn apply(
        &self,
        address: Address,
        transition: Transition,
    ) -> storage::Result<Option<Option<String>>> {
        match transition {
            Transition::Stay => Ok(None),
            Transition::To(label) => {
                self.storage.set_state(address, Some(&label)).await?;
                Ok(Some(Some(label)))
            }
            Transition::Reset => {
                self.storage.set_state(address, None).await?;
                Ok(Some(None))
            }
        }
    }

    async fn handle_error(
        &self,
        event: Arc<E>,
        address: Address,
        handler: String,
        error: anyhow::Error,
    ) -> anyhow::Result<DispatchOutcome> {
        if self.error_hooks.is_empty() {
            return Err(error);
        }

        let error = Arc::new(error);
        for hook in &self.error_hooks {
            let ctx = ErrorContext {
                event: event.clone(),
                address,
                handler: handler.clone(),
                error: error.clone(),
            };

            match hook(ctx).await {
                Ok(true) => return Ok(DispatchOutcome::ErrorHandled { handler }),
                Ok(false) => {}
                Err(e) => warn!("Error hook for {} failed: {:#}", handler, e),
            }
        }

        Err(Arc::try_unwrap(error).unwrap_or_else(|shared| anyhow::anyhow!("{shared:#}")))
    }
}
