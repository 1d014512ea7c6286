//! Values passed to and returned from handlers.

use std::sync::Arc;

use super::route::{handler_name, HandlerHandle};
use crate::storage::{self, Address, Bag, StateStorage};

/// What a handler receives for one event.
pub struct StateContext<E> {
    pub event: Arc<E>,
    pub address: Address,
    /// State the route was selected for.
    pub state: Option<String>,
    storage: Arc<dyn StateStorage>,
}

impl<E> StateContext<E> {
    pub(crate) fn new(
        event: Arc<E>,
        address: Address,
        state: Option<String>,
        storage: Arc<dyn StateStorage>,
    ) -> Self {
        Self {
            event,
            address,
            state,
            storage,
        }
    }

    pub fn storage(&self) -> &Arc<dyn StateStorage> {
        &self.storage
    }

    /// Data bag of this address, empty when none was stored.
    pub async fn data(&self) -> storage::Result<Bag> {
        self.storage.get_data(self.address, Bag::new()).await
    }

    pub async fn set_data(&self, data: Bag) -> storage::Result<()> {
        self.storage.set_data(self.address, data).await
    }

    pub async fn bucket(&self) -> storage::Result<Bag> {
        self.storage.get_bucket(self.address, Bag::new()).await
    }

    /// Clear state and data of this address.
    pub async fn finish(&self) -> storage::Result<()> {
        self.storage.finish(self.address).await
    }
}

/// What an error hook receives when a handler fails.
pub struct ErrorContext<E> {
    pub event: Arc<E>,
    pub address: Address,
    /// Label of the handler that failed.
    pub handler: String,
    pub error: Arc<anyhow::Error>,
}

/// State change requested by a handler.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Transition {
    /// Keep the current state.
    #[default]
    Stay,
    /// Switch to the given state label.
    To(String),
    /// Clear the state back to the default.
    Reset,
}

impl Transition {
    pub fn to(label: impl Into<String>) -> Self {
        Self::To(label.into())
    }

    /// Switch to the state of a handler registered under its own name.
    pub fn to_handler<F>(_handler: F) -> Self {
        Self::To(handler_name::<F>().to_string())
    }
}

impl From<&HandlerHandle> for Transition {
    fn from(handle: &HandlerHandle) -> Self {
        Self::To(handle.label().to_string())
    }
}

impl From<&str> for Transition {
    fn from(label: &str) -> Self {
        Self::To(label.to_string())
    }
}

impl From<String> for Transition {
    fn from(label: String) -> Self {
        Self::To(label)
    }
}

impl From<()> for Transition {
    fn from(_: ()) -> Self {
        Self::Stay
    }
}

/// Result of dispatching one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A handler ran. `next_state` is the persisted change, if any:
    /// `Some(None)` means the state was cleared.
    Handled {
        handler: String,
        next_state: Option<Option<String>>,
    },
    /// A handler failed and an error hook reported the error handled.
    ErrorHandled { handler: String },
    /// No route matched the event in its current state.
    Unhandled,
}
