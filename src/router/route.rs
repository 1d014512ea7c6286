//! Route registration types.

use std::fmt;
use std::sync::Arc;

/// Predicate deciding whether a route accepts an event.
pub type Filter<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Stable name of a handler function: its fully-qualified Rust path.
///
/// Fn items yield paths such as `my_bot::flows::ask_age`. Closures yield
/// paths ending in `{{closure}}` that change when code moves, so routes
/// over closures should name their state explicitly.
pub fn handler_name<F>() -> &'static str {
    std::any::type_name::<F>()
}

/// Which stored state a route answers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateMatch {
    /// Addresses with no state (never set, or cleared to null).
    Default,
    /// Addresses whose state equals the label.
    Exact(String),
    /// Any state, including the default.
    Any,
}

impl StateMatch {
    /// Whether this match selects `state` without falling back to `Any`.
    pub(crate) fn matches_exactly(&self, state: Option<&str>) -> bool {
        match (self, state) {
            (Self::Default, None) => true,
            (Self::Exact(label), Some(state)) => label == state,
            _ => false,
        }
    }
}

/// Options for [`StateRouter::register`](super::StateRouter::register).
pub struct RouteOptions<E> {
    pub(crate) state: Option<String>,
    pub(crate) filter: Option<Filter<E>>,
    pub(crate) primary: bool,
    pub(crate) any_state: bool,
}

impl<E> Default for RouteOptions<E> {
    fn default() -> Self {
        Self {
            state: None,
            filter: None,
            primary: false,
            any_state: false,
        }
    }
}

impl<E> RouteOptions<E> {
    /// Route under the handler's own name, for every event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the state explicitly instead of using the handler's path.
    #[must_use]
    pub fn state(mut self, label: impl Into<String>) -> Self {
        self.state = Some(label.into());
        self
    }

    /// Only accept events passing `filter`.
    #[must_use]
    pub fn filter<P>(mut self, filter: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Also answer addresses with no state.
    #[must_use]
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Answer every state. Exact routes are still preferred.
    #[must_use]
    pub fn any_state(mut self) -> Self {
        self.any_state = true;
        self
    }
}

/// Handle returned by registration, identifying the route's state label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerHandle {
    label: Arc<str>,
}

impl HandlerHandle {
    pub(crate) fn new(label: &str) -> Self {
        Self { label: label.into() }
    }

    /// The state label this handler is registered under.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Display for HandlerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn sample_handler() {}

    #[test]
    fn test_handler_name_is_fully_qualified() {
        fn name_of<F>(_: F) -> &'static str {
            handler_name::<F>()
        }
        let name = name_of(sample_handler);
        assert!(name.ends_with("router::route::tests::sample_handler"), "{name}");
    }

    #[test]
    fn test_state_match() {
        assert!(StateMatch::Default.matches_exactly(None));
        assert!(!StateMatch::Default.matches_exactly(Some("a")));
        assert!(StateMatch::Exact("a".into()).matches_exactly(Some("a")));
        assert!(!StateMatch::Exact("a".into()).matches_exactly(None));
        assert!(!StateMatch::Any.matches_exactly(Some("a")));
    }
}
