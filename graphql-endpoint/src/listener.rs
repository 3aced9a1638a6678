//! Request lifecycle listeners.
//!
//! A listener is notified when a request arrives and may hand back a set of
//! callbacks for that request's success/error/finally phases. Listeners run
//! in registration order, and a fault in one never disturbs its siblings or
//! the request pipeline itself.

use std::sync::Arc;

use http::request::Parts;
use parking_lot::RwLock;
use tower::BoxError;

use crate::services::endpoint::Body;

/// Host-application hook notified at the start of every request.
pub trait RequestListener: Send + Sync {
    /// Called once per request, in registration order, before the pipeline
    /// runs.
    ///
    /// Return callbacks to observe the rest of this request's lifecycle, or
    /// `None` to observe nothing. An `Err` is logged and contained: the
    /// faulting listener simply contributes no callbacks.
    fn on_request(&self, request: &Parts) -> Result<Option<Box<dyn RequestCallbacks>>, BoxError>;
}

/// Per-request callbacks returned by [`RequestListener::on_request`].
///
/// Lifetime is exactly one request. Each hook's `Err` is logged and
/// contained; sibling callbacks still run.
pub trait RequestCallbacks: Send + Sync {
    /// The pipeline completed and produced `response` (any status).
    fn on_success(&self, _response: &http::Response<Body>) -> Result<(), BoxError> {
        Ok(())
    }

    /// The pipeline raised an unhandled fault; the client gets a 500.
    fn on_error(&self, _fault: &BoxError) -> Result<(), BoxError> {
        Ok(())
    }

    /// Always runs, after `on_success` or `on_error`.
    fn on_finally(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// An ordered, shareable collection of [`RequestListener`]s.
///
/// Mutation happens only through [`add`][Self::add] and
/// [`remove`][Self::remove]; request handling takes a snapshot and never
/// holds the lock across listener code.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    listeners: Arc<RwLock<Vec<Arc<dyn RequestListener>>>>,
}

impl ListenerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener; it will be notified after all previously added
    /// listeners.
    pub fn add(&self, listener: Arc<dyn RequestListener>) {
        self.listeners.write().push(listener);
    }

    /// Remove the first registered occurrence of exactly this listener.
    /// Returns whether anything was removed.
    pub fn remove(&self, listener: &Arc<dyn RequestListener>) -> bool {
        let mut listeners = self.listeners.write();
        match listeners.iter().position(|l| Arc::ptr_eq(l, listener)) {
            Some(index) => {
                listeners.remove(index);
                true
            }
            None => false,
        }
    }

    /// The registered listeners, in registration order.
    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn RequestListener>> {
        self.listeners.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;
    impl RequestListener for Noop {
        fn on_request(
            &self,
            _request: &Parts,
        ) -> Result<Option<Box<dyn RequestCallbacks>>, BoxError> {
            Ok(None)
        }
    }

    #[test]
    fn add_and_remove_by_identity() {
        let registry = ListenerRegistry::new();
        let first: Arc<dyn RequestListener> = Arc::new(Noop);
        let second: Arc<dyn RequestListener> = Arc::new(Noop);

        registry.add(first.clone());
        registry.add(second.clone());
        assert_eq!(registry.snapshot().len(), 2);

        assert!(registry.remove(&first));
        assert!(!registry.remove(&first), "already removed");

        let remaining = registry.snapshot();
        assert_eq!(remaining.len(), 1);
        assert!(Arc::ptr_eq(&remaining[0], &second));
    }
}
