use std::fmt;

type CancelFn = Box<dyn FnOnce() + Send>;

/// A live backend stream bound to a cancel function.
///
/// Cancelling is idempotent, and dropping a subscription cancels it.
pub struct Subscription {
    name: &'static str,
    cancel: Option<CancelFn>,
}

impl Subscription {
    pub fn new<F>(name: &'static str, cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            name,
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to tear down.
    pub fn noop(name: &'static str) -> Self {
        Self { name, cancel: None }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_none()
    }

    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            tracing::debug!(subscription = self.name, "Cancelling subscription");
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("name", &self.name)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
