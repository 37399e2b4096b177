use std::mem::take;

#[cfg(test)]
mod tests;

/// Handle to a registered callback. The callback is unregistered when this is dropped.
#[derive(Default)]
#[must_use]
pub struct Subscription(Option<Box<dyn FnOnce() + 'static>>);

impl Subscription {
    pub fn empty() -> Self {
        Subscription(None)
    }
    pub fn from_fn(unsubscribe: impl FnOnce() + 'static) -> Self {
        Subscription(Some(Box::new(unsubscribe)))
    }

    /// Keeps the callback registered for the lifetime of its owner.
    pub fn detach(mut self) {
        self.0 = None;
    }
}
impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = take(&mut self.0) {
            f()
        }
    }
}
