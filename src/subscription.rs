use std::mem::take;


/// Keeps an observation alive; dropping it stops observing.
#[derive(Default)]
#[must_use]
pub struct Subscription(RawSubscription);

impl Subscription {
    pub fn empty() -> Self {
        Subscription(RawSubscription::Empty)
    }
    pub fn from_fn(f: impl FnOnce() + 'static) -> Self {
        Subscription(RawSubscription::Fn(Box::new(f)))
    }

    /// Stops observing now.
    pub fn unsubscribe(self) {}

    /// Keeps observing for as long as the observed objects live.
    pub fn detach(mut self) {
        self.0 = RawSubscription::Empty;
    }
}
impl Drop for Subscription {
    fn drop(&mut self) {
        match take(&mut self.0) {
            RawSubscription::Empty => {}
            RawSubscription::Fn(f) => f(),
        }
    }
}

#[derive(Default)]
enum RawSubscription {
    #[default]
    Empty,
    Fn(Box<dyn FnOnce() + 'static>),
}
