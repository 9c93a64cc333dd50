use std::rc::Rc;

use slabmap::SlabMap;

#[cfg(test)]
mod tests;

/// Opaque handle returned when an observer is registered.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ObserverKey(usize);

/// An unordered bag of observers.
///
/// Observers are compared by `Rc` identity, so registering the same observer twice
/// yields the same key.
pub struct ObserverSet<F: ?Sized>(SlabMap<Rc<F>>);

impl<F: ?Sized> ObserverSet<F> {
    pub fn new() -> Self {
        Self(SlabMap::new())
    }
    pub fn insert(&mut self, observer: Rc<F>) -> ObserverKey {
        if let Some(key) = self.find(&observer) {
            return key;
        }
        ObserverKey(self.0.insert(observer))
    }
    pub fn find(&self, observer: &Rc<F>) -> Option<ObserverKey> {
        self.0
            .iter()
            .find(|(_, o)| Rc::ptr_eq(o, observer))
            .map(|(key, _)| ObserverKey(key))
    }
    pub fn remove(&mut self, key: ObserverKey) -> Option<Rc<F>> {
        self.0.remove(key.0)
    }
    pub fn remove_rc(&mut self, observer: &Rc<F>) -> bool {
        match self.find(observer) {
            Some(key) => self.remove(key).is_some(),
            None => false,
        }
    }
    pub fn contains(&self, key: ObserverKey) -> bool {
        self.0.get(key.0).is_some()
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn clear(&mut self) {
        self.0 = SlabMap::new();
    }

    /// Copies the current members so that they can be invoked while the set is mutated.
    pub fn to_vec(&self) -> Vec<Rc<F>> {
        self.0.values().cloned().collect()
    }
}
impl<F: ?Sized> Default for ObserverSet<F> {
    fn default() -> Self {
        Self::new()
    }
}
