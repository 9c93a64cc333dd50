use std::{
    cell::RefCell,
    collections::HashMap,
    rc::{Rc, Weak},
};

use crate::{
    chain_observer::{ChainId, ChainObserver},
    core::{next_id, notify_property},
    observer_set::{ObserverKey, ObserverSet},
};


/// Observers registered under this key are notified of every key.
pub const ANY_KEY: &str = "*";

/// Key notified when the membership of an array changes.
pub const CONTENT_KEY: &str = "[]";

/// Key notified when the length of an array changes.
pub const LENGTH_KEY: &str = "length";

/// Path segment that propagates the rest of a chain to each member of an array.
pub const EACH_KEY: &str = "@each";

pub type PropertyObserver = dyn Fn(&str);

/// An object whose keys can be observed.
pub trait KeyObservable: 'static {
    fn key_observers(&self) -> &KeyObservers;

    /// The observable object stored under `key`, used to follow chained paths.
    fn observable_at(&self, key: &str) -> Option<Rc<dyn KeyObservable>> {
        let _ = key;
        None
    }

    /// Propagates the chain after an `@each` segment to each member.
    ///
    /// Returns `false` if this object has no members.
    fn add_content_observer(&self, chain: &Rc<ChainObserver>) -> bool {
        let _ = chain;
        false
    }
    fn remove_content_observer(&self, chain: &Rc<ChainObserver>) {
        let _ = chain;
    }
}

/// Per-object observer table.
///
/// Besides plain key observers it holds the chain observer clones that arrays attach
/// to their members, so that they can be found and removed when the member leaves.
#[derive(Clone)]
pub struct KeyObservers(Rc<RawKeyObservers>);

impl KeyObservers {
    pub fn new() -> Self {
        Self(Rc::new(RawKeyObservers {
            id: next_id(),
            observers: RefCell::new(HashMap::new()),
            content_observers: RefCell::new(HashMap::new()),
            property_clones: RefCell::new(HashMap::new()),
        }))
    }

    pub fn add_observer(&self, key: &str, observer: Rc<PropertyObserver>) -> ObserverKey {
        self.0
            .observers
            .borrow_mut()
            .entry(key.to_string())
            .or_default()
            .insert(observer)
    }
    pub fn remove_observer(&self, key: &str, observer: ObserverKey) -> bool {
        let mut observers = self.0.observers.borrow_mut();
        let Some(set) = observers.get_mut(key) else {
            return false;
        };
        let removed = set.remove(observer).is_some();
        if set.is_empty() {
            observers.remove(key);
        }
        removed
    }
    pub fn observer_count(&self, key: &str) -> usize {
        self.0.observers.borrow().get(key).map_or(0, |s| s.len())
    }
    pub fn has_observers(&self) -> bool {
        !self.0.observers.borrow().is_empty()
    }
    pub fn clear(&self) {
        self.0.observers.borrow_mut().clear();
    }

    /// Notifies the observers of `key`.
    ///
    /// Inside a batch scope the notification is delivered once when the scope ends.
    pub fn notify(&self, key: &str) {
        notify_property(self.downgrade(), self.0.id, key);
    }

    pub(crate) fn notify_now(&self, key: &str) {
        let mut targets = Vec::new();
        {
            let observers = self.0.observers.borrow();
            if let Some(set) = observers.get(key) {
                targets.extend(set.to_vec());
            }
            if key != ANY_KEY {
                if let Some(set) = observers.get(ANY_KEY) {
                    targets.extend(set.to_vec());
                }
            }
        }
        for f in targets {
            f(key);
        }
    }

    pub(crate) fn downgrade(&self) -> WeakKeyObservers {
        WeakKeyObservers(Rc::downgrade(&self.0))
    }
    pub(crate) fn id(&self) -> usize {
        self.0.id
    }

    pub(crate) fn push_content_observer(&self, chain: Rc<ChainObserver>) {
        self.0
            .content_observers
            .borrow_mut()
            .entry(chain.property().to_string())
            .or_default()
            .push(chain);
    }
    pub(crate) fn take_content_observer(&self, key: &str, id: ChainId) -> Option<Rc<ChainObserver>> {
        let mut table = self.0.content_observers.borrow_mut();
        let list = table.get_mut(key)?;
        let index = list.iter().position(|c| c.chain_id() == id)?;
        let chain = list.remove(index);
        if list.is_empty() {
            table.remove(key);
        }
        Some(chain)
    }
    pub fn content_observer_count(&self, key: &str) -> usize {
        self.0
            .content_observers
            .borrow()
            .get(key)
            .map_or(0, |l| l.len())
    }

    pub(crate) fn push_property_clone(&self, chain: Rc<ChainObserver>) {
        self.0
            .property_clones
            .borrow_mut()
            .entry(chain.chain_id())
            .or_default()
            .push(chain);
    }
    pub(crate) fn take_property_clone(&self, id: ChainId) -> Option<Rc<ChainObserver>> {
        let mut table = self.0.property_clones.borrow_mut();
        let list = table.get_mut(&id)?;
        let chain = list.pop();
        if list.is_empty() {
            table.remove(&id);
        }
        chain
    }
    pub fn property_clone_count(&self) -> usize {
        self.0.property_clones.borrow().values().map(|l| l.len()).sum()
    }
}
impl Default for KeyObservers {
    fn default() -> Self {
        Self::new()
    }
}

struct RawKeyObservers {
    id: usize,
    observers: RefCell<HashMap<String, ObserverSet<PropertyObserver>>>,
    content_observers: RefCell<HashMap<String, Vec<Rc<ChainObserver>>>>,
    property_clones: RefCell<HashMap<ChainId, Vec<Rc<ChainObserver>>>>,
}

#[derive(Clone)]
pub(crate) struct WeakKeyObservers(Weak<RawKeyObservers>);

impl WeakKeyObservers {
    pub fn upgrade(&self) -> Option<KeyObservers> {
        self.0.upgrade().map(KeyObservers)
    }
}

pub(crate) fn identity_of(observable: &Rc<dyn KeyObservable>) -> usize {
    Rc::as_ptr(observable) as *const () as usize
}
