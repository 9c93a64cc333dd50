use std::{
    cell::RefCell,
    collections::BTreeMap,
    fmt,
    rc::Rc,
};

use serde::{ser::SerializeMap, Serialize, Serializer};
use serde_json::Value;

use crate::kvo::{KeyObservable, KeyObservers};


/// Observable property bag.
///
/// A key holds either a plain JSON value or a link to another observable object.
/// Links are what chained paths such as `owner.name` follow.
pub struct Model {
    values: RefCell<BTreeMap<String, Value>>,
    links: RefCell<BTreeMap<String, Rc<dyn KeyObservable>>>,
    observers: KeyObservers,
}

impl Model {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            values: RefCell::new(BTreeMap::new()),
            links: RefCell::new(BTreeMap::new()),
            observers: KeyObservers::new(),
        })
    }

    /// Creates a model from the fields of a JSON object. Other values yield an empty model.
    pub fn from_json(value: Value) -> Rc<Self> {
        let this = Self::new();
        if let Value::Object(map) = value {
            this.values.borrow_mut().extend(map);
        }
        this
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.borrow().get(key).cloned()
    }
    pub fn link(&self, key: &str) -> Option<Rc<dyn KeyObservable>> {
        self.links.borrow().get(key).cloned()
    }

    /// Stores `value` under `key` and notifies observers if it differs from the stored value.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        let unlinked = self.links.borrow_mut().remove(key).is_some();
        let changed = {
            let mut values = self.values.borrow_mut();
            if values.get(key) == Some(&value) {
                false
            } else {
                values.insert(key.to_string(), value);
                true
            }
        };
        if changed || unlinked {
            self.observers.notify(key);
        }
    }

    /// Stores a link to `target` under `key`.
    pub fn set_link(&self, key: &str, target: Rc<dyn KeyObservable>) {
        self.values.borrow_mut().remove(key);
        let old = self.links.borrow_mut().insert(key.to_string(), target.clone());
        if old.map_or(true, |old| !Rc::ptr_eq(&old, &target)) {
            self.observers.notify(key);
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        let removed =
            self.values.borrow_mut().remove(key).is_some() | self.links.borrow_mut().remove(key).is_some();
        if removed {
            self.observers.notify(key);
        }
        removed
    }

    /// Adds `delta` to the number stored under `key`, treating a missing value as zero.
    pub fn increment(&self, key: &str, delta: i64) -> i64 {
        let value = self.get(key).and_then(|v| v.as_i64()).unwrap_or(0) + delta;
        self.set(key, value);
        value
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.borrow().keys().cloned().collect();
        keys.extend(self.links.borrow().keys().cloned());
        keys.sort();
        keys
    }
}

impl KeyObservable for Model {
    fn key_observers(&self) -> &KeyObservers {
        &self.observers
    }
    fn observable_at(&self, key: &str) -> Option<Rc<dyn KeyObservable>> {
        self.link(key)
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        *self.values.borrow() == *other.values.borrow() && {
            let links = self.links.borrow();
            let other_links = other.links.borrow();
            links.len() == other_links.len()
                && links
                    .iter()
                    .zip(other_links.iter())
                    .all(|((k0, v0), (k1, v1))| k0 == k1 && Rc::ptr_eq(v0, v1))
        }
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_map();
        if let Ok(values) = self.values.try_borrow() {
            d.entries(values.iter());
        }
        if let Ok(links) = self.links.try_borrow() {
            d.entries(links.keys().map(|k| (k, "<link>")));
        }
        d.finish()
    }
}

impl Serialize for Model {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let values = self.values.borrow();
        let mut map = serializer.serialize_map(Some(values.len()))?;
        for (key, value) in values.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
