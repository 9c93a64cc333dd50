use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::{Rc, Weak},
};

use tracing::{debug, trace};

use crate::{
    array::{ObservableArray, RawArray},
    index_set::IndexSet,
    item::Item,
    kvo::{identity_of, KeyObservable, ANY_KEY, CONTENT_KEY},
    observer_set::ObserverKey,
};


pub type RangeCallback<T> = dyn Fn(&ObservableArray<T>, RangeChange<'_, T>);

/// Argument of a range observer callback.
#[derive(Debug)]
pub struct RangeChange<'a, T> {
    /// Elements now at `indexes`, or `None` if none of them is inside the array anymore.
    pub objects: Option<Vec<T>>,

    /// `[]` when membership changed, otherwise the member property that changed.
    pub key: &'a str,

    /// The observed indexes the change applies to.
    pub indexes: &'a IndexSet,
}

/// Observes a set of indexes of an [`ObservableArray`].
///
/// The callback is called when the array reports a change that intersects the observed
/// indexes. A deep observer also observes every property of each element inside the
/// observed indexes.
///
/// The observer does not keep the array alive.
pub struct RangeObserver<T: 'static> {
    array: Weak<RawArray<T>>,
    indexes: RefCell<IndexSet>,
    callback: Rc<RangeCallback<T>>,
    is_deep: bool,
    is_destroyed: Cell<bool>,
    members: RefCell<HashMap<usize, DeepMember>>,
    this: Weak<Self>,
}

struct DeepMember {
    object: Weak<dyn KeyObservable>,
    key: ObserverKey,
}

impl<T: Item> RangeObserver<T> {
    /// Creates an observer that is not registered with the array.
    ///
    /// It only receives changes that are passed to
    /// [`range_did_change`](Self::range_did_change), and deep property changes.
    pub fn create(
        array: &ObservableArray<T>,
        indexes: IndexSet,
        f: impl Fn(&ObservableArray<T>, RangeChange<T>) + 'static,
        is_deep: bool,
    ) -> Rc<Self> {
        Self::create_dyn(array, indexes, Rc::new(f), is_deep)
    }
    pub(crate) fn create_dyn(
        array: &ObservableArray<T>,
        indexes: IndexSet,
        callback: Rc<RangeCallback<T>>,
        is_deep: bool,
    ) -> Rc<Self> {
        let this = Rc::new_cyclic(|this| Self {
            array: array.downgrade(),
            indexes: RefCell::new(indexes),
            callback,
            is_deep,
            is_destroyed: Cell::new(false),
            members: RefCell::new(HashMap::new()),
            this: this.clone(),
        });
        if is_deep {
            this.sync_members(array);
        }
        this
    }

    pub fn indexes(&self) -> IndexSet {
        self.indexes.borrow().clone()
    }
    pub fn is_deep(&self) -> bool {
        self.is_deep
    }

    /// Number of elements whose properties are observed.
    pub fn member_count(&self) -> usize {
        self.members.borrow().len()
    }

    fn array(&self) -> Option<ObservableArray<T>> {
        if self.is_destroyed.get() {
            return None;
        }
        self.array.upgrade().map(ObservableArray::from_raw)
    }

    /// Observes `indexes` instead.
    ///
    /// A deep observer stops observing elements that leave the observed indexes and
    /// starts observing elements that enter them; the rest keep their registration.
    pub fn update(&self, indexes: IndexSet) {
        *self.indexes.borrow_mut() = indexes;
        if self.is_deep {
            if let Some(array) = self.array() {
                self.sync_members(&array);
            }
        }
    }

    /// Called with the indexes of the array that changed.
    ///
    /// The callback is only called if `changes` intersects the observed indexes.
    pub fn range_did_change(&self, changes: &IndexSet) {
        let Some(array) = self.array() else {
            return;
        };
        let hit = self.indexes.borrow().intersection(changes);
        if hit.is_empty() {
            return;
        }
        if self.is_deep {
            self.sync_members(&array);
        }
        let objects: Vec<T> = hit.iter().filter_map(|i| array.object_at(i)).collect();
        let objects = if objects.is_empty() {
            None
        } else {
            Some(objects)
        };
        trace!(indexes = %hit, "range did change");
        (self.callback)(
            &array,
            RangeChange {
                objects,
                key: CONTENT_KEY,
                indexes: &hit,
            },
        );
    }

    fn object_property_did_change(&self, object: &Rc<dyn KeyObservable>, key: &str) {
        let Some(array) = self.array() else {
            return;
        };
        let id = identity_of(object);
        let mut hit = IndexSet::new();
        let mut objects = Vec::new();
        let indexes = self.indexes();
        for i in indexes.iter() {
            let Some(item) = array.object_at(i) else {
                break;
            };
            if item.as_observable().is_some_and(|o| identity_of(&o) == id) {
                hit.add_index(i);
                objects.push(item);
            }
        }
        if hit.is_empty() {
            return;
        }
        (self.callback)(
            &array,
            RangeChange {
                objects: Some(objects),
                key,
                indexes: &hit,
            },
        );
    }

    fn sync_members(&self, array: &ObservableArray<T>) {
        let mut desired = HashMap::new();
        for i in self.indexes.borrow().iter() {
            let Some(item) = array.object_at(i) else {
                break;
            };
            if let Some(o) = item.as_observable() {
                desired.entry(identity_of(&o)).or_insert(o);
            }
        }
        let mut members = self.members.borrow_mut();
        members.retain(|id, member| {
            if desired.remove(id).is_some() {
                return true;
            }
            if let Some(object) = member.object.upgrade() {
                object.key_observers().remove_observer(ANY_KEY, member.key);
            }
            false
        });
        for (id, object) in desired {
            let this = self.this.clone();
            let weak_object = Rc::downgrade(&object);
            let key = object.key_observers().add_observer(
                ANY_KEY,
                Rc::new(move |key: &str| {
                    if let (Some(this), Some(object)) = (this.upgrade(), weak_object.upgrade()) {
                        this.object_property_did_change(&object, key);
                    }
                }),
            );
            members.insert(
                id,
                DeepMember {
                    object: Rc::downgrade(&object),
                    key,
                },
            );
        }
    }

    /// Stops observing. Deep registrations on elements are removed.
    pub fn destroy(&self) {
        if self.is_destroyed.replace(true) {
            return;
        }
        let members = std::mem::take(&mut *self.members.borrow_mut());
        for member in members.into_values() {
            if let Some(object) = member.object.upgrade() {
                object.key_observers().remove_observer(ANY_KEY, member.key);
            }
        }
        debug!("range observer destroyed");
    }
}
