use std::{
    cell::RefCell,
    fmt,
    iter::once,
    mem::{replace, take},
    ops::{Range, RangeBounds},
    rc::{Rc, Weak},
};

use derive_ex::Ex;
use parse_display::Display;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use slabmap::SlabMap;
use tracing::{debug, trace};

use crate::{
    chain_observer::{observe_path, ChainObserver},
    core::{schedule_flush, BatchGuard, Flush},
    index_set::{IndexSet, InvalidRangeError},
    item::Item,
    kvo::{KeyObservable, KeyObservers, CONTENT_KEY, LENGTH_KEY},
    observer_set::{ObserverKey, ObserverSet},
    range_observer::{RangeChange, RangeObserver},
    subscription::Subscription,
    utils::to_range,
};

pub use content::{ArrayContent, ReplaceContent};

mod content;


/// One splice: `removed` elements starting at `start` were replaced by `added` elements.
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[display("({start}, {removed}, {added})")]
pub struct ArrayChange {
    pub start: usize,
    pub removed: usize,
    pub added: usize,
}

impl ArrayChange {
    pub fn new(start: usize, removed: usize, added: usize) -> Self {
        Self {
            start,
            removed,
            added,
        }
    }

    /// Change in length.
    pub fn delta(&self) -> isize {
        self.added as isize - self.removed as isize
    }

    /// The smallest single splice equivalent to applying `self` and then `next`.
    ///
    /// Elements between the two splices are reported as removed and added again, so
    /// `(0, 1, 0)` followed by `(1, 2, 0)` yields `(0, 4, 1)` even though the element
    /// at the old index 1 survives. The result is not a union of the individual changes.
    pub fn then(self, next: Self) -> Self {
        let start = self.start.min(next.start);
        let end = (self.start + self.added).max(next.start + next.removed);
        Self {
            start,
            removed: end - self.added + self.removed - start,
            added: end - next.removed + next.added - start,
        }
    }
}

/// Receives the before and after halves of every content change.
///
/// `array_will_change` is called before each physical mutation and sees the old content.
/// `array_did_change` is called once per batch scope with the aggregate change.
pub trait ArrayObserver<T: 'static>: 'static {
    fn array_will_change(&self, array: &ObservableArray<T>, change: ArrayChange) {
        let _ = (array, change);
    }
    fn array_did_change(&self, array: &ObservableArray<T>, change: ArrayChange) {
        let _ = (array, change);
    }
}

type ArrayChangeFn<T> = Box<dyn Fn(&ObservableArray<T>, ArrayChange)>;

/// [`ArrayObserver`] built from closures.
pub struct ArrayObserverFn<T: 'static> {
    will_change: Option<ArrayChangeFn<T>>,
    did_change: Option<ArrayChangeFn<T>>,
}

impl<T: 'static> ArrayObserverFn<T> {
    pub fn new() -> Self {
        Self {
            will_change: None,
            did_change: None,
        }
    }
    pub fn on_will_change(
        mut self,
        f: impl Fn(&ObservableArray<T>, ArrayChange) + 'static,
    ) -> Self {
        self.will_change = Some(Box::new(f));
        self
    }
    pub fn on_did_change(mut self, f: impl Fn(&ObservableArray<T>, ArrayChange) + 'static) -> Self {
        self.did_change = Some(Box::new(f));
        self
    }
}
impl<T: 'static> Default for ArrayObserverFn<T> {
    fn default() -> Self {
        Self::new()
    }
}
impl<T: 'static> ArrayObserver<T> for ArrayObserverFn<T> {
    fn array_will_change(&self, array: &ObservableArray<T>, change: ArrayChange) {
        if let Some(f) = &self.will_change {
            f(array, change)
        }
    }
    fn array_did_change(&self, array: &ObservableArray<T>, change: ArrayChange) {
        if let Some(f) = &self.did_change {
            f(array, change)
        }
    }
}

/// Indexes accepted by [`ObservableArray::remove_at`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removal {
    Index(usize),
    Range { start: usize, len: usize },
    Indexes(IndexSet),
}
impl From<usize> for Removal {
    fn from(index: usize) -> Self {
        Removal::Index(index)
    }
}
impl From<(usize, usize)> for Removal {
    fn from((start, len): (usize, usize)) -> Self {
        Removal::Range { start, len }
    }
}
impl From<Range<usize>> for Removal {
    fn from(range: Range<usize>) -> Self {
        Removal::Range {
            start: range.start,
            len: range.len(),
        }
    }
}
impl From<IndexSet> for Removal {
    fn from(indexes: IndexSet) -> Self {
        Removal::Indexes(indexes)
    }
}
impl From<&IndexSet> for Removal {
    fn from(indexes: &IndexSet) -> Self {
        Removal::Indexes(indexes.clone())
    }
}

#[derive(Display, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ArrayError {
    #[display("Index '{index}' is out of range 0-{len}")]
    OutOfRange { index: usize, len: usize },
    #[display("{name}() must be implemented to support Array")]
    MissingPrimitive { name: &'static str },
    #[display("{0}")]
    InvalidRange(InvalidRangeError),
}
impl std::error::Error for ArrayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArrayError::InvalidRange(e) => Some(e),
            _ => None,
        }
    }
}
impl From<InvalidRangeError> for ArrayError {
    fn from(e: InvalidRangeError) -> Self {
        ArrayError::InvalidRange(e)
    }
}

/// Handle of a range observer registered with [`ObservableArray::add_range_observer`].
pub struct RangeObserverHandle<T: 'static> {
    key: usize,
    observer: Rc<RangeObserver<T>>,
}
impl<T: 'static> RangeObserverHandle<T> {
    pub fn observer(&self) -> &Rc<RangeObserver<T>> {
        &self.observer
    }
}

/// A sequence whose changes can be observed.
///
/// Wraps any [`ArrayContent`]. Every modifying operation is built on the `replace`
/// primitive, which brackets the physical mutation with will-change and did-change
/// notifications. Cloning yields another handle to the same array.
#[derive(Ex)]
#[derive_ex(Clone, bound())]
pub struct ObservableArray<T: 'static>(Rc<RawArray<T>>);

pub(crate) struct RawArray<T: 'static> {
    content: RefCell<Box<dyn ArrayContent<T>>>,
    observers: KeyObservers,
    state: RefCell<ArrayState<T>>,
    this: Weak<RawArray<T>>,
}

struct ArrayState<T: 'static> {
    array_observers: ObserverSet<dyn ArrayObserver<T>>,
    pending_change: Option<ArrayChange>,
    range_observers: SlabMap<Rc<RangeObserver<T>>>,
    range_changes: IndexSet,
    old_length: Option<usize>,
    range_notifier: Option<ObserverKey>,
    content_chains: Vec<ContentChain>,
    property_chains: Vec<PropertyChain>,
}
impl<T: 'static> ArrayState<T> {
    fn new() -> Self {
        Self {
            array_observers: ObserverSet::new(),
            pending_change: None,
            range_observers: SlabMap::new(),
            range_changes: IndexSet::new(),
            old_length: None,
            range_notifier: None,
            content_chains: Vec::new(),
            property_chains: Vec::new(),
        }
    }
}

struct ContentChain {
    chain: Rc<ChainObserver>,
    observer: ObserverKey,
}

struct PropertyChain {
    property: String,
    chain: Rc<ChainObserver>,
}

impl<T: Item> ObservableArray<T> {
    pub fn new() -> Self {
        Self::from_content(Vec::new())
    }
    pub fn from_content(content: impl ArrayContent<T>) -> Self {
        Self(Rc::new_cyclic(|this| RawArray {
            content: RefCell::new(Box::new(content)),
            observers: KeyObservers::new(),
            state: RefCell::new(ArrayState::new()),
            this: this.clone(),
        }))
    }

    /// Creates a read-only array. Every modifying operation fails with
    /// [`ArrayError::MissingPrimitive`].
    pub fn from_static(items: &'static [T]) -> Self {
        Self::from_content(items)
    }

    pub fn len(&self) -> usize {
        self.0.content.borrow().len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn object_at(&self, index: usize) -> Option<T> {
        self.0.content.borrow().object_at(index)
    }
    pub fn key_observers(&self) -> &KeyObservers {
        &self.0.observers
    }
    pub fn as_observable(&self) -> Rc<dyn KeyObservable> {
        self.0.clone()
    }
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Gives direct access to the storage.
    ///
    /// Changes made here are not observed unless they are bracketed with
    /// [`array_content_will_change`](Self::array_content_will_change) and
    /// [`array_content_did_change`](Self::array_content_did_change).
    pub fn with_content_mut<U>(&self, f: impl FnOnce(&mut dyn ArrayContent<T>) -> U) -> U {
        f(&mut **self.0.content.borrow_mut())
    }

    fn check_replaceable(&self) -> Result<(), ArrayError> {
        if self.0.content.borrow_mut().as_replaceable().is_some() {
            Ok(())
        } else {
            debug!("array content does not implement replace");
            Err(ArrayError::MissingPrimitive { name: "replace" })
        }
    }

    /// Replaces `removed` elements starting at `index` with `objects`.
    ///
    /// An `index` past the end appends, and `removed` is clamped to the available
    /// elements.
    pub fn replace(&self, index: usize, removed: usize, objects: Vec<T>) -> Result<(), ArrayError> {
        self.check_replaceable()?;
        let len = self.len();
        let index = index.min(len);
        let removed = removed.min(len - index);
        let added = objects.len();
        let _guard = BatchGuard::new();
        self.array_content_will_change(index, removed, added);
        if let Some(content) = self.0.content.borrow_mut().as_replaceable() {
            content.replace(index, removed, objects);
        }
        self.array_content_did_change(Some(ArrayChange::new(index, removed, added)));
        Ok(())
    }

    /// Replaces the whole content.
    pub fn set_content(&self, objects: Vec<T>) -> Result<(), ArrayError> {
        self.replace(0, self.len(), objects)
    }

    /// First half of the change protocol.
    ///
    /// Detaches chained observers from the elements about to be removed and calls
    /// `array_will_change` on every array observer.
    pub fn array_content_will_change(&self, start: usize, removed: usize, added: usize) {
        let _guard = BatchGuard::new();
        let removed_objects = self.slice(start..start.saturating_add(removed));
        self.teardown_content_observers(&removed_objects);
        self.teardown_property_chains(&removed_objects);

        let change = ArrayChange::new(start, removed, added);
        let observers = self.0.state.borrow().array_observers.to_vec();
        for o in observers {
            o.array_will_change(self, change);
        }
    }

    /// Second half of the change protocol.
    ///
    /// `None` means the whole content was replaced; array observers then receive
    /// `(0, len, 0)`. Chains are then moved onto every current member, replacing any
    /// that a member already carries.
    pub fn array_content_did_change(&self, change: Option<ArrayChange>) {
        let _guard = BatchGuard::new();
        let len = self.len();
        let this: Weak<dyn Flush> = self.0.this.clone();
        schedule_flush(this, self.0.observers.id());
        self.0.observers.notify(LENGTH_KEY);

        let (reported, span, added) = match change {
            Some(c) => {
                let span = if c.removed == c.added {
                    c.removed
                } else {
                    len.saturating_sub(c.start) + c.removed.saturating_sub(c.added)
                };
                (c, c.start..c.start + span, c.start..c.start + c.added)
            }
            None => {
                let old_len = self.0.state.borrow().old_length.unwrap_or(len);
                (ArrayChange::new(0, len, 0), 0..len.max(old_len), 0..len)
            }
        };
        {
            let mut s = self.0.state.borrow_mut();
            if !s.range_observers.is_empty() {
                s.range_changes.insert_range(span);
            }
            if s.old_length.is_some() {
                s.old_length = Some(len);
            }
            s.pending_change = Some(match s.pending_change {
                Some(p) => p.then(reported),
                None => reported,
            });
        }
        let added_objects = self.slice(added);
        if change.is_none() {
            self.teardown_content_observers(&added_objects);
            self.teardown_property_chains(&added_objects);
        }
        self.setup_content_observers(&added_objects);
        self.setup_property_chains(&added_objects);
        self.0.observers.notify(CONTENT_KEY);
    }

    fn deliver_did_change(&self) {
        let Some(change) = self.0.state.borrow_mut().pending_change.take() else {
            return;
        };
        let observers = self.0.state.borrow().array_observers.to_vec();
        trace!(%change, observers = observers.len(), "array did change");
        for o in observers {
            o.array_did_change(self, change);
        }
    }

    pub fn index_of(&self, object: &T, start_at: Option<isize>) -> Option<usize> {
        let len = self.len();
        let start = match start_at.unwrap_or(0) {
            s if s < 0 => (len as isize + s).max(0) as usize,
            s => s as usize,
        };
        (start..len).find(|&i| self.object_at(i).is_some_and(|o| o.is_same(object)))
    }
    pub fn last_index_of(&self, object: &T, start_at: Option<isize>) -> Option<usize> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        let start = match start_at {
            None => len - 1,
            Some(s) if s < 0 => {
                let s = len as isize + s;
                if s < 0 {
                    return None;
                }
                s as usize
            }
            Some(s) => (s as usize).min(len - 1),
        };
        (0..=start)
            .rev()
            .find(|&i| self.object_at(i).is_some_and(|o| o.is_same(object)))
    }
    pub fn contains(&self, object: &T) -> bool {
        self.index_of(object, None).is_some()
    }

    pub fn insert_at(&self, index: usize, object: T) -> Result<(), ArrayError> {
        let len = self.len();
        if index > len {
            debug!(index, len, "insert_at out of range");
            return Err(ArrayError::OutOfRange { index, len });
        }
        self.replace(index, 0, vec![object])
    }

    /// Removes a single index, a `(start, len)` range, or every index of an [`IndexSet`].
    ///
    /// Every index is checked before anything is notified. Ranges are removed in
    /// ascending order inside one batch scope.
    pub fn remove_at(&self, removal: impl Into<Removal>) -> Result<(), ArrayError> {
        let len = self.len();
        let indexes = match removal.into() {
            Removal::Index(index) => {
                if index >= len {
                    debug!(index, len, "remove_at out of range");
                    return Err(ArrayError::OutOfRange { index, len });
                }
                IndexSet::from(index..index + 1)
            }
            Removal::Range { start, len: count } => {
                if start >= len {
                    debug!(index = start, len, "remove_at out of range");
                    return Err(ArrayError::OutOfRange { index: start, len });
                }
                IndexSet::with_range(start, count)?
            }
            Removal::Indexes(indexes) => indexes,
        };
        if let Some(last) = indexes.last() {
            if last >= len {
                debug!(index = last, len, "remove_at out of range");
                return Err(ArrayError::OutOfRange { index: last, len });
            }
        }
        if indexes.is_empty() {
            return Ok(());
        }
        self.check_replaceable()?;
        let _guard = BatchGuard::new();
        let mut delta = 0;
        for range in indexes.ranges() {
            self.replace(range.start - delta, range.len(), Vec::new())?;
            delta += range.len();
        }
        Ok(())
    }

    /// Removes every occurrence of `object`.
    pub fn remove_object(&self, object: &T) -> Result<(), ArrayError> {
        let _guard = BatchGuard::new();
        let mut index = self.len();
        while index > 0 {
            index -= 1;
            if self.object_at(index).is_some_and(|o| o.is_same(object)) {
                self.remove_at(index)?;
            }
        }
        Ok(())
    }
    pub fn remove_objects(&self, objects: impl IntoIterator<Item = T>) -> Result<(), ArrayError> {
        let _guard = BatchGuard::new();
        for object in objects {
            self.remove_object(&object)?;
        }
        Ok(())
    }

    pub fn push_object(&self, object: T) -> Result<(), ArrayError> {
        self.insert_at(self.len(), object)
    }
    pub fn push_objects(&self, objects: impl IntoIterator<Item = T>) -> Result<(), ArrayError> {
        self.replace(self.len(), 0, objects.into_iter().collect())
    }
    pub fn pop_object(&self) -> Result<Option<T>, ArrayError> {
        let len = self.len();
        if len == 0 {
            return Ok(None);
        }
        let object = self.object_at(len - 1);
        self.remove_at(len - 1)?;
        Ok(object)
    }
    pub fn shift_object(&self) -> Result<Option<T>, ArrayError> {
        if self.is_empty() {
            return Ok(None);
        }
        let object = self.object_at(0);
        self.remove_at(0)?;
        Ok(object)
    }
    pub fn unshift_object(&self, object: T) -> Result<(), ArrayError> {
        self.insert_at(0, object)
    }

    /// Inserts `objects` at the front, keeping their order.
    pub fn unshift_objects(&self, objects: impl IntoIterator<Item = T>) -> Result<(), ArrayError> {
        self.replace(0, 0, objects.into_iter().collect())
    }

    /// Copies the elements in `range`, clamped to the current length.
    pub fn slice(&self, range: impl RangeBounds<usize>) -> Vec<T> {
        let content = self.0.content.borrow();
        to_range(range, content.len())
            .filter_map(|i| content.object_at(i))
            .collect()
    }
    pub fn to_vec(&self) -> Vec<T> {
        self.slice(..)
    }

    /// Iterates over a snapshot of the current content.
    pub fn iter(&self) -> std::vec::IntoIter<T> {
        self.to_vec().into_iter()
    }

    pub fn without(&self, value: &T) -> Vec<T> {
        self.iter().filter(|o| !o.is_same(value)).collect()
    }
    pub fn uniq(&self) -> Vec<T> {
        let mut ret: Vec<T> = Vec::new();
        for o in self.iter() {
            if !ret.iter().any(|r| r.is_same(&o)) {
                ret.push(o);
            }
        }
        ret
    }
    pub fn compact(&self) -> Vec<T> {
        self.iter().filter(|o| !o.is_null()).collect()
    }

    /// Expands nested elements recursively.
    pub fn flatten(&self) -> Vec<T> {
        flatten_items(self.to_vec())
    }

    /// Element-wise value equality.
    pub fn is_equal(&self, other: &ObservableArray<T>) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let len = self.len();
        if len != other.len() {
            return false;
        }
        (0..len).all(|i| match (self.object_at(i), other.object_at(i)) {
            (Some(a), Some(b)) => a.is_equal(&b),
            (None, None) => true,
            _ => false,
        })
    }

    pub fn max(&self) -> Option<T>
    where
        T: PartialOrd,
    {
        self.iter().reduce(|a, b| if b > a { b } else { a })
    }
    pub fn min(&self) -> Option<T>
    where
        T: PartialOrd,
    {
        self.iter().reduce(|a, b| if b < a { b } else { a })
    }

    pub fn add_array_observer(&self, observer: Rc<dyn ArrayObserver<T>>) -> ObserverKey {
        self.0.state.borrow_mut().array_observers.insert(observer)
    }
    pub fn remove_array_observer(&self, key: ObserverKey) -> bool {
        self.0
            .state
            .borrow_mut()
            .array_observers
            .remove(key)
            .is_some()
    }
    pub fn remove_array_observer_rc(&self, observer: &Rc<dyn ArrayObserver<T>>) -> bool {
        self.0.state.borrow_mut().array_observers.remove_rc(observer)
    }

    /// Observes a key of the array itself, such as `length` or `[]`.
    pub fn add_observer(&self, key: &str, f: impl Fn(&str) + 'static) -> ObserverKey {
        self.0.observers.add_observer(key, Rc::new(f))
    }
    pub fn remove_observer(&self, key: &str, observer: ObserverKey) -> bool {
        self.0.observers.remove_observer(key, observer)
    }

    /// Observes a dotted path starting at the array, such as `@each.price`.
    pub fn add_path_observer(&self, path: &str, f: impl Fn() + 'static) -> Subscription {
        observe_path(self.as_observable(), path, f)
    }

    /// Observes membership changes in `indexes`.
    pub fn add_range_observer(
        &self,
        indexes: IndexSet,
        f: impl Fn(&ObservableArray<T>, RangeChange<T>) + 'static,
    ) -> RangeObserverHandle<T> {
        self.insert_range_observer(indexes, false, Rc::new(f))
    }

    /// Observes membership changes in `indexes` and every property of the members in it.
    pub fn add_range_observer_deep(
        &self,
        indexes: IndexSet,
        f: impl Fn(&ObservableArray<T>, RangeChange<T>) + 'static,
    ) -> RangeObserverHandle<T> {
        self.insert_range_observer(indexes, true, Rc::new(f))
    }

    fn insert_range_observer(
        &self,
        indexes: IndexSet,
        is_deep: bool,
        f: Rc<dyn Fn(&ObservableArray<T>, RangeChange<T>)>,
    ) -> RangeObserverHandle<T> {
        let len = self.len();
        self.0.state.borrow_mut().old_length.get_or_insert(len);
        let observer = RangeObserver::create_dyn(self, indexes, f, is_deep);
        let needs_notifier = self.0.state.borrow().range_notifier.is_none();
        if needs_notifier {
            let this = Rc::downgrade(&self.0);
            let key = self.add_observer(CONTENT_KEY, move |_| {
                if let Some(raw) = this.upgrade() {
                    ObservableArray(raw).notify_range_observers();
                }
            });
            self.0.state.borrow_mut().range_notifier = Some(key);
        }
        let key = self
            .0
            .state
            .borrow_mut()
            .range_observers
            .insert(observer.clone());
        debug!(key, is_deep, "add range observer");
        RangeObserverHandle { key, observer }
    }

    fn is_registered(&self, handle: &RangeObserverHandle<T>) -> bool {
        self.0
            .state
            .borrow()
            .range_observers
            .get(handle.key)
            .is_some_and(|o| Rc::ptr_eq(o, &handle.observer))
    }

    /// Moves a range observer to observe `indexes` instead.
    ///
    /// Returns `false` and does nothing if `handle` was not registered with this array.
    pub fn update_range_observer(&self, handle: &RangeObserverHandle<T>, indexes: IndexSet) -> bool {
        if !self.is_registered(handle) {
            debug!(key = handle.key, "update of foreign range observer ignored");
            return false;
        }
        handle.observer.update(indexes);
        true
    }

    /// Returns `false` and does nothing if `handle` was not registered with this array.
    pub fn remove_range_observer(&self, handle: RangeObserverHandle<T>) -> bool {
        if !self.is_registered(&handle) {
            debug!(key = handle.key, "removal of foreign range observer ignored");
            return false;
        }
        handle.observer.destroy();
        self.0.state.borrow_mut().range_observers.remove(handle.key);
        debug!(key = handle.key, "remove range observer");
        true
    }

    pub fn range_observer_count(&self) -> usize {
        self.0.state.borrow().range_observers.len()
    }

    fn notify_range_observers(&self) {
        let (observers, changes) = {
            let mut s = self.0.state.borrow_mut();
            if s.range_observers.is_empty() || s.range_changes.is_empty() {
                return;
            }
            let observers: Vec<_> = s.range_observers.values().cloned().collect();
            (observers, take(&mut s.range_changes))
        };
        trace!(%changes, observers = observers.len(), "notify range observers");
        for o in observers {
            o.range_did_change(&changes);
        }
    }

    /// Clones `chain` onto every current and future member.
    ///
    /// `chain` is told about every membership change and, through the clones, about
    /// every change of the watched path on a member.
    pub fn register_dependent_key_with_chain(&self, property: &str, chain: Rc<ChainObserver>) {
        self.0.state.borrow_mut().property_chains.push(PropertyChain {
            property: property.to_string(),
            chain: chain.clone(),
        });
        for item in self.iter() {
            clone_property_chain_to_item(&chain, &item);
        }
    }
    pub fn remove_dependent_key_with_chain(&self, property: &str, chain: &Rc<ChainObserver>) {
        let removed = {
            let mut s = self.0.state.borrow_mut();
            let index = s
                .property_chains
                .iter()
                .position(|c| c.property == property && Rc::ptr_eq(&c.chain, chain));
            index.map(|index| s.property_chains.remove(index))
        };
        if removed.is_none() {
            return;
        }
        for item in self.iter() {
            if let Some(o) = item.as_observable() {
                if let Some(clone) = o.key_observers().take_property_clone(chain.chain_id()) {
                    clone.deactivate();
                }
            }
        }
    }

    fn add_content_observer(&self, chain: &Rc<ChainObserver>) {
        let tail = Rc::downgrade(&chain.tail());
        let observer = self.add_observer(CONTENT_KEY, move |_| {
            if let Some(tail) = tail.upgrade() {
                tail.notify_property_did_change();
            }
        });
        self.0.state.borrow_mut().content_chains.push(ContentChain {
            chain: chain.clone(),
            observer,
        });
        if let Some(next) = chain.next() {
            for item in self.iter() {
                resume_chain_on_item(next, &item);
            }
        }
    }
    fn remove_content_observer(&self, chain: &Rc<ChainObserver>) {
        let removed = {
            let mut s = self.0.state.borrow_mut();
            let index = s
                .content_chains
                .iter()
                .position(|c| Rc::ptr_eq(&c.chain, chain));
            index.map(|index| s.content_chains.remove(index))
        };
        let Some(removed) = removed else {
            return;
        };
        self.0.observers.remove_observer(CONTENT_KEY, removed.observer);
        if let Some(next) = chain.next() {
            for item in self.iter() {
                suspend_chain_on_item(next, &item);
            }
        }
    }

    fn content_templates(&self) -> Vec<Rc<ChainObserver>> {
        self.0
            .state
            .borrow()
            .content_chains
            .iter()
            .filter_map(|c| c.chain.next().cloned())
            .collect()
    }
    fn setup_content_observers(&self, added: &[T]) {
        for next in self.content_templates() {
            for item in added {
                resume_chain_on_item(&next, item);
            }
        }
    }
    fn teardown_content_observers(&self, removed: &[T]) {
        for next in self.content_templates() {
            for item in removed {
                suspend_chain_on_item(&next, item);
            }
        }
    }

    fn property_chains(&self) -> Vec<Rc<ChainObserver>> {
        self.0
            .state
            .borrow()
            .property_chains
            .iter()
            .map(|c| c.chain.clone())
            .collect()
    }
    fn setup_property_chains(&self, added: &[T]) {
        for chain in self.property_chains() {
            chain.notify_property_did_change();
            for item in added {
                clone_property_chain_to_item(&chain, item);
            }
        }
    }
    fn teardown_property_chains(&self, removed: &[T]) {
        for chain in self.property_chains() {
            chain.notify_property_did_change();
            for item in removed {
                if let Some(o) = item.as_observable() {
                    if let Some(clone) = o.key_observers().take_property_clone(chain.chain_id()) {
                        clone.deactivate();
                    }
                }
            }
        }
    }

    /// Detaches every observer the array placed on its members and clears every
    /// observer registered on the array.
    pub fn destroy(&self) {
        let (range_observers, content_chains, property_chains) = {
            let mut s = self.0.state.borrow_mut();
            s.array_observers.clear();
            s.pending_change = None;
            s.range_changes.clear();
            s.range_notifier = None;
            (
                replace(&mut s.range_observers, SlabMap::new()),
                take(&mut s.content_chains),
                take(&mut s.property_chains),
            )
        };
        for o in range_observers.values() {
            o.destroy();
        }
        let items = self.to_vec();
        for c in &content_chains {
            if let Some(next) = c.chain.next() {
                for item in &items {
                    suspend_chain_on_item(next, item);
                }
            }
        }
        for c in &property_chains {
            for item in &items {
                if let Some(o) = item.as_observable() {
                    if let Some(clone) = o.key_observers().take_property_clone(c.chain.chain_id())
                    {
                        clone.deactivate();
                    }
                }
            }
        }
        self.0.observers.clear();
        debug!("array destroyed");
    }
}

fn resume_chain_on_item<T: Item>(next: &Rc<ChainObserver>, item: &T) {
    let Some(o) = item.as_observable() else {
        return;
    };
    let clone = next.clone_unbound();
    clone.activate(o.clone());
    o.key_observers().push_content_observer(clone);
}
fn suspend_chain_on_item<T: Item>(next: &Rc<ChainObserver>, item: &T) {
    let Some(o) = item.as_observable() else {
        return;
    };
    if let Some(clone) = o
        .key_observers()
        .take_content_observer(next.property(), next.chain_id())
    {
        clone.deactivate();
    }
}
fn clone_property_chain_to_item<T: Item>(chain: &Rc<ChainObserver>, item: &T) {
    let Some(o) = item.as_observable() else {
        return;
    };
    let clone = chain.clone_unbound();
    clone.activate(o.clone());
    o.key_observers().push_property_clone(clone);
}

fn flatten_items<T: Item>(items: Vec<T>) -> Vec<T> {
    use iter_n::iter2::*;
    items
        .into_iter()
        .flat_map(|item| match item.enumerable_items() {
            Some(items) => flatten_items(items).into_iter().into_iter0(),
            None => once(item).into_iter1(),
        })
        .collect()
}

impl<T: Item> KeyObservable for RawArray<T> {
    fn key_observers(&self) -> &KeyObservers {
        &self.observers
    }
    fn add_content_observer(&self, chain: &Rc<ChainObserver>) -> bool {
        let Some(this) = self.this.upgrade() else {
            return false;
        };
        ObservableArray(this).add_content_observer(chain);
        true
    }
    fn remove_content_observer(&self, chain: &Rc<ChainObserver>) {
        if let Some(this) = self.this.upgrade() {
            ObservableArray(this).remove_content_observer(chain);
        }
    }
}

impl<T: Item> Flush for RawArray<T> {
    fn flush(self: Rc<Self>) {
        ObservableArray(self).deliver_did_change();
    }
}

impl<T: Item> ObservableArray<T> {
    pub(crate) fn from_raw(raw: Rc<RawArray<T>>) -> Self {
        Self(raw)
    }
    pub(crate) fn downgrade(&self) -> Weak<RawArray<T>> {
        Rc::downgrade(&self.0)
    }
}

impl<T: Item> Default for ObservableArray<T> {
    fn default() -> Self {
        Self::new()
    }
}
impl<T: Item> From<Vec<T>> for ObservableArray<T> {
    fn from(items: Vec<T>) -> Self {
        Self::from_content(items)
    }
}
impl<T: Item> FromIterator<T> for ObservableArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}
impl<T: Item> PartialEq for ObservableArray<T> {
    fn eq(&self, other: &Self) -> bool {
        self.is_equal(other)
    }
}
impl<T: Item> Item for ObservableArray<T> {
    fn is_same(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
    fn is_equal(&self, other: &Self) -> bool {
        ObservableArray::is_equal(self, other)
    }
    fn as_observable(&self) -> Option<Rc<dyn KeyObservable>> {
        Some(ObservableArray::as_observable(self))
    }
}

impl<T: Item + fmt::Debug> fmt::Debug for ObservableArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Ok(content) = self.0.content.try_borrow() {
            f.debug_list()
                .entries((0..content.len()).filter_map(|i| content.object_at(i)))
                .finish()
        } else {
            write!(f, "<borrowed>")
        }
    }
}

impl<T: Item + Serialize> Serialize for ObservableArray<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}
impl<'de, T: Item + Deserialize<'de>> Deserialize<'de> for ObservableArray<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from(Vec::<T>::deserialize(deserializer)?))
    }
}
