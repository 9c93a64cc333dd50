use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

use derive_ex::Ex;
use tracing::trace;

use crate::{array::ObservableArray, chain_observer::ChainObserver, item::Item};


/// A value derived from an array and cached until a dependency changes.
///
/// The cache is invalidated when membership of the array changes or when the property
/// named by `dependent_key` changes on a current member. Invalidating also notifies
/// `property` on the array.
#[derive(Ex)]
#[derive_ex(Clone, bound())]
pub struct Computed<T: Item, V: 'static>(Rc<RawComputed<T, V>>);

struct RawComputed<T: Item, V: 'static> {
    array: ObservableArray<T>,
    property: String,
    chain: Rc<ChainObserver>,
    compute: Box<dyn Fn(&ObservableArray<T>) -> V>,
    value: RefCell<Option<V>>,
    computations: Cell<usize>,
}

impl<T: Item, V: Clone + 'static> Computed<T, V> {
    pub fn new(
        array: &ObservableArray<T>,
        property: &str,
        dependent_key: &str,
        compute: impl Fn(&ObservableArray<T>) -> V + 'static,
    ) -> Self {
        let raw = Rc::new_cyclic(|this: &Weak<RawComputed<T, V>>| {
            let this = this.clone();
            let chain = ChainObserver::create_chain(dependent_key, move || {
                if let Some(this) = this.upgrade() {
                    this.invalidate();
                }
            });
            RawComputed {
                array: array.clone(),
                property: property.to_string(),
                chain,
                compute: Box::new(compute),
                value: RefCell::new(None),
                computations: Cell::new(0),
            }
        });
        array.register_dependent_key_with_chain(property, raw.chain.clone());
        Self(raw)
    }

    pub fn get(&self) -> V {
        if let Some(value) = &*self.0.value.borrow() {
            return value.clone();
        }
        let value = (self.0.compute)(&self.0.array);
        self.0.computations.set(self.0.computations.get() + 1);
        *self.0.value.borrow_mut() = Some(value.clone());
        value
    }

    pub fn is_cached(&self) -> bool {
        self.0.value.borrow().is_some()
    }

    /// Number of times the value was computed.
    pub fn computations(&self) -> usize {
        self.0.computations.get()
    }

    pub fn property(&self) -> &str {
        &self.0.property
    }
}

impl<T: Item, V: 'static> RawComputed<T, V> {
    fn invalidate(&self) {
        if self.value.borrow_mut().take().is_some() {
            trace!(property = %self.property, "invalidate");
        }
        self.array.key_observers().notify(&self.property);
    }
}

impl<T: Item, V: 'static> Drop for RawComputed<T, V> {
    fn drop(&mut self) {
        self.array
            .remove_dependent_key_with_chain(&self.property, &self.chain);
    }
}
