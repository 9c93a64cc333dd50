use std::rc::Rc;

use serde_json::Value;

use crate::kvo::KeyObservable;

#[cfg(test)]
mod tests;

/// Element type of an [`ObservableArray`](crate::ObservableArray).
///
/// `is_same` is identity and is what lookups such as `index_of` use. `is_equal` is
/// value equality and is what `is_equal` on arrays uses.
pub trait Item: Clone + 'static {
    fn is_same(&self, other: &Self) -> bool;

    fn is_equal(&self, other: &Self) -> bool {
        self.is_same(other)
    }

    /// Null elements are dropped by `compact`.
    fn is_null(&self) -> bool {
        false
    }

    /// The object whose properties deep range observers and `@each` chains observe.
    fn as_observable(&self) -> Option<Rc<dyn KeyObservable>> {
        None
    }

    /// Nested elements that `flatten` splices in place of this element.
    fn enumerable_items(&self) -> Option<Vec<Self>> {
        None
    }
}

macro_rules! impl_item_by_eq {
    ($($t:ty),*) => {
        $(
            impl Item for $t {
                fn is_same(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

impl_item_by_eq!(
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    f32,
    f64,
    String,
    &'static str
);

impl<T: Item> Item for Option<T> {
    fn is_same(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.is_same(b),
            (None, None) => true,
            _ => false,
        }
    }
    fn is_equal(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.is_equal(b),
            (None, None) => true,
            _ => false,
        }
    }
    fn is_null(&self) -> bool {
        self.as_ref().map_or(true, |v| v.is_null())
    }
    fn as_observable(&self) -> Option<Rc<dyn KeyObservable>> {
        self.as_ref()?.as_observable()
    }
}

impl Item for Value {
    fn is_same(&self, other: &Self) -> bool {
        self == other
    }
    fn is_null(&self) -> bool {
        self.is_null()
    }
    fn enumerable_items(&self) -> Option<Vec<Self>> {
        self.as_array().cloned()
    }
}

impl<T: KeyObservable + PartialEq> Item for Rc<T> {
    fn is_same(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
    fn is_equal(&self, other: &Self) -> bool {
        **self == **other
    }
    fn as_observable(&self) -> Option<Rc<dyn KeyObservable>> {
        Some(self.clone())
    }
}
