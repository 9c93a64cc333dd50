//! Observable arrays with range observers, chained key observers and batched change
//! notification.

mod array;
mod chain_observer;
mod computed;
mod core;
mod index_set;
mod item;
mod kvo;
mod model;
mod observer_set;
mod range_observer;
mod subscription;
mod utils;

pub use array::*;
pub use chain_observer::*;
pub use computed::*;
pub use crate::core::{batch, begin_property_changes, end_property_changes, is_batching, BatchGuard};
pub use index_set::*;
pub use item::*;
pub use kvo::{
    KeyObservable, KeyObservers, PropertyObserver, ANY_KEY, CONTENT_KEY, EACH_KEY, LENGTH_KEY,
};
pub use model::*;
pub use observer_set::*;
pub use range_observer::*;
pub use subscription::*;
