use std::rc::Rc;

use assert_call::{call, CallRecorder};
use obsarray::*;
use serde_json::json;

fn did_observer<T: Item>(a: &ObservableArray<T>) {
    let _ = a.add_array_observer(Rc::new(
        ArrayObserverFn::new().on_did_change(|_, c| call!("did {c}")),
    ));
}

#[test]
fn scenario_remove_range() {
    let mut cr = CallRecorder::new();
    let a = ObservableArray::from(vec!["A", "B", "C", "D"]);
    did_observer(&a);
    a.remove_at((1, 2)).unwrap();
    assert_eq!(a.to_vec(), vec!["A", "D"]);
    cr.verify("did (1, 2, 0)");
}

#[test]
fn scenario_remove_index_set() {
    let mut cr = CallRecorder::new();
    let a = ObservableArray::from(vec!["A", "B", "C", "D"]);
    did_observer(&a);
    let mut indexes = IndexSet::new();
    indexes.add_index(0).add(2, 2).unwrap();
    a.remove_at(indexes).unwrap();
    assert_eq!(a.to_vec(), vec!["B"]);
    cr.verify("did (0, 4, 1)");
}

#[test]
fn scenario_remove_from_empty() {
    let mut cr = CallRecorder::new();
    let a = ObservableArray::<&str>::new();
    did_observer(&a);
    let _ = a.add_observer(LENGTH_KEY, |key| call!("{key}"));
    assert_eq!(
        a.remove_at(200),
        Err(ArrayError::OutOfRange { index: 200, len: 0 })
    );
    assert!(a.is_empty());
    cr.verify(());
}

#[test]
fn scenario_sum_over_each() {
    let items = vec![
        Model::from_json(json!({ "price": 5 })),
        Model::from_json(json!({ "price": 5 })),
    ];
    let a = ObservableArray::from(items.clone());
    let sum = Computed::new(&a, "sum", "price", |a| {
        a.iter()
            .filter_map(|m| m.get("price").and_then(|p| p.as_i64()))
            .sum::<i64>()
    });
    assert_eq!(sum.get(), 10);

    items[0].set("price", 6);
    assert_eq!(sum.get(), 11);

    a.remove_object(&items[0]).unwrap();
    assert_eq!(sum.get(), 5);
    let computations = sum.computations();
    items[0].set("price", 7);
    assert!(sum.is_cached());
    assert_eq!(sum.computations(), computations);
}

#[test]
fn pushes_in_one_batch_notify_once() {
    let mut cr = CallRecorder::new();
    let a = ObservableArray::from(vec![0]);
    did_observer(&a);
    begin_property_changes();
    for i in 1..=5 {
        a.push_object(i).unwrap();
    }
    cr.verify(());
    end_property_changes();
    cr.verify("did (1, 0, 5)");
}

#[test]
fn nested_batches_coalesce() {
    let mut cr = CallRecorder::new();
    let a = ObservableArray::from(vec![1, 2, 3]);
    did_observer(&a);
    let _ = a.add_observer(LENGTH_KEY, |key| call!("{key}"));
    batch(|| {
        a.push_objects([4, 5]).unwrap();
        batch(|| {
            a.remove_at(0).unwrap();
            a.unshift_object(0).unwrap();
        });
        cr.verify(());
    });
    cr.verify(["did (0, 3, 5)", "length"]);
    assert_eq!(a.to_vec(), vec![0, 2, 3, 4, 5]);
}

#[test]
fn range_observer_sees_insert_in_range_only() {
    let mut cr = CallRecorder::new();
    let a = ObservableArray::from(vec!["a", "b", "c", "d"]);
    let _h = a.add_range_observer(IndexSet::from(0..2), |_, c| {
        call!("{} {:?}", c.indexes, c.objects)
    });
    a.insert_at(3, "x").unwrap();
    cr.verify(());
    a.insert_at(1, "y").unwrap();
    cr.verify(r#"{1} Some(["y"])"#);
}

#[test]
fn remove_and_reinsert_round_trip() {
    let original = ObservableArray::from(vec![1, 2, 3, 4, 5, 6]);
    let a = ObservableArray::from(original.to_vec());
    let indexes: IndexSet = [1, 2, 4].into_iter().collect();
    let removed: Vec<(usize, i32)> = indexes
        .iter()
        .map(|i| (i, a.object_at(i).unwrap()))
        .collect();
    a.remove_at(&indexes).unwrap();
    assert_eq!(a.to_vec(), vec![1, 4, 6]);
    for (i, value) in removed {
        a.insert_at(i, value).unwrap();
    }
    assert!(a.is_equal(&original));
}

#[test]
fn vec_deque_content() {
    let mut cr = CallRecorder::new();
    let a = ObservableArray::from_content(std::collections::VecDeque::from(vec![2, 3]));
    did_observer(&a);
    a.unshift_object(1).unwrap();
    a.push_object(4).unwrap();
    a.replace(1, 2, vec![9]).unwrap();
    cr.verify(["did (0, 0, 1)", "did (3, 0, 1)", "did (1, 2, 1)"]);
    assert_eq!(a.to_vec(), vec![1, 9, 4]);
}

#[test]
fn error_messages() {
    let e = ArrayError::OutOfRange { index: 5, len: 3 };
    assert_eq!(e.to_string(), "Index '5' is out of range 0-3");
    let e = ArrayError::from(IndexSet::try_from_signed(-1, 2).unwrap_err());
    assert_eq!(e.to_string(), "invalid range: start -1, length 2");
    assert!(std::error::Error::source(&e).is_some());
}
