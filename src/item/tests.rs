use serde_json::json;

use super::*;
use crate::model::Model;

#[test]
fn rc_same_is_identity() {
    let a = Model::from_json(json!({ "x": 1 }));
    let b = Model::from_json(json!({ "x": 1 }));
    assert!(a.is_same(&a.clone()));
    assert!(!a.is_same(&b));
    assert!(a.is_equal(&b));
    assert!(a.as_observable().is_some());
}

#[test]
fn option_is_null() {
    assert!(None::<i32>.is_null());
    assert!(!Some(1i32).is_null());
    assert!(Some(json!(null)).is_null());
    assert!(None::<i32>.is_same(&None));
    assert!(!Some(1i32).is_same(&None));
}

#[test]
fn json_array_is_enumerable() {
    assert_eq!(json!([1, 2]).enumerable_items(), Some(vec![json!(1), json!(2)]));
    assert_eq!(json!(1).enumerable_items(), None);
    assert!(Item::is_null(&json!(null)));
}

#[test]
fn primitives_have_no_observable() {
    assert!(1i32.as_observable().is_none());
    assert!("a".as_observable().is_none());
    assert!(1i32.is_same(&1));
    assert!(!"a".is_same(&"b"));
}
