use std::rc::Rc;

use assert_call::{call, CallRecorder};
use obsarray::*;
use serde_json::json;

fn item(done: bool) -> Rc<Model> {
    Model::from_json(json!({ "done": done }))
}

#[test]
fn each_path_follows_membership() {
    let mut cr = CallRecorder::new();
    let items = vec![item(false), item(false)];
    let a = ObservableArray::from(items.clone());
    let _s = a.add_path_observer("@each.done", || call!("changed"));

    items[1].set("done", true);
    cr.verify("changed");

    a.remove_at(1).unwrap();
    cr.verify("changed");
    assert_eq!(items[1].key_observers().observer_count("done"), 0);
    items[1].set("done", false);
    cr.verify(());

    let added = item(false);
    a.push_object(added.clone()).unwrap();
    cr.verify("changed");
    added.set("done", true);
    cr.verify("changed");
}

#[test]
fn each_path_notifies_once_per_batch() {
    let mut cr = CallRecorder::new();
    let items = vec![item(false), item(false), item(false)];
    let a = ObservableArray::from(items.clone());
    let _s = a.add_path_observer("@each.done", || call!("changed"));
    batch(|| {
        a.push_object(item(true)).unwrap();
        a.push_object(item(true)).unwrap();
    });
    cr.verify("changed");
}

#[test]
fn dropping_each_subscription_detaches_members() {
    let mut cr = CallRecorder::new();
    let items = vec![item(false), item(false)];
    let a = ObservableArray::from(items.clone());
    let s = a.add_path_observer("@each.done", || call!("changed"));
    assert_eq!(items[0].key_observers().content_observer_count("done"), 1);
    drop(s);
    for m in &items {
        assert_eq!(m.key_observers().observer_count("done"), 0);
        assert_eq!(m.key_observers().content_observer_count("done"), 0);
    }
    items[0].set("done", true);
    a.push_object(item(true)).unwrap();
    cr.verify(());
}

#[test]
fn each_path_through_links() {
    let mut cr = CallRecorder::new();
    let owner = Model::from_json(json!({ "name": "a" }));
    let m = Model::new();
    m.set_link("owner", owner.clone());
    let a = ObservableArray::from(vec![m.clone()]);
    let _s = a.add_path_observer("@each.owner.name", || call!("changed"));

    owner.set("name", "b");
    cr.verify("changed");

    let other = Model::from_json(json!({ "name": "c" }));
    m.set_link("owner", other.clone());
    cr.verify("changed");
    owner.set("name", "d");
    cr.verify(());
    other.set("name", "e");
    cr.verify("changed");
}

#[test]
fn path_into_nested_array() {
    let mut cr = CallRecorder::new();
    let inner = ObservableArray::from(vec![1, 2]);
    let holder = Model::new();
    holder.set_link("items", inner.as_observable());
    let _s = observe_path(holder.clone(), "items.length", || call!("length"));
    inner.push_object(3).unwrap();
    cr.verify("length");
}

#[test]
fn destroy_detaches_each_observers() {
    let items = vec![item(false), item(false)];
    let a = ObservableArray::from(items.clone());
    let _s = a.add_path_observer("@each.done", || {});
    let _sum = Computed::new(&a, "count", "done", |a| a.len());
    a.destroy();
    for m in &items {
        assert_eq!(m.key_observers().observer_count("done"), 0);
        assert_eq!(m.key_observers().content_observer_count("done"), 0);
        assert_eq!(m.key_observers().property_clone_count(), 0);
    }
}
