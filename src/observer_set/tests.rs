use super::*;
use assert_call::{call, CallRecorder};

type Callback = dyn Fn(i32);

#[test]
fn insert_same_observer_twice_returns_same_key() {
    let mut set = ObserverSet::<Callback>::new();
    let f: Rc<Callback> = Rc::new(|_| {});
    let k0 = set.insert(f.clone());
    let k1 = set.insert(f);
    assert_eq!(k0, k1);
    assert_eq!(set.len(), 1);
}

#[test]
fn remove_by_key_and_identity() {
    let mut set = ObserverSet::<Callback>::new();
    let a: Rc<Callback> = Rc::new(|_| {});
    let b: Rc<Callback> = Rc::new(|_| {});
    let ka = set.insert(a.clone());
    set.insert(b.clone());

    assert!(set.remove(ka).is_some());
    assert!(!set.contains(ka));
    assert!(!set.remove_rc(&a));
    assert!(set.remove_rc(&b));
    assert!(set.is_empty());
}

#[test]
fn invoke_all_members() {
    let mut cr = CallRecorder::new();
    let mut set = ObserverSet::<Callback>::new();
    set.insert(Rc::new(|x| call!("a{x}")));
    set.insert(Rc::new(|x| call!("b{x}")));
    for f in set.to_vec() {
        f(1);
    }
    cr.verify(assert_call::Call::par(["a1", "b1"]));
}

#[test]
fn clear_removes_everything() {
    let mut set = ObserverSet::<Callback>::new();
    set.insert(Rc::new(|_| {}));
    set.insert(Rc::new(|_| {}));
    set.clear();
    assert!(set.is_empty());
}
