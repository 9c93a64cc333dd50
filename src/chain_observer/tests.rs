use std::rc::Rc;

use assert_call::{call, CallRecorder};

use super::*;
use crate::model::Model;

#[test]
fn create_chain_splits_path() {
    let chain = ChainObserver::create_chain("a.b.c", || {});
    assert_eq!(chain.property(), "a");
    let b = chain.next().unwrap();
    assert_eq!(b.property(), "b");
    assert_eq!(chain.tail().property(), "c");
    assert_eq!(b.chain_id(), chain.chain_id());
    assert!(Rc::ptr_eq(&b.root().unwrap(), &chain));
}

#[test]
fn clone_unbound_shares_identity() {
    let chain = ChainObserver::create_chain("a.b", || {});
    let c = chain.clone_unbound();
    assert_eq!(c.chain_id(), chain.chain_id());
    assert!(!c.is_active());
    assert!(Rc::ptr_eq(c.next().unwrap(), chain.next().unwrap()));
}

#[test]
fn single_hop() {
    let mut cr = CallRecorder::new();
    let m = Model::new();
    let chain = ChainObserver::create_chain("name", || call!("changed"));
    chain.activate(m.clone());
    m.set("name", "x");
    cr.verify("changed");
    chain.deactivate();
    m.set("name", "y");
    cr.verify(());
}

#[test]
fn multi_hop_rebinds_on_intermediate_change() {
    let mut cr = CallRecorder::new();
    let root = Model::new();
    let a = Model::new();
    let b = Model::new();
    root.set_link("owner", a.clone());
    let _s = observe_path(root.clone(), "owner.name", || call!("changed"));

    a.set("name", "x");
    cr.verify("changed");

    root.set_link("owner", b.clone());
    cr.verify("changed");

    a.set("name", "y");
    cr.verify(());
    b.set("name", "y");
    cr.verify("changed");
}

#[test]
fn missing_intermediate_is_skipped() {
    let mut cr = CallRecorder::new();
    let root = Model::new();
    let _s = observe_path(root.clone(), "owner.name", || call!("changed"));
    root.set("other", 1);
    cr.verify(());
    let a = Model::new();
    root.set_link("owner", a.clone());
    cr.verify("changed");
    a.set("name", "x");
    cr.verify("changed");
}

#[test]
fn dropping_subscription_stops_observing() {
    let mut cr = CallRecorder::new();
    let root = Model::new();
    let a = Model::new();
    root.set_link("owner", a.clone());
    let s = observe_path(root.clone(), "owner.name", || call!("changed"));
    drop(s);
    a.set("name", "x");
    root.set("owner", 1);
    cr.verify(());
    assert_eq!(a.key_observers().observer_count("name"), 0);
    assert_eq!(root.key_observers().observer_count("owner"), 0);
}
