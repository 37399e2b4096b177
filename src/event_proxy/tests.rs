use std::rc::Rc;

use assert_call::{CallRecorder, call};
use futures::{
    executor::{LocalPool, block_on},
    task::LocalSpawnExt,
};
use pretty_assertions::assert_eq;

use super::*;

#[test]
fn handler_is_cached_by_name() {
    let p = EventProxy::<i32>::new();
    assert!(Rc::ptr_eq(&p.handler("a"), &p.handler("a")));
    assert!(!Rc::ptr_eq(&p.handler("a"), &p.handler("b")));
}

#[test]
fn first_event_wins() {
    let p = EventProxy::<i32>::new();
    let wait = p.wait("click");
    let h = p.handler("click");
    assert!(!p.is_fired("click"));
    h(1);
    h(2);
    assert_eq!(block_on(wait), Some(1));
    assert!(p.is_fired("click"));
    assert_eq!(p.value("click"), Some(1));
}

#[test]
fn wait_wakes_when_fired() {
    let mut cr = CallRecorder::new();
    let mut pool = LocalPool::new();
    let p = EventProxy::<i32>::new();
    let wait = p.wait("load");
    pool.spawner()
        .spawn_local(async move { call!("{:?}", wait.await) })
        .unwrap();
    pool.run_until_stalled();
    cr.verify(());

    p.handler("load")(7);
    pool.run_until_stalled();
    cr.verify("Some(7)");
}

#[test]
fn filter_skips_rejected_events() {
    let p = EventProxy::<i32>::new();
    p.filter("key", |k| *k == 13);
    let h = p.handler("key");
    h(1);
    assert!(!p.is_fired("key"));
    h(13);
    assert_eq!(p.value("key"), Some(13));
}

#[test]
fn any_resolves_with_first_fired() {
    let mut cr = CallRecorder::new();
    let mut pool = LocalPool::new();
    let p = EventProxy::<&'static str>::new();
    let waiter = p.clone();
    pool.spawner()
        .spawn_local(async move { call!("{:?}", waiter.any(&["ok", "cancel"]).await) })
        .unwrap();
    pool.run_until_stalled();
    cr.verify(());

    p.handler("cancel")("cancel");
    pool.run_until_stalled();
    cr.verify("Some(\"cancel\")");
    assert_eq!(block_on(p.any(&[])), None);
}

#[test]
fn all_waits_for_every_name() {
    let p = EventProxy::<i32>::new();
    p.handler("b")(2);
    p.handler("a")(1);
    assert_eq!(block_on(p.all(&["a", "b"])), Some(vec![1, 2]));
}

#[test]
fn dropped_proxy_ends_waits() {
    let p = EventProxy::<i32>::new();
    let wait = p.wait("never");
    let h = p.handler("never");
    drop(p);
    h(1);
    assert_eq!(block_on(wait), None);
}
