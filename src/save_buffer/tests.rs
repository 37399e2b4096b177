use std::{cell::RefCell, rc::Rc, time::Duration};

use assert_call::{CallRecorder, call};
use futures::{channel::oneshot, executor::LocalPool, task::LocalSpawnExt};
use pretty_assertions::assert_eq;

use crate::utils::{test_helpers::UpdateCounter, timer::sleep};

use super::*;

struct Setup {
    pool: LocalPool,
    updates: UpdateCounter,
    buf: SaveBuffer<i32>,
}
fn setup(options: SaveBufferOptions<i32>) -> Setup {
    let pool = LocalPool::new();
    let spawner: Spawner = Rc::new(pool.spawner());
    let updates = UpdateCounter::new();
    let buf = SaveBuffer::new(options, spawner, updates.updater());
    Setup { pool, updates, buf }
}

fn recording_save(options: SaveBufferOptions<i32>) -> SaveBufferOptions<i32> {
    options.with_save(|base, ours| {
        Box::pin(async move {
            call!("save {base} {ours}");
            Ok::<_, BoxError>(ours)
        })
    })
}

#[test]
fn follows_upstream_without_edits() {
    let s = setup(SaveBufferOptions::default());
    assert!(!s.buf.is_ready());
    assert_eq!(s.buf.current(), None);

    s.buf.base(1);
    assert!(s.buf.is_ready());
    assert_eq!(s.buf.current(), Some(1));
    assert!(!s.buf.is_changed());
    assert_eq!(s.updates.take(), 1);

    s.buf.base(2);
    assert_eq!(s.buf.current(), Some(2));
    assert_eq!(s.updates.take(), 1);

    s.buf.base(2);
    assert_eq!(s.updates.take(), 0);
}

#[test]
fn edits_survive_upstream_changes() {
    let s = setup(SaveBufferOptions::default());
    s.buf.base(1);
    s.buf.set(5);
    assert!(s.buf.is_changed());

    s.buf.base(2);
    assert_eq!(s.buf.current(), Some(5));
    assert_eq!(s.buf.original(), Some(2));
    assert!(s.buf.is_changed());
}

#[test]
fn merge_combines_edits_with_upstream() {
    let s = setup(SaveBufferOptions::default().with_merge(|base, ours, theirs| ours - base + theirs));
    s.buf.base(10);
    s.buf.set(15);
    s.buf.base(20);
    assert_eq!(s.buf.current(), Some(25));
    assert_eq!(s.buf.original(), Some(20));
    assert!(s.buf.is_changed());
}

#[test]
fn merge_matching_upstream_clears_changes() {
    let s = setup(SaveBufferOptions::default().with_merge(|_, _, theirs| *theirs));
    s.buf.base(1);
    s.buf.set(2);
    s.buf.base(3);
    assert_eq!(s.buf.current(), Some(3));
    assert!(!s.buf.is_changed());
}

#[test]
fn compare_decides_equivalence() {
    let s = setup(SaveBufferOptions::default().with_compare(|a, b| a / 10 == b / 10));
    s.buf.base(10);
    s.buf.set(11);
    assert!(!s.buf.is_changed());
    s.buf.set(21);
    assert!(s.buf.is_changed());
}

#[test]
fn setting_original_value_clears_changes() {
    let s = setup(SaveBufferOptions::default());
    s.buf.base(1);
    s.buf.set(2);
    assert!(s.buf.is_changed());
    s.buf.set(1);
    assert!(!s.buf.is_changed());
}

#[test]
fn reset_discards_edits() {
    let s = setup(SaveBufferOptions::default());
    s.buf.base(1);
    s.buf.set(2);
    s.updates.take();

    s.buf.reset();
    assert_eq!(s.buf.current(), Some(1));
    assert!(!s.buf.is_changed());
    assert_eq!(s.updates.take(), 1);

    s.buf.reset();
    assert_eq!(s.updates.take(), 0);
}

#[test]
fn save_without_callback_commits_locally() {
    let mut s = setup(SaveBufferOptions::default());
    s.buf.base(1);
    s.buf.set(2);
    s.pool.run_until(s.buf.save()).unwrap();
    assert_eq!(s.buf.original(), Some(2));
    assert!(!s.buf.is_changed());
}

#[test]
fn save_uses_saved_value() {
    let mut cr = CallRecorder::new();
    let mut s = setup(SaveBufferOptions::default().with_save(|base, ours| {
        Box::pin(async move {
            call!("save {base} {ours}");
            Ok::<_, BoxError>(ours * 10)
        })
    }));
    s.buf.base(1);
    s.buf.set(2);
    s.pool.run_until(s.buf.save()).unwrap();
    cr.verify("save 1 2");
    assert_eq!(s.buf.current(), Some(20));
    assert_eq!(s.buf.original(), Some(20));
    assert!(!s.buf.is_changed());
    assert!(!s.buf.is_saving());

    s.pool.run_until(s.buf.save()).unwrap();
    cr.verify(());
}

#[test]
fn edits_during_save_are_kept() {
    let gate = Rc::new(RefCell::new(None::<oneshot::Receiver<()>>));
    let (tx, rx) = oneshot::channel();
    *gate.borrow_mut() = Some(rx);
    let options = SaveBufferOptions::default().with_save(move |_, ours| {
        let rx = gate.borrow_mut().take();
        Box::pin(async move {
            if let Some(rx) = rx {
                rx.await?;
            }
            Ok::<_, BoxError>(ours)
        })
    });
    let mut s = setup(options);
    s.buf.base(1);
    s.buf.set(5);

    let buf = s.buf.clone();
    s.pool
        .spawner()
        .spawn_local(async move {
            buf.save().await.unwrap();
        })
        .unwrap();
    s.pool.run_until_stalled();
    assert!(s.buf.is_saving());

    s.buf.set(7);
    tx.send(()).unwrap();
    s.pool.run_until_stalled();
    assert!(!s.buf.is_saving());
    assert_eq!(s.buf.original(), Some(5));
    assert_eq!(s.buf.current(), Some(7));
    assert!(s.buf.is_changed());
}

#[test]
fn failed_save_keeps_edits() {
    let mut s = setup(SaveBufferOptions::default().with_save(|_, _| {
        Box::pin(async { Err::<i32, BoxError>("offline".into()) })
    }));
    s.buf.base(1);
    s.buf.set(2);
    let e = s.pool.run_until(s.buf.save()).unwrap_err();
    assert_eq!(e.to_string(), "offline");
    assert_eq!(s.buf.original(), Some(1));
    assert_eq!(s.buf.current(), Some(2));
    assert!(s.buf.is_changed());
}

#[test]
fn autosave_after_idle() {
    let mut cr = CallRecorder::new();
    let mut s = setup(recording_save(
        SaveBufferOptions::default().with_autosave(Duration::from_millis(20)),
    ));
    s.buf.base(1);
    s.buf.set(2);
    s.buf.set(3);
    s.pool.run_until(sleep(Duration::from_millis(80)));
    cr.verify("save 1 3");
    assert!(!s.buf.is_changed());
    assert_eq!(s.buf.original(), Some(3));
}

#[test]
fn detach_cancels_autosave() {
    let mut cr = CallRecorder::new();
    let mut s = setup(recording_save(
        SaveBufferOptions::default().with_autosave(Duration::from_millis(20)),
    ));
    s.buf.base(1);
    s.buf.set(2);
    s.updates.take();
    s.buf.detach();
    s.pool.run_until(sleep(Duration::from_millis(60)));
    cr.verify(());
    assert!(s.buf.is_changed());

    s.buf.reset();
    assert_eq!(s.updates.get(), 0);
}
