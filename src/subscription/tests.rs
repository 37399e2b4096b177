use super::*;
use assert_call::{CallRecorder, call};

#[test]
fn from_fn_calls_on_drop() {
    let mut cr = CallRecorder::new();
    {
        let _s = Subscription::from_fn(|| call!("drop"));
    }
    cr.verify("drop");
}

#[test]
fn empty_does_nothing() {
    let mut cr = CallRecorder::new();
    {
        let _s = Subscription::empty();
    }
    cr.verify(());
}

#[test]
fn detach_skips_unsubscribe() {
    let mut cr = CallRecorder::new();
    Subscription::from_fn(|| call!("drop")).detach();
    cr.verify(());
}
