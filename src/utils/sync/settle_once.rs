use std::{
    cell::RefCell,
    future::poll_fn,
    mem::take,
    rc::Rc,
    task::{Poll, Waker},
};

use derive_ex::Ex;
use slabmap::SlabMap;

/// Single-threaded value that is settled at most once and observed by any number of waiters.
struct SettleOnce<T> {
    value: Option<T>,
    closed: bool,
    wakers: SlabMap<Waker>,
}
impl<T> SettleOnce<T> {
    fn wake_all(&mut self) {
        for (_, waker) in take(&mut self.wakers) {
            waker.wake();
        }
    }
}

pub fn settle_once<T>() -> (Settler<T>, Settled<T>) {
    let data = Rc::new(RefCell::new(SettleOnce {
        value: None,
        closed: false,
        wakers: SlabMap::new(),
    }));
    (Settler(data.clone()), Settled(data))
}

pub struct Settler<T>(Rc<RefCell<SettleOnce<T>>>);

impl<T> Settler<T> {
    /// Settles the value. Returns `false` if it was already settled.
    pub fn settle(&self, value: T) -> bool {
        let mut d = self.0.borrow_mut();
        if d.value.is_some() {
            return false;
        }
        d.value = Some(value);
        d.wake_all();
        true
    }
    pub fn is_settled(&self) -> bool {
        self.0.borrow().value.is_some()
    }
}
impl<T> Drop for Settler<T> {
    fn drop(&mut self) {
        let mut d = self.0.borrow_mut();
        d.closed = true;
        d.wake_all();
    }
}

#[derive(Ex)]
#[derive_ex(Clone(bound()))]
pub struct Settled<T>(Rc<RefCell<SettleOnce<T>>>);

impl<T: Clone> Settled<T> {
    pub fn get(&self) -> Option<T> {
        self.0.borrow().value.clone()
    }

    /// Waits for the value. Returns `None` if the settler was dropped without settling.
    pub async fn wait(&self) -> Option<T> {
        let mut key = WakerKey {
            owner: self,
            key: None,
        };
        poll_fn(|cx| {
            let mut d = self.0.borrow_mut();
            if let Some(value) = &d.value {
                return Poll::Ready(Some(value.clone()));
            }
            if d.closed {
                return Poll::Ready(None);
            }
            match key.key {
                Some(k) => d.wakers[k].clone_from(cx.waker()),
                None => key.key = Some(d.wakers.insert(cx.waker().clone())),
            }
            Poll::Pending
        })
        .await
    }
}

struct WakerKey<'a, T> {
    owner: &'a Settled<T>,
    key: Option<usize>,
}
impl<T> Drop for WakerKey<'_, T> {
    fn drop(&mut self) {
        if let Some(key) = self.key {
            self.owner.0.borrow_mut().wakers.remove(key);
        }
    }
}
