use std::{
    collections::BTreeMap,
    future::Future,
    pin::Pin,
    sync::{Condvar, LazyLock, Mutex, MutexGuard},
    task::{Context, Poll, Waker},
    time::{Duration, Instant},
};

use slabmap::SlabMap;


static DEADLINES: LazyLock<Deadlines> = LazyLock::new(|| Deadlines {
    queue: Mutex::new(DeadlineQueue::new()),
    condvar: Condvar::new(),
});

/// Executor-independent timer shared by every thread.
///
/// A single worker thread sleeps until the earliest deadline and wakes the tasks whose deadline passed.
struct Deadlines {
    queue: Mutex<DeadlineQueue>,
    condvar: Condvar,
}
impl Deadlines {
    fn lock(&self) -> MutexGuard<'_, DeadlineQueue> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }
    fn run_worker(&self) {
        let mut expired = Vec::new();
        let mut queue = self.lock();
        loop {
            queue.take_expired(Instant::now(), &mut expired);
            if !expired.is_empty() {
                drop(queue);
                for waker in expired.drain(..) {
                    waker.wake();
                }
                queue = self.lock();
                continue;
            }
            queue = match queue.next_deadline() {
                Some(deadline) => {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    self.condvar
                        .wait_timeout(queue, wait)
                        .unwrap_or_else(|e| e.into_inner())
                        .0
                }
                None => self.condvar.wait(queue).unwrap_or_else(|e| e.into_inner()),
            };
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct DeadlineKey {
    at: Instant,
    id: usize,
}

enum Timer {
    Waiting { key: DeadlineKey, waker: Waker },
    Fired,
}

struct DeadlineQueue {
    order: BTreeMap<DeadlineKey, ()>,
    timers: SlabMap<Timer>,
    worker_started: bool,
}
impl DeadlineQueue {
    fn new() -> Self {
        Self {
            order: BTreeMap::new(),
            timers: SlabMap::new(),
            worker_started: false,
        }
    }
    fn next_deadline(&self) -> Option<Instant> {
        self.order.first_key_value().map(|(key, _)| key.at)
    }
    fn take_expired(&mut self, now: Instant, expired: &mut Vec<Waker>) {
        while let Some(entry) = self.order.first_entry() {
            if entry.key().at > now {
                break;
            }
            let id = entry.key().id;
            entry.remove();
            if let Timer::Waiting { waker, .. } = std::mem::replace(&mut self.timers[id], Timer::Fired) {
                expired.push(waker);
            }
        }
    }
    fn insert(&mut self, at: Instant, waker: &Waker) -> usize {
        if !self.worker_started {
            self.worker_started = true;
            std::thread::spawn(|| DEADLINES.run_worker());
        }
        let id = self.timers.insert(Timer::Fired);
        let key = DeadlineKey { at, id };
        let earliest = self.next_deadline().is_none_or(|first| at < first);
        self.timers[id] = Timer::Waiting {
            key,
            waker: waker.clone(),
        };
        self.order.insert(key, ());
        if earliest {
            DEADLINES.condvar.notify_one();
        }
        id
    }
    fn poll(&mut self, id: usize, cx: &Context) -> Poll<()> {
        match &mut self.timers[id] {
            Timer::Waiting { waker, .. } => {
                if !waker.will_wake(cx.waker()) {
                    *waker = cx.waker().clone();
                }
                Poll::Pending
            }
            Timer::Fired => {
                self.timers.remove(id);
                Poll::Ready(())
            }
        }
    }
    fn cancel(&mut self, id: usize) {
        if let Some(Timer::Waiting { key, .. }) = self.timers.remove(id) {
            self.order.remove(&key);
        }
    }
}

/// Future returned by [`sleep`] and [`sleep_until`].
#[must_use = "futures do nothing unless polled"]
pub struct Sleep {
    at: Instant,
    id: Option<usize>,
    done: bool,
}
impl Future for Sleep {
    type Output = ();
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(());
        }
        let mut queue = DEADLINES.lock();
        let poll = match this.id {
            Some(id) => queue.poll(id, cx),
            None if this.at <= Instant::now() => Poll::Ready(()),
            None => {
                this.id = Some(queue.insert(this.at, cx.waker()));
                Poll::Pending
            }
        };
        if poll.is_ready() {
            this.id = None;
            this.done = true;
        }
        poll
    }
}
impl Drop for Sleep {
    fn drop(&mut self) {
        if let Some(id) = self.id {
            DEADLINES.lock().cancel(id);
        }
    }
}

/// Completes after `duration` has elapsed.
pub fn sleep(duration: Duration) -> Sleep {
    sleep_until(Instant::now() + duration)
}

/// Completes once `at` has been reached.
pub fn sleep_until(at: Instant) -> Sleep {
    Sleep {
        at,
        id: None,
        done: false,
    }
}
