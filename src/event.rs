use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use parse_display::Display;
use slabmap::SlabMap;

use crate::Subscription;

/// Lifecycle events fired by a [`RenderCycle`](crate::RenderCycle).
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[display(style = "snake_case")]
pub enum CycleEvent {
    /// A progress element was handed to the render path.
    Progress,

    /// The cycle completed. Fired at most once.
    Complete,

    /// The cycle was canceled. Fired at most once.
    Cancel,
}

struct Listener {
    event: CycleEvent,
    f: Rc<dyn Fn(CycleEvent)>,
}

#[derive(Default)]
pub(crate) struct Listeners(RefCell<SlabMap<Listener>>);

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn subscribe(
        self: &Rc<Self>,
        event: CycleEvent,
        f: impl Fn(CycleEvent) + 'static,
    ) -> Subscription {
        let key = self.0.borrow_mut().insert(Listener {
            event,
            f: Rc::new(f),
        });
        let this: Weak<Self> = Rc::downgrade(self);
        Subscription::from_fn(move || {
            if let Some(this) = this.upgrade() {
                this.0.borrow_mut().remove(key);
            }
        })
    }

    /// Calls the listeners of `event`.
    ///
    /// Listeners are collected first so that they may subscribe or unsubscribe while running.
    pub fn fire(&self, event: CycleEvent) {
        let fs: Vec<_> = self
            .0
            .borrow()
            .values()
            .filter(|l| l.event == event)
            .map(|l| l.f.clone())
            .collect();
        for f in fs {
            f(event);
        }
    }
}
