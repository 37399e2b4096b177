use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use derive_ex::derive_ex;

use crate::RenderCycle;


/// Host-owned cell holding the live cycle of one component instance,
/// together with the host's forced-update callback.
#[derive_ex(Clone, bound())]
pub struct ContextSlot<P: 'static, E: 'static>(Rc<SlotNode<P, E>>);

pub(crate) struct SlotNode<P: 'static, E: 'static> {
    cycle: RefCell<Option<RenderCycle<P, E>>>,
    updater: RefCell<Option<Rc<dyn Fn()>>>,
}

impl<P: 'static, E: 'static> ContextSlot<P, E> {
    /// Creates a slot. `updater` is called whenever the live cycle needs the host to render again.
    pub fn new(updater: impl Fn() + 'static) -> Self {
        Self(Rc::new(SlotNode {
            cycle: RefCell::new(None),
            updater: RefCell::new(Some(Rc::new(updater))),
        }))
    }

    /// Returns the cycle currently held by this slot.
    pub fn cycle(&self) -> Option<RenderCycle<P, E>> {
        self.0.cycle.borrow().clone()
    }

    /// Asks the host to render again. Does nothing after [`unmount`](Self::unmount).
    pub fn request_update(&self) {
        self.0.request_update();
    }

    pub fn is_mounted(&self) -> bool {
        self.0.updater.borrow().is_some()
    }

    /// Detaches the host and cancels the live cycle.
    pub fn unmount(&self) {
        self.0.updater.borrow_mut().take();
        let cycle = self.0.cycle.borrow_mut().take();
        if let Some(cycle) = cycle {
            cycle.cancel();
        }
    }

    pub(crate) fn set_cycle(&self, cycle: RenderCycle<P, E>) {
        *self.0.cycle.borrow_mut() = Some(cycle);
    }
    pub(crate) fn downgrade(&self) -> Weak<SlotNode<P, E>> {
        Rc::downgrade(&self.0)
    }
    pub(crate) fn from_node(node: Rc<SlotNode<P, E>>) -> Self {
        Self(node)
    }
    pub(crate) fn node(&self) -> &Rc<SlotNode<P, E>> {
        &self.0
    }
}

impl<P: 'static, E: 'static> SlotNode<P, E> {
    pub(crate) fn request_update(&self) {
        let updater = self.updater.borrow().clone();
        if let Some(updater) = updater {
            updater();
        }
    }
}
