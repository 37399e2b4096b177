use std::rc::Rc;

use futures::future::LocalBoxFuture;

use crate::{
    BoxError, ContextSlot, CycleOptions, CycleRegistry, PropOverlap, RenderCycle, Target,
};


/// A component whose output is produced asynchronously.
pub trait AsyncComponent: 'static {
    type Props: PropOverlap + PartialEq + Clone + 'static;
    type Element: Clone + 'static;

    /// Produces the final element, offering placeholders through `cycle` while working.
    ///
    /// Returning `None` keeps the last placeholder as the final output.
    fn render_async(
        &self,
        cycle: RenderCycle<Self::Props, Self::Element>,
        props: Self::Props,
    ) -> LocalBoxFuture<'static, Result<Option<Self::Element>, BoxError>>;

    fn options(&self) -> CycleOptions {
        CycleOptions::default()
    }
}

/// Adapter connecting an [`AsyncComponent`] to a host framework.
///
/// The host calls [`render`](Self::render) from its render path and re-invokes it whenever the updater passed to
/// [`new`](Self::new) is called. Dropping the adapter unmounts it.
pub struct ComponentHost<C: AsyncComponent> {
    component: Rc<C>,
    registry: CycleRegistry,
    slot: ContextSlot<C::Props, C::Element>,
    error_boundary: bool,
}

impl<C: AsyncComponent> ComponentHost<C> {
    pub fn new(component: C, registry: CycleRegistry, updater: impl Fn() + 'static) -> Self {
        Self {
            component: Rc::new(component),
            registry,
            slot: ContextSlot::new(updater),
            error_boundary: true,
        }
    }

    /// With `false`, producer errors go to the configured fallback error handler
    /// and the last rendered element is displayed instead.
    pub fn error_boundary(mut self, enabled: bool) -> Self {
        self.error_boundary = enabled;
        self
    }

    pub fn slot(&self) -> &ContextSlot<C::Props, C::Element> {
        &self.slot
    }
    pub fn cycle(&self) -> Option<RenderCycle<C::Props, C::Element>> {
        self.slot.cycle()
    }

    /// Render path. Returns the element to display now, or the producer error to raise.
    pub fn render(&self, props: C::Props) -> Result<Option<C::Element>, BoxError> {
        let target = Target::of::<C>(props.clone());
        let cycle = self
            .registry
            .acquire(&self.slot, target, self.component.options());
        if !cycle.is_rerendering() {
            let component = self.component.clone();
            cycle.run(move |cycle| component.render_async(cycle, props));
        }
        let result = match cycle.take_error() {
            Some(e) if self.error_boundary => Err(e),
            Some(e) => {
                self.registry.config().report_error(&*e);
                Ok(cycle.get_element())
            }
            None => Ok(cycle.get_element()),
        };
        cycle.mark_mounted();
        self.registry.release();
        result
    }

    /// Cancels the live cycle and stops forwarding update requests.
    pub fn unmount(&self) {
        self.slot.unmount();
    }
}
impl<C: AsyncComponent> Drop for ComponentHost<C> {
    fn drop(&mut self) {
        self.unmount();
    }
}
