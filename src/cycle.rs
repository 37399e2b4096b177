use std::{
    cell::{Ref, RefCell},
    future::Future,
    rc::{Rc, Weak},
    task::{Context, Poll, Waker},
    time::Duration,
};

use derive_ex::derive_ex;
use futures::{
    future::RemoteHandle,
    task::{LocalSpawn, LocalSpawnExt},
};

use crate::{
    BoxError, CycleEvent, Delay, Disposition, Interrupted, RenderConfig, Subscription, Target,
    UsageError,
    delay::{Disclosure, DisclosureState, disclosure},
    event::Listeners,
    slot::SlotNode,
    utils::{
        sync::{Settled, Settler, settle_once},
        timer::sleep,
    },
};


/// Executor used to drive producers and disclosure timers.
pub type Spawner = Rc<dyn LocalSpawn>;

/// Per-component settings for new cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOptions {
    /// Fail resolution with [`UsageError::MissingShow`] if the producer never called `show()`.
    pub require_show: bool,

    /// Overrides [`RenderConfig::delay_empty`].
    pub delay_empty: Option<Delay>,

    /// Overrides [`RenderConfig::delay_rendered`].
    pub delay_rendered: Option<Delay>,
}

/// One attempt of a component to produce its output.
///
/// The render path reads what to display right now with [`get_element`](Self::get_element)
/// while the producer started by [`run`](Self::run) keeps working.
/// Placeholders offered with [`show`](Self::show) are disclosed immediately or after a delay,
/// and the final element replaces them once the producer resolves.
#[derive_ex(Clone, bound())]
pub struct RenderCycle<P: 'static, E: 'static>(Rc<CycleNode<P, E>>);

struct CycleNode<P: 'static, E: 'static> {
    target: Target<P>,
    options: CycleOptions,
    spawner: Spawner,
    slot: Weak<SlotNode<P, E>>,
    listeners: Rc<Listeners>,
    data: RefCell<CycleData<P, E>>,
}

struct ShowTicket {
    settler: Settler<bool>,
    settled: Settled<bool>,
}

struct CycleData<P, E> {
    progress: Option<E>,
    progress_available: bool,
    progress_forced: bool,
    promised: Option<E>,
    promised_available: bool,
    rendered: Option<E>,
    deferred_error: Option<BoxError>,
    showing_progress: bool,
    delay_empty: Delay,
    delay_rendered: Delay,

    canceled: bool,
    completed: bool,
    initial: bool,
    fulfilled: bool,
    mounted: bool,
    synchronous: bool,
    started: bool,
    rerendering: bool,
    show_called: bool,
    complete_on_shown: bool,

    prev_props: Option<P>,
    prev_props_async: Option<P>,

    timer: Option<RemoteHandle<()>>,
    timer_seq: u64,
    shown: Option<ShowTicket>,
}

impl<P, E> CycleData<P, E> {
    fn has_ended(&self) -> bool {
        self.canceled || self.completed
    }

    /// Invalidates any pending disclosure timer.
    fn clear_timer(&mut self) {
        self.timer_seq = self.timer_seq.wrapping_add(1);
        self.timer = None;
    }
    fn settle_shown(&mut self, rendered: bool) {
        if let Some(t) = &self.shown {
            t.settler.settle(rendered);
        }
    }
    fn is_show_pending(&self) -> bool {
        self.shown.as_ref().is_some_and(|t| !t.settler.is_settled())
    }
}

impl<P: Clone + 'static, E: Clone + 'static> RenderCycle<P, E> {
    pub(crate) fn new(
        target: Target<P>,
        prev: Option<&Self>,
        options: CycleOptions,
        config: &RenderConfig,
        spawner: Spawner,
        slot: Weak<SlotNode<P, E>>,
    ) -> Self {
        let mut data = CycleData {
            progress: None,
            progress_available: false,
            progress_forced: false,
            promised: None,
            promised_available: false,
            rendered: None,
            deferred_error: None,
            showing_progress: false,
            delay_empty: options.delay_empty.unwrap_or(config.delay_empty),
            delay_rendered: options.delay_rendered.unwrap_or(config.delay_rendered),
            canceled: false,
            completed: false,
            initial: true,
            fulfilled: false,
            mounted: false,
            synchronous: false,
            started: false,
            rerendering: false,
            show_called: false,
            complete_on_shown: false,
            prev_props: None,
            prev_props_async: None,
            timer: None,
            timer_seq: 0,
            shown: None,
        };
        if let Some(prev) = prev {
            let p = prev.data();
            data.rendered = p.rendered.clone();
            data.initial = false;
            data.fulfilled = p.fulfilled;
            data.mounted = p.mounted;
            data.showing_progress = p.showing_progress && !p.completed;
            data.prev_props = if p.completed {
                Some(prev.0.target.props.clone())
            } else {
                p.prev_props.clone()
            };
            data.prev_props_async = Some(prev.0.target.props.clone());
        }
        tracing::debug!(component = %target.id, initial = data.initial, "rendering cycle started");
        Self(Rc::new(CycleNode {
            target,
            options,
            spawner,
            slot,
            listeners: Rc::new(Listeners::new()),
            data: RefCell::new(data),
        }))
    }

    /// Starts the producer. Only the first call on a cycle has an effect.
    ///
    /// The producer is polled once before this returns, so progress disclosed without delay
    /// and immediate results are visible to the render path that called `run`.
    /// The rest of the producer runs on the spawner; its later state changes ask the host to render again.
    pub fn run<F, Fut>(&self, producer: F)
    where
        F: FnOnce(Self) -> Fut,
        Fut: Future<Output = Result<Option<E>, BoxError>> + 'static,
    {
        {
            let d = &mut *self.0.data.borrow_mut();
            if d.has_ended() || d.started || d.promised_available {
                return;
            }
            d.started = true;
            d.synchronous = true;
        }
        let mut fut = Box::pin(producer(self.clone()));
        match fut.as_mut().poll(&mut Context::from_waker(Waker::noop())) {
            Poll::Ready(result) => self.settle(result),
            Poll::Pending => {
                let this = self.clone();
                let spawned = self.0.spawner.spawn_local(async move {
                    let result = fut.await;
                    this.settle(result);
                });
                if let Err(e) = spawned {
                    self.reject(Box::new(e));
                }
            }
        }
        self.0.data.borrow_mut().synchronous = false;
    }

    fn settle(&self, result: Result<Option<E>, BoxError>) {
        match result {
            Ok(element) => self.resolve(element),
            Err(e) => self.reject(e),
        }
    }

    /// Offers a placeholder to display while the producer keeps working.
    ///
    /// Returns `true` if the placeholder was disclosed immediately.
    /// Fails with [`Interrupted`] if the cycle has been superseded.
    pub fn show(&self, element: E, disposition: Disposition) -> Result<bool, Interrupted> {
        self.check()?;
        let disclosed = {
            let d = &mut *self.0.data.borrow_mut();
            if d.has_ended() || d.promised_available {
                return Ok(false);
            }
            d.show_called = true;
            let Disclosure { delay, forced } = disclosure(
                disposition,
                DisclosureState {
                    rendered: d.rendered.is_some(),
                    showing_progress: d.showing_progress,
                    fulfilled: d.fulfilled,
                },
                d.delay_empty,
                d.delay_rendered,
            );
            d.clear_timer();
            d.settle_shown(false);
            let (settler, settled) = settle_once();
            d.shown = Some(ShowTicket { settler, settled });
            d.progress = Some(element);
            d.progress_forced = forced;
            d.progress_available = false;
            match delay {
                Delay::After(duration) if duration.is_zero() => {
                    d.progress_available = true;
                }
                Delay::After(duration) => {
                    self.schedule_disclosure(d, duration);
                }
                Delay::Never => {}
            }
            d.progress_available
        };
        if disclosed {
            self.rerender();
        }
        Ok(disclosed)
    }

    fn schedule_disclosure(&self, d: &mut CycleData<P, E>, duration: Duration) {
        let seq = d.timer_seq;
        let node = Rc::downgrade(&self.0);
        let task = async move {
            sleep(duration).await;
            if let Some(node) = node.upgrade() {
                RenderCycle(node).on_timer(seq);
            }
        };
        match self.0.spawner.spawn_local_with_handle(task) {
            Ok(handle) => d.timer = Some(handle),
            Err(e) => {
                tracing::warn!(component = %self.0.target.id, "cannot schedule progress disclosure: {e}");
                d.progress_available = true;
            }
        }
    }

    fn on_timer(&self, seq: u64) {
        {
            let d = &mut *self.0.data.borrow_mut();
            if seq != d.timer_seq || d.has_ended() || d.progress.is_none() {
                return;
            }
            d.timer = None;
            d.progress_available = true;
        }
        tracing::trace!(component = %self.0.target.id, "progress disclosed by timer");
        self.rerender();
    }

    /// Discloses pending progress now, regardless of its delay.
    ///
    /// Returns `false` if there was nothing to disclose.
    pub fn disclose(&self) -> bool {
        {
            let d = &mut *self.0.data.borrow_mut();
            if d.has_ended() || d.progress.is_none() || d.progress_available {
                return false;
            }
            d.clear_timer();
            d.progress_available = true;
        }
        self.rerender();
        true
    }

    /// Fails with [`Interrupted`] if a newer cycle has replaced this one.
    ///
    /// Call before expensive work so that an obsolete producer stops early.
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.is_canceled() {
            Err(Interrupted::new())
        } else {
            Ok(())
        }
    }

    /// Finishes the producer.
    ///
    /// `None` keeps the last progress element as the final output.
    /// If that element has not been displayed yet, it is disclosed first
    /// and the cycle completes once the render path has read it.
    pub fn resolve(&self, element: Option<E>) {
        let mut complete = false;
        let mut update = false;
        let missing_show = {
            let d = &mut *self.0.data.borrow_mut();
            if d.has_ended() || d.promised_available {
                return;
            }
            self.0.options.require_show && !d.show_called
        };
        if missing_show {
            self.reject(Box::new(UsageError::MissingShow));
            return;
        }
        {
            let d = &mut *self.0.data.borrow_mut();
            match element {
                Some(element) => {
                    d.clear_timer();
                    d.progress = None;
                    d.progress_available = false;
                    d.settle_shown(false);
                    d.promised = Some(element);
                    d.promised_available = true;
                    update = true;
                }
                None if d.is_show_pending() => {
                    d.complete_on_shown = true;
                    if !d.progress_available && d.progress.is_some() {
                        d.clear_timer();
                        d.progress_available = true;
                        update = true;
                    }
                }
                None => complete = true,
            }
        }
        if update {
            self.rerender();
        }
        if complete {
            self.complete();
        }
    }

    /// Records a producer error. The error is surfaced once through [`take_error`](Self::take_error).
    ///
    /// [`Interrupted`] is discarded.
    pub fn reject(&self, e: BoxError) {
        if Interrupted::is(&*e) {
            return;
        }
        let mut update = false;
        let dropped = {
            let d = &mut *self.0.data.borrow_mut();
            if d.has_ended() {
                Some(e)
            } else {
                update = d.mounted;
                d.deferred_error = Some(e);
                None
            }
        };
        if let Some(e) = dropped {
            tracing::warn!(component = %self.0.target.id, "error after rendering cycle ended: {e}");
            return;
        }
        if update {
            self.rerender();
        }
    }

    fn rerender(&self) {
        {
            let d = &mut *self.0.data.borrow_mut();
            if d.synchronous || d.has_ended() {
                return;
            }
            d.rerendering = true;
        }
        if let Some(slot) = self.0.slot.upgrade() {
            slot.request_update();
        }
    }

    /// Returns the element to display now.
    ///
    /// Must be called once per render path invocation. Once the cycle has ended,
    /// only the last rendered element is returned.
    /// Consuming the final element completes the cycle;
    /// consuming a progress element fires [`CycleEvent::Progress`].
    pub fn get_element(&self) -> Option<E> {
        let mut progress = false;
        let mut complete = false;
        let element = {
            let d = &mut *self.0.data.borrow_mut();
            d.rerendering = false;
            if d.has_ended() {
                return d.rendered.clone();
            }
            if d.promised_available {
                d.promised_available = false;
                d.rendered = d.promised.take();
                d.fulfilled = true;
                complete = true;
            } else if d.progress_available {
                d.progress_available = false;
                d.rendered = d.progress.take();
                d.fulfilled = true;
                if !d.progress_forced {
                    d.showing_progress = true;
                }
                d.settle_shown(true);
                progress = true;
                complete = d.complete_on_shown;
            }
            d.rendered.clone()
        };
        if progress {
            self.0.listeners.fire(CycleEvent::Progress);
        }
        if complete {
            self.complete();
        }
        element
    }

    /// Takes the deferred producer error. An error always ends the cycle.
    pub fn take_error(&self) -> Option<BoxError> {
        let e = self.0.data.borrow_mut().deferred_error.take();
        if e.is_some() {
            self.cancel();
        }
        e
    }

    /// Waits until the element of the last `show()` has been displayed.
    ///
    /// Resolves to `false` if it was replaced, or the cycle ended, before being displayed.
    pub fn has_rendered(&self) -> Result<impl Future<Output = bool> + use<P, E>, UsageError> {
        let settled = match &self.data().shown {
            Some(t) => t.settled.clone(),
            None => return Err(UsageError::NoPendingShow),
        };
        Ok(async move { settled.wait().await.unwrap_or(false) })
    }

    /// Shows `element` immediately and waits until it has been displayed.
    pub async fn transition(&self, element: E) -> Result<bool, BoxError> {
        self.show(element, Disposition::Always)?;
        Ok(self.has_rendered()?.await)
    }

    /// Changes the delays used by subsequent `show()` calls. `None` leaves a value unchanged.
    pub fn delay(&self, empty: impl Into<Option<Delay>>, rendered: impl Into<Option<Delay>>) {
        let d = &mut *self.0.data.borrow_mut();
        if let Some(empty) = empty.into() {
            d.delay_empty = empty;
        }
        if let Some(rendered) = rendered.into() {
            d.delay_rendered = rendered;
        }
    }

    /// Returns the props of the last completed cycle, or with `use_async` those of the previous cycle.
    pub fn prev_props(&self, use_async: bool) -> Option<P> {
        let d = self.data();
        if use_async {
            d.prev_props_async.clone()
        } else {
            d.prev_props.clone()
        }
    }

    pub(crate) fn substitute(&self, element: E) {
        let d = &mut *self.0.data.borrow_mut();
        d.show_called = true;
        d.promised = Some(element);
        d.promised_available = true;
    }
}

impl<P: 'static, E: 'static> RenderCycle<P, E> {
    fn data(&self) -> Ref<'_, CycleData<P, E>> {
        self.0.data.borrow()
    }

    pub fn target(&self) -> &Target<P> {
        &self.0.target
    }
    pub fn is_canceled(&self) -> bool {
        self.data().canceled
    }
    pub fn is_completed(&self) -> bool {
        self.data().completed
    }
    pub fn has_ended(&self) -> bool {
        self.data().has_ended()
    }

    /// Returns `true` if the host is rendering again because this cycle asked it to.
    pub fn is_rerendering(&self) -> bool {
        let d = self.data();
        d.rerendering && !d.has_ended()
    }

    /// Returns `true` for the first cycle of a component instance.
    pub fn is_initial(&self) -> bool {
        self.data().initial
    }
    pub fn is_mounted(&self) -> bool {
        self.data().mounted
    }
    pub fn mark_mounted(&self) {
        self.0.data.borrow_mut().mounted = true;
    }

    /// Returns `true` once the render path has displayed something from this or a previous cycle.
    pub fn is_fulfilled(&self) -> bool {
        self.data().fulfilled
    }

    pub fn cancel(&self) {
        self.end(CycleEvent::Cancel);
    }
    pub fn complete(&self) {
        self.end(CycleEvent::Complete);
    }
    fn end(&self, event: CycleEvent) {
        {
            let d = &mut *self.0.data.borrow_mut();
            if d.has_ended() {
                return;
            }
            match event {
                CycleEvent::Cancel => d.canceled = true,
                _ => d.completed = true,
            }
            d.rerendering = false;
            d.clear_timer();
            d.settle_shown(false);
        }
        tracing::debug!(component = %self.0.target.id, "rendering cycle {event}");
        self.0.listeners.fire(event);
    }

    /// Registers a listener for `event`.
    pub fn on(&self, event: CycleEvent, f: impl Fn(CycleEvent) + 'static) -> Subscription {
        self.0.listeners.subscribe(event, f)
    }
}

impl<P: 'static, E: 'static> PartialEq for RenderCycle<P, E> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
impl<P: 'static, E: 'static> std::fmt::Debug for RenderCycle<P, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.data.try_borrow() {
            Ok(d) => f
                .debug_struct("RenderCycle")
                .field("target", &self.0.target.id)
                .field("canceled", &d.canceled)
                .field("completed", &d.completed)
                .field("initial", &d.initial)
                .finish_non_exhaustive(),
            Err(_) => write!(f, "<borrowed>"),
        }
    }
}
