use std::{cell::RefCell, error::Error, rc::Rc};

use derive_ex::derive_ex;

use crate::Delay;


/// Callback receiving producer errors in hosts without an error boundary.
pub type ErrorHandler = Rc<dyn Fn(&(dyn Error + 'static))>;

thread_local! {
    static GLOBAL: RefCell<RenderConfig> = RefCell::new(RenderConfig::new());
}

/// Timing and error settings applied to newly created cycles.
#[derive_ex(Default)]
#[default(Self::new())]
#[derive(Clone)]
pub struct RenderConfig {
    /// Delay before the first placeholder of a component becomes visible.
    pub delay_empty: Delay,

    /// Delay before a placeholder replaces content that has already been rendered.
    pub delay_rendered: Delay,

    pub error_handler: Option<ErrorHandler>,
}

impl RenderConfig {
    pub const DEFAULT_DELAY_EMPTY: Delay = Delay::from_millis(50);
    pub const DEFAULT_DELAY_RENDERED: Delay = Delay::Never;

    pub fn new() -> Self {
        Self {
            delay_empty: Self::DEFAULT_DELAY_EMPTY,
            delay_rendered: Self::DEFAULT_DELAY_RENDERED,
            error_handler: None,
        }
    }

    /// Returns the thread-wide default configuration.
    pub fn global() -> Self {
        GLOBAL.with(|g| g.borrow().clone())
    }

    /// Replaces the thread-wide default configuration. Last write wins.
    pub fn set_global(config: Self) {
        GLOBAL.with(|g| *g.borrow_mut() = config);
    }

    /// Updates the delays. `None` leaves the corresponding value unchanged.
    pub fn with_delays(
        mut self,
        empty: impl Into<Option<Delay>>,
        rendered: impl Into<Option<Delay>>,
    ) -> Self {
        self.set_delays(empty.into(), rendered.into());
        self
    }
    pub fn with_error_handler(mut self, f: impl Fn(&(dyn Error + 'static)) + 'static) -> Self {
        self.error_handler = Some(Rc::new(f));
        self
    }

    fn set_delays(&mut self, empty: Option<Delay>, rendered: Option<Delay>) {
        if let Some(empty) = empty {
            self.delay_empty = empty;
        }
        if let Some(rendered) = rendered {
            self.delay_rendered = rendered;
        }
    }

    /// Routes an error to the fallback handler.
    ///
    /// Returns `false` if no handler is configured.
    pub fn report_error(&self, e: &(dyn Error + 'static)) -> bool {
        if let Some(handler) = &self.error_handler {
            handler(e);
            true
        } else {
            tracing::error!("unhandled rendering error: {e}");
            false
        }
    }
}
impl std::fmt::Debug for RenderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderConfig")
            .field("delay_empty", &self.delay_empty)
            .field("delay_rendered", &self.delay_rendered)
            .field("error_handler", &self.error_handler.is_some())
            .finish()
    }
}

/// Updates the thread-wide default delays. `None` leaves the corresponding value unchanged.
pub fn set_global_delays(empty: impl Into<Option<Delay>>, rendered: impl Into<Option<Delay>>) {
    let (empty, rendered) = (empty.into(), rendered.into());
    GLOBAL.with(|g| g.borrow_mut().set_delays(empty, rendered));
}

/// Installs the thread-wide fallback error handler.
pub fn set_global_error_handler(f: impl Fn(&(dyn Error + 'static)) + 'static) {
    let f: ErrorHandler = Rc::new(f);
    GLOBAL.with(|g| g.borrow_mut().error_handler = Some(f));
}
