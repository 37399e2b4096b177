use parse_display::Display;

/// Error type produced by user-supplied producers.
pub type BoxError = Box<dyn std::error::Error + 'static>;

/// Cooperative cancellation signal.
///
/// Returned by [`RenderCycle::check`](crate::RenderCycle::check) and
/// [`RenderCycle::show`](crate::RenderCycle::show) once the cycle has been superseded.
/// Propagate it with `?`; the cycle discards it instead of reporting it.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
#[display("rendering cycle interrupted")]
pub struct Interrupted {
    _private: (),
}
impl Interrupted {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }

    /// Returns `true` if `e` is the cancellation signal rather than a real error.
    pub fn is(e: &(dyn std::error::Error + 'static)) -> bool {
        e.downcast_ref::<Interrupted>().is_some()
    }
}

impl std::error::Error for Interrupted {}

/// Misuse of the API. These are programmer errors and are never retried.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum UsageError {
    #[display("missing call to show() prior to completion")]
    MissingShow,
    #[display("no pending show() for has_rendered()")]
    NoPendingShow,
    #[display("no rendering cycle is active in this context")]
    NoCycle,
}

impl std::error::Error for UsageError {}
