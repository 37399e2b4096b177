use std::time::Duration;

use parse_display::Display;
use serde::{Deserialize, Serialize};


/// How long a progress element waits before it becomes visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Delay {
    /// Disclose after the given duration. `Duration::ZERO` discloses at once.
    After(Duration),

    /// Never disclose on a timer; only on demand.
    Never,
}
impl Delay {
    pub const ZERO: Self = Delay::After(Duration::ZERO);

    pub const fn from_millis(ms: u64) -> Self {
        Delay::After(Duration::from_millis(ms))
    }
    pub fn is_zero(self) -> bool {
        self == Self::ZERO
    }
}
impl std::fmt::Display for Delay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Delay::After(d) => write!(f, "{d:?}"),
            Delay::Never => write!(f, "never"),
        }
    }
}
impl From<Duration> for Delay {
    fn from(value: Duration) -> Self {
        Delay::After(value)
    }
}

impl Serialize for Delay {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        match self {
            Delay::After(d) => {
                // Round up so that a nonzero delay never becomes immediate.
                let ms = u64::try_from(d.as_nanos().div_ceil(1_000_000))
                    .map_err(|_| serde::ser::Error::custom("delay out of range"))?;
                serializer.serialize_u64(ms)
            }
            Delay::Never => serializer.serialize_none(),
        }
    }
}
impl<'de> Deserialize<'de> for Delay {
    fn deserialize<D>(deserializer: D) -> Result<Delay, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        Ok(match Option::<u64>::deserialize(deserializer)? {
            Some(ms) => Delay::from_millis(ms),
            None => Delay::Never,
        })
    }
}

/// Hint passed to [`RenderCycle::show`](crate::RenderCycle::show).
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[display(style = "snake_case")]
pub enum Disposition {
    /// Use the configured delays.
    #[default]
    Default,

    /// Disclose at once if nothing has been rendered yet.
    Initial,

    /// Always disclose at once.
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Disclosure {
    pub delay: Delay,
    pub forced: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DisclosureState {
    pub rendered: bool,
    pub showing_progress: bool,
    pub fulfilled: bool,
}

pub(crate) fn disclosure(
    disposition: Disposition,
    state: DisclosureState,
    delay_empty: Delay,
    delay_rendered: Delay,
) -> Disclosure {
    let forced = match disposition {
        Disposition::Always => true,
        Disposition::Initial => !state.rendered,
        Disposition::Default => false,
    };
    let delay = if forced || state.showing_progress {
        Delay::ZERO
    } else if !state.fulfilled {
        delay_empty
    } else {
        delay_rendered
    };
    Disclosure { delay, forced }
}
