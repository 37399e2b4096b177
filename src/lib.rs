//! Asynchronous rendering cycles for synchronous render paths.
//!
//! A [`RenderCycle`] lets a long-running producer offer placeholder elements while it works.
//! The host's render path reads whatever should be displayed right now with
//! [`RenderCycle::get_element`], and is asked to render again whenever that changes.
//!
//! [`ComponentHost`] wires an [`AsyncComponent`] to a host framework,
//! [`SaveBuffer`] keeps local edits of an upstream value, and
//! [`EventProxy`] turns callbacks into futures a producer can await.

mod config;
mod cycle;
mod delay;
mod error;
mod event;
mod event_proxy;
mod host;
mod registry;
mod save_buffer;
mod seed;
mod slot;
mod subscription;
mod target;
pub mod utils;

pub use config::*;
pub use cycle::*;
pub use delay::{Delay, Disposition};
pub use error::*;
pub use event::CycleEvent;
pub use event_proxy::*;
pub use host::*;
pub use registry::*;
pub use save_buffer::*;
pub use seed::*;
pub use slot::ContextSlot;
pub use subscription::*;
pub use target::*;
