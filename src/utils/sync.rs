pub(crate) mod settle_once;

pub(crate) use settle_once::{Settled, Settler, settle_once};
