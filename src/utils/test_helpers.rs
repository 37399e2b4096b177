use std::{cell::Cell, future::Future, rc::Rc, time::Duration};

use futures::{executor::LocalPool, future::pending};

use crate::{
    BoxError, ContextSlot, CycleOptions, CycleRegistry, Delay, PropOverlap, RenderConfig,
    RenderCycle, SeedCache, Spawner, Target, utils::timer::sleep,
};

pub struct TestComponent;

pub fn config(delay_empty_ms: u64, delay_rendered: Delay) -> RenderConfig {
    RenderConfig::new().with_delays(Delay::from_millis(delay_empty_ms), delay_rendered)
}

/// Producer that never finishes.
pub fn never<E>() -> impl Future<Output = Result<Option<E>, BoxError>> {
    pending()
}

/// Counts calls of the updater it hands out.
#[derive(Clone, Default)]
pub struct UpdateCounter(Rc<Cell<usize>>);

impl UpdateCounter {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn updater(&self) -> impl Fn() + 'static {
        let count = self.0.clone();
        move || count.set(count.get() + 1)
    }
    pub fn get(&self) -> usize {
        self.0.get()
    }

    /// Returns the count and resets it.
    pub fn take(&self) -> usize {
        self.0.replace(0)
    }
}

/// A local executor, a registry with its own seed cache, and one component slot.
pub struct Fixture<P: 'static, E: 'static> {
    pub pool: LocalPool,
    pub spawner: Spawner,
    pub registry: CycleRegistry,
    pub slot: ContextSlot<P, E>,
    pub updates: UpdateCounter,
}

impl<P: PropOverlap + PartialEq + Clone + 'static, E: Clone + 'static> Fixture<P, E> {
    pub fn new(config: RenderConfig) -> Self {
        Self::with_seeds(config, SeedCache::new())
    }
    pub fn with_seeds(config: RenderConfig, seeds: SeedCache) -> Self {
        let pool = LocalPool::new();
        let spawner: Spawner = Rc::new(pool.spawner());
        let updates = UpdateCounter::new();
        Self {
            registry: CycleRegistry::with_parts(spawner.clone(), Some(config), seeds),
            slot: ContextSlot::new(updates.updater()),
            pool,
            spawner,
            updates,
        }
    }

    pub fn acquire(&self, props: P) -> RenderCycle<P, E> {
        self.acquire_with(props, CycleOptions::default())
    }
    pub fn acquire_with(&self, props: P, options: CycleOptions) -> RenderCycle<P, E> {
        let cycle = self
            .registry
            .acquire(&self.slot, Target::of::<TestComponent>(props), options);
        self.registry.release();
        cycle
    }

    pub fn run_until_stalled(&mut self) {
        self.pool.run_until_stalled();
    }

    /// Drives spawned tasks for `ms` milliseconds of wall-clock time.
    pub fn run_for(&mut self, ms: u64) {
        self.pool.run_until(sleep(Duration::from_millis(ms)));
    }
}
