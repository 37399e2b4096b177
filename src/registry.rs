use std::{any::Any, cell::RefCell, rc::Rc};

use derive_ex::derive_ex;
use futures::task::LocalSpawnExt;

use crate::{
    ContextSlot, CycleOptions, PropOverlap, RenderConfig, RenderCycle, SeedCache, Spawner, Target,
    UsageError, slot::SlotNode,
};


/// Associates component instances with their live cycle.
///
/// Guarantees at most one live cycle per [`ContextSlot`]:
/// each acquisition either continues the cycle that asked for the render or replaces it.
#[derive_ex(Clone)]
pub struct CycleRegistry(Rc<RegistryData>);

struct RegistryData {
    spawner: Spawner,
    config: Option<RenderConfig>,
    seeds: SeedCache,
    current: RefCell<Option<Rc<dyn Any>>>,
}

impl CycleRegistry {
    /// Creates a registry using the thread-wide configuration and seed cache.
    pub fn new(spawner: Spawner) -> Self {
        Self::with_parts(spawner, None, SeedCache::global())
    }

    /// Creates a registry with a fixed configuration.
    pub fn with_config(spawner: Spawner, config: RenderConfig) -> Self {
        Self::with_parts(spawner, Some(config), SeedCache::global())
    }

    /// Creates a registry from its parts. With `config` set to `None`,
    /// the thread-wide configuration is read whenever a cycle is created.
    pub fn with_parts(spawner: Spawner, config: Option<RenderConfig>, seeds: SeedCache) -> Self {
        Self(Rc::new(RegistryData {
            spawner,
            config,
            seeds,
            current: RefCell::new(None),
        }))
    }

    pub fn spawner(&self) -> &Spawner {
        &self.0.spawner
    }
    pub fn seeds(&self) -> &SeedCache {
        &self.0.seeds
    }
    pub fn config(&self) -> RenderConfig {
        self.0.config.clone().unwrap_or_else(RenderConfig::global)
    }

    /// Returns the live cycle for the component instance of `slot`.
    ///
    /// A cycle that asked the host to render again is continued if it was started for the same target.
    /// Otherwise a new cycle is started, and a cycle still in progress is canceled first.
    /// The first cycle of an instance may be fulfilled from the seed cache.
    pub fn acquire<P, E>(
        &self,
        slot: &ContextSlot<P, E>,
        target: Target<P>,
        options: CycleOptions,
    ) -> RenderCycle<P, E>
    where
        P: PropOverlap + PartialEq + Clone + 'static,
        E: Clone + 'static,
    {
        let prev = slot.cycle();
        let continued = prev.as_ref().filter(|c| {
            c.is_rerendering() && c.target().id == target.id && c.target().props == target.props
        });
        let cycle = match continued {
            Some(cycle) => cycle.clone(),
            None => {
                if let Some(prev) = &prev {
                    if !prev.has_ended() {
                        tracing::debug!(component = %prev.target().id, "rendering cycle superseded");
                        prev.cancel();
                    }
                }
                let cycle = RenderCycle::new(
                    target,
                    prev.as_ref(),
                    options,
                    &self.config(),
                    self.0.spawner.clone(),
                    slot.downgrade(),
                );
                if prev.is_none() {
                    self.apply_seed(slot, &cycle);
                }
                slot.set_cycle(cycle.clone());
                cycle
            }
        };
        let current: Rc<dyn Any> = slot.node().clone();
        *self.0.current.borrow_mut() = Some(current);
        cycle
    }

    fn apply_seed<P, E>(&self, slot: &ContextSlot<P, E>, cycle: &RenderCycle<P, E>)
    where
        P: PropOverlap + Clone + 'static,
        E: Clone + 'static,
    {
        let target = cycle.target();
        let Some(element) = self.0.seeds.take::<P, E>(target.id, &target.props) else {
            return;
        };
        cycle.substitute(element);

        // Render again once the seeded element is in place; the slot always refers to the live cycle.
        let slot = slot.downgrade();
        let spawned = self.0.spawner.spawn_local(async move {
            if let Some(slot) = slot.upgrade() {
                slot.request_update();
            }
        });
        if let Err(e) = spawned {
            tracing::warn!(component = %target.id, "cannot schedule update after seeding: {e}");
        }
    }

    /// Returns the cycle of `slot`, or of the slot passed to the last [`acquire`](Self::acquire)
    /// if `slot` is `None`.
    ///
    /// Fails with [`UsageError::NoCycle`] if `required` and there is no cycle.
    pub fn get<P: 'static, E: 'static>(
        &self,
        required: bool,
        slot: Option<&ContextSlot<P, E>>,
    ) -> Result<Option<RenderCycle<P, E>>, UsageError> {
        let cycle = match slot {
            Some(slot) => slot.cycle(),
            None => self.current_slot::<P, E>().and_then(|slot| slot.cycle()),
        };
        match cycle {
            None if required => Err(UsageError::NoCycle),
            cycle => Ok(cycle),
        }
    }

    fn current_slot<P: 'static, E: 'static>(&self) -> Option<ContextSlot<P, E>> {
        let current = self.0.current.borrow().clone()?;
        let node = current.downcast::<SlotNode<P, E>>().ok()?;
        Some(ContextSlot::from_node(node))
    }

    /// Forgets the slot of the last [`acquire`](Self::acquire). Call when the render path returns.
    pub fn release(&self) {
        self.0.current.borrow_mut().take();
    }
}
