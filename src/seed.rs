use std::{
    any::Any,
    cell::RefCell,
    collections::{BTreeMap, HashMap},
    hash::{BuildHasher, Hash},
    rc::Rc,
};

use derive_ex::derive_ex;

use crate::TargetId;

#[cfg(test)]
mod tests;

/// Similarity of two props values, used to pick the closest seed.
pub trait PropOverlap {
    /// Returns the number of top-level props of `self` that have an equal value in `other`.
    fn overlap(&self, other: &Self) -> usize;
}

impl<K: Ord, V: PartialEq> PropOverlap for BTreeMap<K, V> {
    fn overlap(&self, other: &Self) -> usize {
        self.iter()
            .filter(|(k, v)| other.get(*k) == Some(*v))
            .count()
    }
}
impl<K: Eq + Hash, V: PartialEq, S: BuildHasher> PropOverlap for HashMap<K, V, S> {
    fn overlap(&self, other: &Self) -> usize {
        self.iter()
            .filter(|(k, v)| other.get(*k) == Some(*v))
            .count()
    }
}
impl PropOverlap for () {
    fn overlap(&self, _other: &Self) -> usize {
        0
    }
}

// Scalar props count as a single prop.
macro_rules! impl_prop_overlap_for_scalar {
    ($($t:ty),*) => {
        $(impl PropOverlap for $t {
            fn overlap(&self, other: &Self) -> usize {
                usize::from(self == other)
            }
        })*
    };
}
impl_prop_overlap_for_scalar!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, String, &str
);

/// A precomputed result for the first cycle of a matching component.
pub struct Seed {
    target: TargetId,
    props: Box<dyn Any>,
    result: Box<dyn Any>,
}
impl Seed {
    pub fn new<T: ?Sized + 'static, P: 'static, E: 'static>(props: P, result: E) -> Self {
        Self::for_target(TargetId::of::<T>(), props, result)
    }
    pub fn for_target<P: 'static, E: 'static>(target: TargetId, props: P, result: E) -> Self {
        Self {
            target,
            props: Box::new(props),
            result: Box::new(result),
        }
    }
    pub fn target(&self) -> TargetId {
        self.target
    }
}
impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Seed")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

thread_local! {
    static GLOBAL: SeedCache = SeedCache::new();
}

/// List of seeds waiting to be consumed. Each seed is consumed at most once.
#[derive_ex(Clone, Default)]
#[default(Self::new())]
pub struct SeedCache(Rc<RefCell<Vec<Seed>>>);

impl SeedCache {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(Vec::new())))
    }

    /// Returns the thread-wide seed cache.
    pub fn global() -> Self {
        GLOBAL.with(|g| g.clone())
    }

    /// Replaces the seeds.
    pub fn plant(&self, seeds: impl IntoIterator<Item = Seed>) {
        *self.0.borrow_mut() = seeds.into_iter().collect();
        tracing::debug!(count = self.len(), "seeds planted");
    }
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    /// Removes and returns the result of the seed closest to `props`.
    ///
    /// Only seeds for `target` whose props and result types match are considered.
    /// The seed sharing the most props wins; the earlier seed wins a tie.
    pub fn take<P: PropOverlap + 'static, E: 'static>(
        &self,
        target: TargetId,
        props: &P,
    ) -> Option<E> {
        let mut seeds = self.0.borrow_mut();
        let mut best: Option<(usize, usize)> = None;
        for (index, seed) in seeds.iter().enumerate() {
            if seed.target != target || !seed.result.is::<E>() {
                continue;
            }
            let Some(seed_props) = seed.props.downcast_ref::<P>() else {
                continue;
            };
            let count = props.overlap(seed_props);
            if best.is_none_or(|(_, best_count)| count > best_count) {
                best = Some((index, count));
            }
        }
        let (index, _) = best?;
        let seed = seeds.remove(index);
        tracing::debug!(component = %target, "seed consumed");
        seed.result.downcast::<E>().ok().map(|result| *result)
    }
}

/// Replaces the seeds of the thread-wide seed cache.
pub fn plant(seeds: impl IntoIterator<Item = Seed>) {
    SeedCache::global().plant(seeds)
}
