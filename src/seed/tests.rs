use std::collections::BTreeMap;

use pretty_assertions::assert_eq;

use super::*;

struct A;
struct B;

fn props(items: &[(&'static str, i32)]) -> BTreeMap<&'static str, i32> {
    items.iter().copied().collect()
}

#[test]
fn overlap_counts_equal_values() {
    let a = props(&[("x", 1), ("y", 2), ("z", 3)]);
    let b = props(&[("x", 1), ("y", 5)]);
    assert_eq!(a.overlap(&b), 1);
    assert_eq!(a.overlap(&a), 3);
    assert_eq!(a.overlap(&BTreeMap::new()), 0);
}

#[test]
fn picks_highest_overlap_and_consumes_it() {
    let cache = SeedCache::new();
    cache.plant([
        Seed::new::<A, _, _>(props(&[("x", 1), ("y", 2)]), "R1"),
        Seed::new::<A, _, _>(props(&[("x", 1)]), "R2"),
    ]);
    let request = props(&[("x", 1), ("y", 2)]);
    assert_eq!(cache.take::<_, &str>(TargetId::of::<A>(), &request), Some("R1"));
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.take::<_, &str>(TargetId::of::<A>(), &request), Some("R2"));
    assert_eq!(cache.take::<_, &str>(TargetId::of::<A>(), &request), None);
}

#[test]
fn tie_goes_to_first_seen() {
    let cache = SeedCache::new();
    cache.plant([
        Seed::new::<A, _, _>(props(&[("x", 1)]), "first"),
        Seed::new::<A, _, _>(props(&[("x", 1), ("y", 9)]), "second"),
    ]);
    let request = props(&[("x", 1), ("y", 2)]);
    assert_eq!(cache.take::<_, &str>(TargetId::of::<A>(), &request), Some("first"));
}

#[test]
fn ignores_other_targets_and_types() {
    let cache = SeedCache::new();
    cache.plant([
        Seed::new::<B, _, _>(props(&[("x", 1)]), "other target"),
        Seed::new::<A, _, _>(props(&[("x", 1)]), 10_u32),
        Seed::new::<A, _, _>("not a map", "other props"),
    ]);
    let request = props(&[("x", 1)]);
    assert_eq!(cache.take::<_, &str>(TargetId::of::<A>(), &request), None);
    assert_eq!(cache.len(), 3);
}

#[test]
fn plant_replaces_previous_seeds() {
    let cache = SeedCache::new();
    cache.plant([Seed::new::<A, _, _>((), 1)]);
    cache.plant([Seed::new::<B, _, _>((), 2)]);
    assert_eq!(cache.take::<(), i32>(TargetId::of::<A>(), &()), None);
    assert_eq!(cache.take::<(), i32>(TargetId::of::<B>(), &()), Some(2));
    assert!(cache.is_empty());
}

#[test]
fn global_cache_is_shared() {
    plant([Seed::new::<A, _, _>((), "global")]);
    assert_eq!(
        SeedCache::global().take::<(), &str>(TargetId::of::<A>(), &()),
        Some("global")
    );
}
