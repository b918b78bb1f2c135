use std::collections::BTreeMap;

use mesh_pierced::containers::PiercedVector;
use mesh_pierced::debug_invariants::DebugInvariants;
use mesh_pierced::id::EntityId;
use mesh_pierced::pierced_error::PiercedError;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

fn eid(raw: u64) -> EntityId {
    EntityId::new(raw).unwrap()
}

/// Random inserts, erasures and compactions against a map model.
fn churn(seed: u64, steps: usize) {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut v: PiercedVector<u64, EntityId> = PiercedVector::new();
    let mut model: BTreeMap<EntityId, u64> = BTreeMap::new();

    for step in 0..steps {
        let id = eid(rng.gen_range(1..200));
        match rng.gen_range(0..10) {
            0..=3 => {
                let value = rng.r#gen::<u64>();
                let res = v.insert(id, value);
                if model.contains_key(&id) {
                    assert!(matches!(res, Err(PiercedError::DuplicateId(_))));
                } else {
                    res.unwrap();
                    model.insert(id, value);
                }
            }
            4 => {
                let reference = model.keys().nth(rng.gen_range(0..model.len().max(1))).copied();
                if let Some(reference) = reference {
                    if !model.contains_key(&id) {
                        let value = step as u64;
                        if rng.gen_bool(0.5) {
                            v.insert_before(id, reference, value).unwrap();
                        } else {
                            v.insert_after(id, reference, value).unwrap();
                        }
                        model.insert(id, value);
                    }
                }
            }
            5..=7 => match model.remove(&id) {
                Some(value) => assert_eq!(v.erase(id), Ok(value)),
                None => assert_eq!(v.erase(id), Err(PiercedError::NotFound(format!("{id:?}")))),
            },
            8 => {
                if let Some(x) = v.get_mut(id) {
                    *x = x.wrapping_add(1);
                    let m = model.get_mut(&id).unwrap();
                    *m = m.wrapping_add(1);
                }
            }
            _ => {
                let before: Vec<EntityId> = v.ids().collect();
                let c = v.flush().unwrap();
                assert_eq!(v.ids().collect::<Vec<_>>(), before);
                assert_eq!(v.capacity(), v.len());
                assert_eq!(c.remap.iter().flatten().count(), v.len());
            }
        }
        assert_eq!(v.len(), model.len());
    }

    for (id, value) in &model {
        assert_eq!(v.get(*id), Some(value));
    }
    let mut seen: Vec<EntityId> = v.ids().collect();
    seen.sort();
    assert_eq!(seen, model.keys().copied().collect::<Vec<_>>());
    v.validate_invariants().unwrap();
}

#[test]
fn seeded_churn_matches_model() {
    for seed in [1, 7, 42, 1234] {
        churn(seed, 2_000);
    }
}

#[test]
fn positions_are_stable_between_flushes() {
    let mut rng = SmallRng::seed_from_u64(99);
    let mut v: PiercedVector<u32, u32> = (0..64).map(|i| (i, i * 10)).collect();
    let mut positions: Vec<(u32, usize)> = (0..64).map(|i| (i, v.find(i).unwrap())).collect();

    for _ in 0..32 {
        let victim = rng.gen_range(0..64);
        let _ = v.erase(victim);
        positions.retain(|&(id, _)| id != victim);
        for &(id, pos) in &positions {
            assert_eq!(v.find(id), Some(pos), "{} moved without a flush", id);
        }
    }

    let c = v.flush().unwrap();
    for (id, old) in positions {
        assert_eq!(v.find(id), c.remap[old]);
        assert_eq!(v[id], id * 10);
    }
}

#[test]
fn resize_growth_leaves_reusable_holes() {
    let mut v: PiercedVector<String, u32> = PiercedVector::new();
    v.push_back(1, "one".into()).unwrap();
    v.resize(4).unwrap();
    assert_eq!(v.capacity(), 4);
    assert_eq!(v.len(), 1);
    assert!(v.kernel().is_dirty());

    v.insert(2, "two".into()).unwrap();
    v.push_back(3, "three".into()).unwrap();
    assert_eq!(v.find(2), Some(1));
    assert_eq!(v.find(3), Some(2));
    assert_eq!(v.capacity(), 4);

    assert!(matches!(v.resize(2), Err(PiercedError::InUse { .. })));
    v.squeeze().unwrap();
    assert_eq!(v.capacity(), 3);
    assert_eq!(
        v.values().map(String::as_str).collect::<Vec<_>>(),
        vec!["one", "two", "three"]
    );
}
