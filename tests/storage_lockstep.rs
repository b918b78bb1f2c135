//! Storages following a kernel through direct commits and through the
//! journal must end up with identical slots, whatever the op sequence.

use std::collections::HashMap;

use mesh_pierced::containers::{PiercedKernel, PiercedStorage, SyncAction};
use mesh_pierced::debug_invariants::DebugInvariants;
use mesh_pierced::pierced_error::PiercedError;
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Insert(u32),
    Append(u32),
    Before(u32, usize),
    After(u32, usize),
    Erase(usize),
    Flush,
    Sort,
    Swap(usize, usize),
    Grow(usize),
    Shrink,
    Rekey(usize, u32),
    Clear,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u32..48).prop_map(Op::Insert),
        3 => (0u32..48).prop_map(Op::Append),
        2 => (0u32..48, any::<usize>()).prop_map(|(id, r)| Op::Before(id, r)),
        2 => (0u32..48, any::<usize>()).prop_map(|(id, r)| Op::After(id, r)),
        5 => any::<usize>().prop_map(Op::Erase),
        2 => prop_oneof![Just(Op::Flush), Just(Op::Sort)],
        1 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Swap(a, b)),
        2 => prop_oneof![(1usize..4).prop_map(Op::Grow), Just(Op::Shrink)],
        1 => (any::<usize>(), 48u32..96).prop_map(|(i, id)| Op::Rekey(i, id)),
        1 => Just(Op::Clear),
    ]
}

/// Outcome of one op: the action to mirror and the id that was bound, if any.
type Step = Result<(SyncAction, Option<u32>), PiercedError>;

fn apply(k: &mut PiercedKernel<u32>, op: &Op, model: &mut HashMap<u32, u32>) -> Option<Step> {
    let live: Vec<u32> = k.ids().collect();
    let pick = |i: usize| (!live.is_empty()).then(|| live[i % live.len()]);
    let step = match *op {
        Op::Insert(id) => k.insert(id).map(|a| (a, Some(id))),
        Op::Append(id) => k.insert_append(id).map(|a| (a, Some(id))),
        Op::Before(id, r) => k.insert_before(id, pick(r)?).map(|a| (a, Some(id))),
        Op::After(id, r) => k.insert_after(id, pick(r)?).map(|a| (a, Some(id))),
        Op::Erase(i) => {
            let id = pick(i)?;
            model.remove(&id);
            k.erase(id).map(|a| (a, None))
        }
        Op::Flush => Ok((k.flush().action, None)),
        Op::Sort => Ok((k.sort().action, None)),
        Op::Swap(a, b) => k.swap(pick(a)?, pick(b)?).map(|a| (a, None)),
        Op::Grow(extra) => k.resize(k.capacity() + extra).map(|a| (a, None)),
        Op::Shrink => k.resize(k.live_end()).map(|a| (a, None)),
        Op::Rekey(i, new) => {
            let old = pick(i)?;
            let step = k.update_id(old, new).map(|()| (SyncAction::Noop, None));
            if step.is_ok() {
                if let Some(tag) = model.remove(&old) {
                    model.insert(new, tag);
                }
            }
            step
        }
        Op::Clear => {
            model.clear();
            Ok((k.clear(), None))
        }
    };
    Some(step)
}

fn run(ops: &[Op]) {
    let mut k = PiercedKernel::<u32>::new();
    let (mut eager, eager_h) = PiercedStorage::<u32>::attach(&mut k, 1).unwrap();
    let (mut lazy, lazy_h) = PiercedStorage::<u32>::attach(&mut k, 2).unwrap();
    let mut direct = PiercedStorage::<u32>::for_kernel(&k, 1).unwrap();
    let mut model: HashMap<u32, u32> = HashMap::new();
    let mut tag = 0u32;

    for op in ops {
        let before_len = k.len();
        let Some(step) = apply(&mut k, op, &mut model) else {
            continue;
        };
        match step {
            Ok((action, bound)) => {
                direct.commit(&action).unwrap();
                if let Some(id) = bound {
                    tag += 1;
                    eager.sync(&mut k, eager_h).unwrap();
                    let pos = k.position(id).unwrap();
                    eager.set(pos, 0, tag).unwrap();
                    direct.set(pos, 0, tag).unwrap();
                    model.insert(id, tag);
                }
            }
            Err(_) => assert_eq!(k.len(), before_len, "failed {:?} changed the kernel", op),
        }
        assert_eq!(direct.capacity(), k.capacity());
    }

    eager.sync(&mut k, eager_h).unwrap();
    lazy.sync(&mut k, lazy_h).unwrap();
    assert!(k.journal().is_empty(), "every handle acknowledged");

    assert_eq!(eager.as_slice(), direct.as_slice());
    assert!(lazy.check_sync(&k).is_ok());
    assert!(lazy.as_slice().iter().all(|&v| v == 0));
    assert_eq!(model.len(), k.len());
    for (id, pos) in k.iter() {
        assert_eq!(eager.get(pos, 0), Ok(&model[&id]), "payload of {} drifted", id);
    }
    for pos in (0..k.capacity()).filter(|&p| k.is_hole(p)) {
        assert_eq!(direct.get(pos, 0), Ok(&0), "hole {} kept a payload", pos);
    }
    k.validate_invariants().unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn journaled_and_direct_storages_agree(ops in prop::collection::vec(op(), 0..80)) {
        run(&ops);
    }
}

#[test]
fn erase_heavy_sequence_merges_in_journal() {
    let ops: Vec<Op> = (0..16)
        .map(Op::Append)
        .chain((0..8).map(|_| Op::Erase(3)))
        .chain([Op::Insert(100), Op::Flush, Op::Before(101, 0)])
        .collect();
    run(&ops);
}

#[test]
fn clear_mid_sequence_resets_everyone() {
    run(&[
        Op::Append(1),
        Op::Append(2),
        Op::Grow(3),
        Op::Clear,
        Op::Insert(7),
        Op::After(8, 0),
        Op::Erase(0),
    ]);
}
