use proptest::prelude::*;

use super::*;
use crate::state::next_random;

/// Blackboard for randomized runs; outcomes come from the actor's seed.
#[derive(Debug, Default)]
struct Chaos;

fn chaotic(_: &mut Chaos, seed: &mut RandomSeed, _: Time, requested: ExecutionState) -> ExecutionState {
    if requested == Cancel {
        return Cancel;
    }
    match next_random(seed) % 3 {
        0 => Success,
        1 => Fail,
        _ => Running,
    }
}

/// Append one node driven by `ops`, recursing into deciders up to a fixed depth.
fn grow(builder: &mut ShapeBuilder<Chaos>, ops: &[u8], cursor: &mut usize, depth: usize) {
    let op = ops[*cursor % ops.len()];
    *cursor += 1;
    let kind = if depth >= 4 { op % 3 } else { op % 6 };
    match kind {
        0 => {
            builder.immediate_action(chaotic);
        }
        1 => {
            builder.deferred_action(op as u32, depth as u32);
        }
        2 => {
            builder.persistent_action();
        }
        _ => {
            let children = 1 + (op / 6) as usize % 3;
            let add_children = |b: &mut ShapeBuilder<Chaos>| {
                for _ in 0..children {
                    grow(b, ops, &mut *cursor, depth + 1);
                }
            };
            match kind {
                3 => builder.sequence(add_children),
                4 => builder.dynamic_priority(add_children),
                _ => builder.concurrent(add_children),
            };
        }
    }
}

fn random_shape(ops: &[u8]) -> Shape<Chaos> {
    let mut builder = ShapeBuilder::new();
    let mut cursor = 0;
    builder.concurrent(|b| {
        grow(b, ops, &mut cursor, 1);
        grow(b, ops, &mut cursor, 1);
    });
    builder.build().expect("generated shape is valid")
}

fn strictly_ascending(indices: &[ShapeAtomIndex]) -> bool {
    indices.windows(2).all(|pair| pair[0] < pair[1])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn ticks_keep_actor_state_sorted_and_within_capacity(
        ops in proptest::collection::vec(any::<u8>(), 1..48),
        seed in any::<u64>(),
        persistent in proptest::collection::vec(0u8..5, 0..16),
        settle in proptest::collection::vec(0u8..4, 0..32),
    ) {
        let shape = random_shape(&ops);
        let mut vm = Vm::for_shape(&shape);
        let mut actor = Actor::new(3, &shape).with_random_seed(seed);
        for (slot, tag) in persistent.iter().enumerate().take(actor.persistent_states().len()) {
            let state = ExecutionState::from_u8(*tag).unwrap_or(Fail);
            actor.set_persistent_state(slot, state).unwrap();
        }
        let mut board = Chaos;
        let mut requests = Vec::new();

        for round in 0..4 {
            vm.update_actor(&mut actor, &shape, &mut board, round as Time).unwrap();
            prop_assert!(strictly_ascending(actor.decider_state_shape_atom_indices()));
            prop_assert!(strictly_ascending(actor.action_state_shape_atom_indices()));
            prop_assert!(actor.action_states().iter().all(|state| state.is_active()));

            requests.clear();
            let count = vm.extract_action_requests(actor.id(), &mut requests);
            prop_assert!(count <= shape.specification().action_request_capacity as usize);

            // Let the deferred system resolve some of the outstanding actions.
            let outstanding: Vec<ShapeAtomIndex> = actor.action_state_shape_atom_indices().to_vec();
            for (index, verdict) in outstanding.into_iter().zip(settle.iter().skip(round)) {
                if matches!(shape.atom(index), Some(crate::shape::ShapeAtom::DeferredAction { .. })) {
                    let state = match *verdict {
                        0 => Success,
                        1 => Fail,
                        _ => Running,
                    };
                    actor.merge_action_state(index, state).unwrap();
                }
            }
        }

        let outstanding_deferred = actor
            .action_state_shape_atom_indices()
            .iter()
            .zip(actor.action_states())
            .filter(|(index, state)| {
                state.is_active()
                    && matches!(shape.atom(**index), Some(crate::shape::ShapeAtom::DeferredAction { .. }))
            })
            .count();
        vm.cancel_actor(&mut actor, &shape, &mut board, 9.0).unwrap();
        prop_assert!(actor.is_idle());
        requests.clear();
        vm.extract_action_requests(actor.id(), &mut requests);
        prop_assert_eq!(requests.len(), outstanding_deferred);
        prop_assert!(requests.iter().all(|request| request.kind == ActionRequestKind::Cancel));
    }
}
