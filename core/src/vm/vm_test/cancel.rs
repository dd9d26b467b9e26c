use super::*;

#[test]
fn canceling_a_launched_deferred_action_emits_one_cancel_request() {
    let (shape, mut vm, mut actor) = setup(|t| {
        t.sequence(|t| {
            t.immediate_action(a);
            t.deferred_action(3, 9);
        });
    });
    let mut board = Board::default();
    assert_eq!(tick(&mut vm, &mut actor, &shape, &mut board), Launch);
    assert_eq!(requests(&mut vm, &actor), vec![(2, ActionRequestKind::Launch)]);
    assert_eq!(decider_states(&actor), vec![(0, 2)]);

    assert_eq!(vm.cancel_actor(&mut actor, &shape, &mut board, 0.0).unwrap(), Cancel);
    let mut out = Vec::new();
    assert_eq!(vm.extract_action_requests(actor.id(), &mut out), 1);
    assert_eq!(
        out,
        vec![ActorActionRequest {
            actor_id: actor.id(),
            action_id: 3,
            resource_id: 9,
            shape_atom_index: 2,
            kind: ActionRequestKind::Cancel,
        }]
    );
    assert!(actor.is_idle());
    assert_eq!(board.calls_of("a"), vec![Launch]);
}

#[test]
fn canceling_reaches_immediate_and_persistent_actions() {
    let (shape, mut vm, mut actor) = setup(|t| {
        t.concurrent(|t| {
            t.immediate_action(a);
            t.persistent_action();
        });
    });
    actor.set_persistent_state(0, Running).unwrap();
    let mut board = Board::with(&[("a", Running)]);
    assert_eq!(tick(&mut vm, &mut actor, &shape, &mut board), Running);
    assert_eq!(action_states(&actor), vec![(1, Running), (2, Running)]);

    vm.cancel_actor(&mut actor, &shape, &mut board, 0.0).unwrap();
    assert_eq!(board.calls_of("a"), vec![Launch, Cancel]);
    assert_eq!(actor.persistent_state(0), Some(Cancel));
    assert_eq!(vm.persistent_state_changes().len(), 1);
    assert!(actor.is_idle());
}

#[test]
fn cancellations_fire_highest_index_first() {
    let (shape, mut vm, mut actor) = setup(|t| {
        t.concurrent(|t| {
            t.immediate_action(a);
            t.immediate_action(b);
            t.immediate_action(c);
        });
    });
    let mut board = Board::with(&[("a", Running), ("b", Success), ("c", Running)]);
    tick(&mut vm, &mut actor, &shape, &mut board);
    board.calls.clear();

    vm.cancel_actor(&mut actor, &shape, &mut board, 0.0).unwrap();
    assert_eq!(board.calls, vec![("c", Cancel), ("a", Cancel)]);
}

#[test]
fn canceling_an_idle_actor_does_nothing() {
    let (shape, mut vm, mut actor) = setup(|t| {
        t.sequence(|t| {
            t.immediate_action(a);
            t.deferred_action(1, 1);
        });
    });
    let mut board = Board::default();

    assert_eq!(vm.cancel_actor(&mut actor, &shape, &mut board, 0.0).unwrap(), Cancel);
    assert!(board.calls.is_empty());
    assert!(requests(&mut vm, &actor).is_empty());
    assert!(actor.is_idle());
}

#[test]
fn completed_external_states_are_dropped_without_cancel() {
    let (shape, mut vm, mut actor) = setup(|t| {
        t.concurrent(|t| {
            t.deferred_action(1, 1);
            t.deferred_action(2, 1);
        });
    });
    let mut board = Board::default();
    tick(&mut vm, &mut actor, &shape, &mut board);
    requests(&mut vm, &actor);
    actor.merge_action_state(1, Success).unwrap();

    vm.cancel_actor(&mut actor, &shape, &mut board, 0.0).unwrap();
    assert_eq!(requests(&mut vm, &actor), vec![(2, ActionRequestKind::Cancel)]);
    assert!(actor.is_idle());
}
