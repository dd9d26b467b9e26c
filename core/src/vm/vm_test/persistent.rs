use super::*;

#[test]
fn slot_value_is_the_result() {
    let (shape, mut vm, mut actor) = setup(|t| {
        t.persistent_action();
    });
    let mut board = Board::default();

    assert_eq!(tick(&mut vm, &mut actor, &shape, &mut board), Fail);
    actor.set_persistent_state(0, Success).unwrap();
    assert_eq!(tick(&mut vm, &mut actor, &shape, &mut board), Success);
    assert!(actor.is_idle());

    actor.set_persistent_state(0, Cancel).unwrap();
    assert_eq!(tick(&mut vm, &mut actor, &shape, &mut board), Fail);
}

#[test]
fn active_slot_runs_and_is_tracked() {
    let (shape, mut vm, mut actor) = setup(|t| {
        t.sequence(|t| {
            t.persistent_action();
            t.persistent_action();
        });
    });
    actor.set_persistent_state(0, Success).unwrap();
    actor.set_persistent_state(1, Launch).unwrap();
    let mut board = Board::default();

    assert_eq!(tick(&mut vm, &mut actor, &shape, &mut board), Running);
    assert_eq!(action_states(&actor), vec![(2, Launch)]);
    assert_eq!(decider_states(&actor), vec![(0, 2)]);

    actor.set_persistent_state(1, Success).unwrap();
    assert_eq!(tick(&mut vm, &mut actor, &shape, &mut board), Success);
    assert!(actor.is_idle());
}

#[test]
fn superseded_persistent_action_is_marked_canceled() {
    let (shape, mut vm, mut actor) = setup(|t| {
        t.dynamic_priority(|t| {
            t.immediate_action(a);
            t.persistent_action();
        });
    });
    actor.set_persistent_state(0, Running).unwrap();
    let mut board = Board::with(&[("a", Fail)]);
    assert_eq!(tick(&mut vm, &mut actor, &shape, &mut board), Running);

    board.set("a", Success);
    assert_eq!(tick(&mut vm, &mut actor, &shape, &mut board), Success);
    assert_eq!(vm.persistent_state_changes().len(), 1);
    assert_eq!(vm.persistent_state_changes()[0].shape_atom_index, 2);
    assert_eq!(actor.persistent_state(0), Some(Cancel));
    assert!(actor.is_idle());
}

#[test]
fn persistent_changes_come_out_ascending() {
    let (shape, mut vm, mut actor) = setup(|t| {
        t.concurrent(|t| {
            t.persistent_action();
            t.sequence(|t| {
                t.persistent_action();
                t.persistent_action();
            });
            t.persistent_action();
        });
    });
    for slot in 0..4 {
        actor.set_persistent_state(slot, Running).unwrap();
    }
    actor.set_persistent_state(1, Success).unwrap();
    let mut board = Board::default();
    assert_eq!(tick(&mut vm, &mut actor, &shape, &mut board), Running);
    assert_eq!(action_states(&actor), vec![(1, Running), (4, Running), (5, Running)]);

    vm.cancel_actor(&mut actor, &shape, &mut board, 0.0).unwrap();
    let changed: Vec<_> = vm
        .persistent_state_changes()
        .iter()
        .map(|change| change.shape_atom_index)
        .collect();
    assert_eq!(changed, vec![1, 4, 5]);
    assert_eq!(actor.persistent_states(), &[Cancel, Success, Cancel, Cancel]);
}
