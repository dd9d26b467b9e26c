use super::*;

fn single_deferred() -> (Shape<Board>, Vm, Actor) {
    setup(|t| {
        t.deferred_action(42, 7);
    })
}

#[test]
fn first_visit_launches() {
    let (shape, mut vm, mut actor) = single_deferred();
    let mut board = Board::default();

    assert_eq!(tick(&mut vm, &mut actor, &shape, &mut board), Launch);
    assert_eq!(vm.launch_requests().len(), 1);
    assert_eq!(vm.launch_requests()[0].action_id, 42);
    assert_eq!(vm.launch_requests()[0].resource_id, 7);
    assert_eq!(action_states(&actor), vec![(0, Launch)]);
}

#[test]
fn launched_or_running_state_keeps_running_without_relaunch() {
    let (shape, mut vm, mut actor) = single_deferred();
    let mut board = Board::default();
    tick(&mut vm, &mut actor, &shape, &mut board);
    requests(&mut vm, &actor);

    // Not yet confirmed by the deferred system.
    assert_eq!(tick(&mut vm, &mut actor, &shape, &mut board), Running);
    assert!(requests(&mut vm, &actor).is_empty());
    assert_eq!(action_states(&actor), vec![(0, Running)]);

    actor.merge_action_state(0, Running).unwrap();
    assert_eq!(tick(&mut vm, &mut actor, &shape, &mut board), Running);
    assert!(requests(&mut vm, &actor).is_empty());
}

#[test]
fn reported_completion_is_the_result() {
    let (shape, mut vm, mut actor) = single_deferred();
    let mut board = Board::default();
    tick(&mut vm, &mut actor, &shape, &mut board);
    requests(&mut vm, &actor);

    actor.merge_action_state(0, Fail).unwrap();
    assert_eq!(tick(&mut vm, &mut actor, &shape, &mut board), Fail);
    assert!(actor.is_idle());
    assert!(requests(&mut vm, &actor).is_empty());

    // Next tick starts over.
    assert_eq!(tick(&mut vm, &mut actor, &shape, &mut board), Launch);
    assert_eq!(requests(&mut vm, &actor), vec![(0, ActionRequestKind::Launch)]);
}

#[test]
fn unrequested_cancel_counts_as_failure() {
    let (shape, mut vm, mut actor) = single_deferred();
    let mut board = Board::default();
    tick(&mut vm, &mut actor, &shape, &mut board);
    actor.merge_action_state(0, Cancel).unwrap();

    assert_eq!(tick(&mut vm, &mut actor, &shape, &mut board), Fail);
    assert!(actor.is_idle());
}

#[test]
fn completed_deferred_action_lets_the_sequence_continue() {
    let (shape, mut vm, mut actor) = setup(|t| {
        t.sequence(|t| {
            t.deferred_action(1, 0);
            t.immediate_action(a);
        });
    });
    let mut board = Board::default();
    assert_eq!(tick(&mut vm, &mut actor, &shape, &mut board), Launch);
    assert!(board.calls.is_empty());

    actor.merge_action_state(1, Success).unwrap();
    assert_eq!(tick(&mut vm, &mut actor, &shape, &mut board), Success);
    assert_eq!(board.calls_of("a"), vec![Launch]);
    assert!(actor.is_idle());
}
