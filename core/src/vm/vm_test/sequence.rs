use super::*;

#[test]
fn sequence_of_successes_succeeds_without_continuation() {
    let (shape, mut vm, mut actor) = setup(|t| {
        t.sequence(|t| {
            t.immediate_action(a);
            t.immediate_action(b);
        });
    });
    let mut board = Board::default();

    assert_eq!(tick(&mut vm, &mut actor, &shape, &mut board), Success);
    assert_eq!(board.calls, vec![("a", Launch), ("b", Launch)]);
    assert!(actor.is_idle());
}

#[test]
fn sequence_stops_at_first_failure() {
    let (shape, mut vm, mut actor) = setup(|t| {
        t.sequence(|t| {
            t.immediate_action(a);
            t.immediate_action(b);
            t.immediate_action(c);
        });
    });
    let mut board = Board::with(&[("b", Fail)]);

    assert_eq!(tick(&mut vm, &mut actor, &shape, &mut board), Fail);
    assert!(board.calls_of("c").is_empty());
    assert!(actor.is_idle());
}

#[test]
fn running_sequence_resumes_at_reached_child() {
    let (shape, mut vm, mut actor) = setup(|t| {
        t.sequence(|t| {
            t.immediate_action(a);
            t.immediate_action(b);
            t.immediate_action(c);
        });
    });
    let mut board = Board::with(&[("b", Running)]);

    assert_eq!(tick(&mut vm, &mut actor, &shape, &mut board), Running);
    assert_eq!(decider_states(&actor), vec![(0, 2)]);
    assert_eq!(action_states(&actor), vec![(2, Running)]);

    // Still running: `a` is skipped and `b` is asked to keep running.
    assert_eq!(tick(&mut vm, &mut actor, &shape, &mut board), Running);
    assert_eq!(board.calls_of("a"), vec![Launch]);
    assert_eq!(board.calls_of("b"), vec![Launch, Running]);

    board.set("b", Success);
    assert_eq!(tick(&mut vm, &mut actor, &shape, &mut board), Success);
    assert_eq!(board.calls_of("a"), vec![Launch]);
    assert_eq!(board.calls_of("c"), vec![Launch]);
    assert!(actor.is_idle());
}

#[test]
fn reached_child_is_first_child_not_yet_succeeded() {
    let (shape, mut vm, mut actor) = setup(|t| {
        t.sequence(|t| {
            t.immediate_action(a);
            t.immediate_action(b);
            t.immediate_action(c);
        });
    });
    let mut board = Board::with(&[("c", Running)]);

    tick(&mut vm, &mut actor, &shape, &mut board);
    assert_eq!(decider_states(&actor), vec![(0, 3)]);

    // A failure after resuming forgets the continuation.
    board.set("c", Fail);
    assert_eq!(tick(&mut vm, &mut actor, &shape, &mut board), Fail);
    assert!(actor.is_idle());
}

#[test]
fn persistent_success_then_immediate_success() {
    let (shape, mut vm, mut actor) = setup(|t| {
        t.sequence(|t| {
            t.persistent_action();
            t.immediate_action(a);
        });
    });
    actor.set_persistent_state(0, Success).unwrap();
    let mut board = Board::default();

    assert_eq!(tick(&mut vm, &mut actor, &shape, &mut board), Success);
    assert_eq!(actor.decider_states().len(), 0);
    assert!(actor.is_idle());
}

#[test]
fn nested_sequences_store_states_in_ascending_order() {
    let (shape, mut vm, mut actor) = setup(|t| {
        t.concurrent(|t| {
            t.sequence(|t| {
                t.immediate_action(a);
                t.sequence(|t| {
                    t.immediate_action(b);
                });
            });
            t.sequence(|t| {
                t.immediate_action(c);
            });
        });
    });
    let mut board = Board::with(&[("b", Running), ("c", Running)]);

    assert_eq!(tick(&mut vm, &mut actor, &shape, &mut board), Running);
    assert_eq!(decider_states(&actor), vec![(1, 3), (3, 4), (5, 6)]);
    assert_eq!(action_states(&actor), vec![(4, Running), (6, Running)]);

    tick(&mut vm, &mut actor, &shape, &mut board);
    assert_eq!(board.calls_of("a"), vec![Launch]);
    assert_eq!(board.calls_of("b"), vec![Launch, Running]);
}

#[test]
fn extracting_twice_is_a_fixed_point() {
    let (shape, mut vm, mut actor) = setup(|t| {
        t.dynamic_priority(|t| {
            t.immediate_action(a);
            t.sequence(|t| {
                t.immediate_action(b);
                t.persistent_action();
            });
        });
    });
    actor.set_persistent_state(0, Success).unwrap();
    let mut board = Board::with(&[("a", Fail)]);

    assert_eq!(tick(&mut vm, &mut actor, &shape, &mut board), Success);
    let after_tick = actor.clone();
    vm.extract_actor_state(&mut actor, &shape);
    assert_eq!(actor, after_tick);

    tick(&mut vm, &mut actor, &shape, &mut board);
    assert_eq!(actor, after_tick);
}
