use super::*;

/// Two priority selectors each holding a launched deferred action, plus a gated launch.
fn gated_shape() -> (Shape<Board>, Vm, Actor) {
    setup(|t| {
        t.concurrent(|t| {
            t.dynamic_priority(|t| {
                t.immediate_action(a);
                t.deferred_action(30, 0);
            });
            t.dynamic_priority(|t| {
                t.immediate_action(b);
                t.deferred_action(60, 0);
            });
            t.dynamic_priority(|t| {
                t.sequence(|t| {
                    t.immediate_action(c);
                    t.deferred_action(100, 0);
                });
                t.immediate_action(e);
            });
        });
    })
}

#[test]
fn cancels_come_first_most_recent_first_then_launches() {
    let (shape, mut vm, mut actor) = gated_shape();
    let mut board = Board::with(&[("a", Fail), ("b", Fail), ("c", Fail)]);
    assert_eq!(tick(&mut vm, &mut actor, &shape, &mut board), Running);
    assert_eq!(
        requests(&mut vm, &actor),
        vec![(3, ActionRequestKind::Launch), (6, ActionRequestKind::Launch)]
    );

    board.set("a", Success);
    board.set("b", Success);
    board.set("c", Success);
    assert_eq!(tick(&mut vm, &mut actor, &shape, &mut board), Running);
    assert_eq!(vm.cancel_requests().len(), 2);
    assert_eq!(vm.launch_requests().len(), 1);
    assert_eq!(
        requests(&mut vm, &actor),
        vec![
            (6, ActionRequestKind::Cancel),
            (3, ActionRequestKind::Cancel),
            (10, ActionRequestKind::Launch),
        ]
    );
    assert_eq!(decider_states(&actor), vec![(8, 10)]);
    assert_eq!(action_states(&actor), vec![(10, Launch)]);
}

#[test]
fn extraction_empties_the_queue_and_tags_the_actor() {
    let (shape, mut vm, mut actor) = gated_shape();
    let mut board = Board::with(&[("a", Fail), ("b", Fail), ("c", Fail)]);
    tick(&mut vm, &mut actor, &shape, &mut board);

    let mut out = vec![ActorActionRequest {
        actor_id: 99,
        action_id: 0,
        resource_id: 0,
        shape_atom_index: 0,
        kind: ActionRequestKind::Cancel,
    }];
    assert_eq!(vm.extract_action_requests(5, &mut out), 2);
    assert_eq!(out.len(), 3);
    assert!(out[1..].iter().all(|request| request.actor_id == 5));
    assert_eq!(out[1].action_id, 30);
    assert_eq!(out[2].action_id, 60);

    assert_eq!(vm.extract_action_requests(5, &mut out), 0);
}

#[test]
fn slice_extraction_checks_room() {
    let (shape, mut vm, mut actor) = gated_shape();
    let mut board = Board::with(&[("a", Fail), ("b", Fail), ("c", Fail)]);
    tick(&mut vm, &mut actor, &shape, &mut board);

    let blank = ActorActionRequest {
        actor_id: 0,
        action_id: 0,
        resource_id: 0,
        shape_atom_index: 0,
        kind: ActionRequestKind::Launch,
    };
    let mut small = [blank; 1];
    let err = vm.extract_action_requests_into(actor.id(), &mut small).unwrap_err();
    assert!(err.to_string().contains("2 requests are queued"), "{err}");

    let mut exact = [blank; 2];
    assert_eq!(vm.extract_action_requests_into(actor.id(), &mut exact).unwrap(), 2);
    assert_eq!(exact[0].shape_atom_index, 3);
    assert_eq!(exact[1].shape_atom_index, 6);
    assert_eq!(vm.extract_action_requests_into(actor.id(), &mut exact).unwrap(), 0);
}

#[test]
fn unextracted_requests_are_dropped_by_the_next_update() {
    let (shape, mut vm, mut actor) = gated_shape();
    let mut board = Board::with(&[("a", Fail), ("b", Fail), ("c", Fail)]);
    tick(&mut vm, &mut actor, &shape, &mut board);
    assert_eq!(vm.launch_requests().len(), 2);

    let mut other = Actor::new(2, &shape);
    tick(&mut vm, &mut other, &shape, &mut board);
    let mut out = Vec::new();
    vm.extract_action_requests(other.id(), &mut out);
    assert_eq!(out.len(), 2);
    assert!(out.iter().all(|request| request.actor_id == 2));
}
