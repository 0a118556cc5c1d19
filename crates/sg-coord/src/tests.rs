//! Unit tests for the coordination controller.

use std::sync::Arc;

use sg_core::{AgentId, Cell, SimRng, Tick, VectorClock};
use sg_net::{Message, MessageKind};
use sg_plan::{ReservationKey, ReservationTable};

use crate::{
    AgentController, DEADLOCK_THRESHOLD, LOOKAHEAD, STATE_BROADCAST_INTERVAL,
    STOPPED_DEADLOCK_THRESHOLD, STOPPED_PATH_LEN,
};

fn ids(n: usize) -> Vec<AgentId> {
    let mut rng = SimRng::new(5);
    (0..n).map(|_| AgentId::generate(&mut rng)).collect()
}

fn cell(x: i32, y: i32) -> Cell {
    Cell::new(x, y)
}

fn announcement(from: AgentId, path: Vec<Cell>, timestamp: u64, clock: VectorClock) -> Message {
    let next = path.first().copied().unwrap_or(cell(0, 0));
    Message::announcement(
        from,
        MessageKind::PathAnnouncement,
        next,
        Tick(timestamp),
        path,
        clock,
    )
}

fn clock_of(entries: &[(AgentId, u64)]) -> VectorClock {
    let mut c = VectorClock::new();
    for &(a, v) in entries {
        c.set(a, v);
    }
    c
}

#[cfg(test)]
mod rebuild_tests {
    use super::*;

    #[test]
    fn announcement_committed_at_its_timestamp() {
        let agents = ids(2);
        let mut ctrl = AgentController::new(agents[0], cell(0, 0));

        let msg = announcement(
            agents[1],
            vec![cell(3, 0), cell(4, 0)],
            4,
            clock_of(&[(agents[1], 1)]),
        );
        ctrl.ingest(&[msg], Tick(5));

        let res = &ctrl.local_reservations;
        assert_eq!(res.owner(cell(3, 0), Tick(4)), Some(agents[1]));
        assert_eq!(res.owner(cell(4, 0), Tick(5)), Some(agents[1]));
        // Goal hold extends past the path.
        assert_eq!(res.owner(cell(4, 0), Tick(6)), Some(agents[1]));
        // Intent bookkeeping.
        assert_eq!(ctrl.known_intents.get(&agents[1]), Some(&cell(3, 0)));
    }

    #[test]
    fn rebuild_discards_stale_view_each_tick() {
        let agents = ids(2);
        let mut ctrl = AgentController::new(agents[0], cell(0, 0));

        let msg = announcement(agents[1], vec![cell(1, 1)], 0, clock_of(&[(agents[1], 1)]));
        ctrl.ingest(&[msg], Tick(0));
        assert_eq!(ctrl.local_reservations.owner(cell(1, 1), Tick(0)), Some(agents[1]));

        // Next tick nothing arrives: the peer's claims are gone.
        ctrl.ingest(&[], Tick(1));
        assert_eq!(ctrl.local_reservations.owner(cell(1, 1), Tick(0)), None);
    }

    #[test]
    fn own_remaining_path_survives_rebuild() {
        let agents = ids(1);
        let mut ctrl = AgentController::new(agents[0], cell(0, 0));
        ctrl.install_path(vec![cell(0, 0), cell(1, 0), cell(2, 0)], Tick(0));
        ctrl.path_index = 1; // first step executed

        ctrl.ingest(&[], Tick(1));
        let res = &ctrl.local_reservations;
        assert_eq!(res.owner(cell(1, 0), Tick(1)), Some(agents[0]));
        assert_eq!(res.owner(cell(2, 0), Tick(2)), Some(agents[0]));
        // The consumed prefix is not re-claimed.
        assert_eq!(res.owner(cell(0, 0), Tick(0)), None);
    }

    #[test]
    fn broadcast_round_trips_into_peer_view() {
        let agents = ids(2);
        let mut sender = AgentController::new(agents[0], cell(0, 0));
        sender.install_path(vec![cell(0, 0), cell(1, 0)], Tick(0));
        let msgs = sender.make_broadcast(cell(0, 0), false, false, Tick(0));

        let mut receiver = AgentController::new(agents[1], cell(5, 5));
        receiver.ingest(&msgs, Tick(1));
        let res = &receiver.local_reservations;
        assert_eq!(res.owner(cell(0, 0), Tick(0)), Some(agents[0]));
        assert_eq!(res.owner(cell(1, 0), Tick(1)), Some(agents[0]));
    }

    #[test]
    fn empty_announcement_claims_nothing() {
        let agents = ids(2);
        let mut ctrl = AgentController::new(agents[0], cell(0, 0));
        let msg = announcement(agents[1], vec![], 0, clock_of(&[(agents[1], 1)]));
        ctrl.ingest(&[msg], Tick(0));
        assert!(ctrl.local_reservations.is_empty());
    }
}

#[cfg(test)]
mod sync_tests {
    use super::*;

    fn sync(from: AgentId, seq: u64, state: ReservationTable, clock: VectorClock) -> Message {
        let mut msg = Message::state_sync(from, cell(0, 0), Tick(seq), Arc::new(state), clock);
        msg.sequence_number = seq;
        msg
    }

    fn table_with(key: ReservationKey, owner: AgentId) -> ReservationTable {
        let mut t = ReservationTable::new();
        t.insert(key, owner);
        t
    }

    #[test]
    fn sync_adopts_unknown_claims() {
        let agents = ids(2);
        let mut ctrl = AgentController::new(agents[0], cell(0, 0));
        let key = ReservationKey::new(cell(7, 7), Tick(9));

        let msg = sync(
            agents[1],
            3,
            table_with(key, agents[1]),
            clock_of(&[(agents[1], 1)]),
        );
        ctrl.ingest(&[msg], Tick(3));

        assert_eq!(ctrl.local_reservations.get(&key), Some(agents[1]));
        assert_eq!(ctrl.last_seen_sequence.get(&agents[1]), Some(&3));
        assert_eq!(ctrl.last_state_received, Tick(3));
    }

    #[test]
    fn stale_sequence_rejected() {
        let agents = ids(2);
        let mut ctrl = AgentController::new(agents[0], cell(0, 0));
        let key_a = ReservationKey::new(cell(1, 0), Tick(1));
        let key_b = ReservationKey::new(cell(2, 0), Tick(2));

        let first = sync(
            agents[1],
            10,
            table_with(key_a, agents[1]),
            clock_of(&[(agents[1], 1)]),
        );
        ctrl.ingest(&[first], Tick(10));

        // Same sequence again (a redundant copy): must be ignored.
        let replay = sync(
            agents[1],
            10,
            table_with(key_b, agents[1]),
            clock_of(&[(agents[1], 2)]),
        );
        ctrl.ingest(&[replay], Tick(11));
        assert_eq!(ctrl.local_reservations.get(&key_b), None);
        assert_eq!(ctrl.last_seen_sequence.get(&agents[1]), Some(&10));

        // A newer sequence is accepted.
        let newer = sync(
            agents[1],
            11,
            table_with(key_b, agents[1]),
            clock_of(&[(agents[1], 3)]),
        );
        ctrl.ingest(&[newer], Tick(12));
        assert_eq!(ctrl.local_reservations.get(&key_b), Some(agents[1]));
    }

    #[test]
    fn contested_key_resolved_by_incoming_clock() {
        let agents = ids(4);
        let (me, announcer, syncer, other) = (agents[0], agents[1], agents[2], agents[3]);
        let key = ReservationKey::new(cell(5, 5), Tick(8));

        // The announcer claims (5,5)@8 directly...
        let ann = announcement(announcer, vec![cell(5, 5)], 8, clock_of(&[(announcer, 1)]));
        // ...then a sync says `other` holds the same key, with a larger
        // clock component for `other` than for the announcer.
        let s = sync(
            syncer,
            1,
            {
                let mut t = ReservationTable::new();
                t.insert(key, other);
                t
            },
            clock_of(&[(other, 9), (announcer, 2)]),
        );

        let mut ctrl = AgentController::new(me, cell(0, 0));
        ctrl.ingest(&[ann, s], Tick(8));
        assert_eq!(ctrl.local_reservations.get(&key), Some(other));
    }

    #[test]
    fn contested_key_keeps_holder_with_larger_component() {
        let agents = ids(4);
        let (me, announcer, syncer, other) = (agents[0], agents[1], agents[2], agents[3]);
        let key = ReservationKey::new(cell(5, 5), Tick(8));

        let ann = announcement(announcer, vec![cell(5, 5)], 8, clock_of(&[(announcer, 1)]));
        let s = sync(
            syncer,
            1,
            {
                let mut t = ReservationTable::new();
                t.insert(key, other);
                t
            },
            clock_of(&[(other, 1), (announcer, 6)]),
        );

        let mut ctrl = AgentController::new(me, cell(0, 0));
        ctrl.ingest(&[ann, s], Tick(8));
        assert_eq!(ctrl.local_reservations.get(&key), Some(announcer));
    }

    #[test]
    fn contested_key_tie_goes_to_smaller_id() {
        let agents = ids(4);
        let (me, syncer) = (agents[0], agents[1]);
        let (low, high) = if agents[2] < agents[3] {
            (agents[2], agents[3])
        } else {
            (agents[3], agents[2])
        };
        let key = ReservationKey::new(cell(2, 2), Tick(4));

        let first = sync(
            syncer,
            1,
            {
                let mut t = ReservationTable::new();
                t.insert(key, high);
                t
            },
            clock_of(&[(low, 3), (high, 3)]),
        );
        let second = sync(
            syncer,
            2,
            {
                let mut t = ReservationTable::new();
                t.insert(key, low);
                t
            },
            clock_of(&[(low, 3), (high, 3)]),
        );

        let mut ctrl = AgentController::new(me, cell(0, 0));
        ctrl.ingest(&[first, second], Tick(4));
        assert_eq!(ctrl.local_reservations.get(&key), Some(low));
    }
}

#[cfg(test)]
mod conflict_tests {
    use super::*;

    /// Controller with an installed straight path along y = 0.
    fn moving_controller(id: AgentId) -> AgentController {
        let mut ctrl = AgentController::new(id, cell(0, 0));
        ctrl.install_path(vec![cell(0, 0), cell(1, 0), cell(2, 0), cell(3, 0)], Tick(0));
        ctrl
    }

    #[test]
    fn yields_when_sender_clock_is_ahead() {
        let agents = ids(2);
        let mut ctrl = moving_controller(agents[0]);

        // Peer announces a path sharing our offset-1 cell, with a clock
        // far ahead of ours.
        let msg = announcement(
            agents[1],
            vec![cell(9, 9), cell(1, 0)],
            0,
            clock_of(&[(agents[1], 50)]),
        );
        let yields = ctrl.ingest(&[msg], Tick(0));
        assert_eq!(yields, 1);
        assert!(ctrl.needs_replan);
    }

    #[test]
    fn holds_course_when_sender_clock_is_behind() {
        let agents = ids(2);
        let mut ctrl = moving_controller(agents[0]);
        ctrl.local_clock = 50;
        ctrl.vector_clock.set(agents[0], 50);

        let msg = announcement(
            agents[1],
            vec![cell(9, 9), cell(1, 0)],
            0,
            clock_of(&[(agents[1], 1)]),
        );
        let yields = ctrl.ingest(&[msg], Tick(0));
        assert_eq!(yields, 0);
        assert!(!ctrl.needs_replan);
    }

    #[test]
    fn disjoint_paths_do_not_conflict() {
        let agents = ids(2);
        let mut ctrl = moving_controller(agents[0]);

        let msg = announcement(
            agents[1],
            vec![cell(5, 5), cell(6, 5)],
            0,
            clock_of(&[(agents[1], 50)]),
        );
        assert_eq!(ctrl.ingest(&[msg], Tick(0)), 0);
        assert!(!ctrl.needs_replan);
    }

    #[test]
    fn crossing_at_different_offsets_is_not_a_vertex_conflict() {
        let agents = ids(2);
        let mut ctrl = moving_controller(agents[0]);

        // The peer visits (1,0) — a cell on our path — but one step later
        // than we do.
        let msg = announcement(
            agents[1],
            vec![cell(8, 8), cell(8, 7), cell(1, 0)],
            0,
            clock_of(&[(agents[1], 50)]),
        );
        assert_eq!(ctrl.ingest(&[msg], Tick(0)), 0);
    }

    #[test]
    fn stale_announcement_is_age_shifted() {
        let agents = ids(2);
        let mut ctrl = AgentController::new(agents[0], cell(0, 0));
        ctrl.install_path(vec![cell(0, 0), cell(1, 0), cell(2, 0), cell(3, 0)], Tick(0));
        ctrl.path_index = 1; // remaining cells line up with ticks 1, 2, 3

        // Sent at tick 0, ingested at tick 1: the peer reaches (2,0) at
        // tick 2, exactly when we do — index 2 on their path, index 1 on
        // our remaining suffix.
        let msg = announcement(
            agents[1],
            vec![cell(9, 9), cell(9, 8), cell(2, 0)],
            0,
            clock_of(&[(agents[1], 5)]),
        );
        assert_eq!(ctrl.ingest(&[msg], Tick(1)), 1);
        assert!(ctrl.needs_replan);
    }

    #[test]
    fn equal_clocks_yield_exactly_one_side() {
        let agents = ids(2);
        let (a, b) = (agents[0], agents[1]);

        let mut ctrl_a = AgentController::new(a, cell(0, 0));
        ctrl_a.install_path(vec![cell(0, 0), cell(1, 0)], Tick(0));
        ctrl_a.local_clock = 1;
        ctrl_a.vector_clock.set(a, 1);

        let mut ctrl_b = AgentController::new(b, cell(2, 0));
        ctrl_b.install_path(vec![cell(2, 0), cell(1, 0)], Tick(0));
        ctrl_b.local_clock = 1;
        ctrl_b.vector_clock.set(b, 1);

        // Mirror-image head-on announcements with equal clock components.
        let from_b = announcement(b, vec![cell(2, 0), cell(1, 0)], 0, clock_of(&[(b, 1)]));
        let from_a = announcement(a, vec![cell(0, 0), cell(1, 0)], 0, clock_of(&[(a, 1)]));

        let a_yields = ctrl_a.ingest(&[from_b], Tick(0)) > 0;
        let b_yields = ctrl_b.ingest(&[from_a], Tick(0)) > 0;
        assert_ne!(a_yields, b_yields, "exactly one side must yield");
    }

    #[test]
    fn overlap_beyond_lookahead_is_ignored() {
        let agents = ids(2);
        let mut ctrl = AgentController::new(agents[0], cell(0, 0));

        // Two long parallel columns that only meet past the lookahead
        // window.
        let len = LOOKAHEAD + 3;
        let ours: Vec<Cell> = (0..len as i32).map(|i| cell(0, i)).collect();
        let mut theirs: Vec<Cell> = (0..len as i32).map(|i| cell(5, i)).collect();
        theirs[LOOKAHEAD + 1] = ours[LOOKAHEAD + 1];

        ctrl.install_path(ours, Tick(0));
        let msg = announcement(agents[1], theirs, 0, clock_of(&[(agents[1], 50)]));
        assert_eq!(ctrl.ingest(&[msg], Tick(0)), 0);
    }
}

#[cfg(test)]
mod broadcast_tests {
    use super::*;

    #[test]
    fn moving_agent_announces_remaining_suffix() {
        let agents = ids(1);
        let mut ctrl = AgentController::new(agents[0], cell(0, 0));
        ctrl.install_path(vec![cell(0, 0), cell(1, 0), cell(2, 0)], Tick(0));
        ctrl.path_index = 1;

        let msgs = ctrl.make_broadcast(cell(0, 0), false, false, Tick(1));
        assert_eq!(msgs.len(), 1);
        let msg = &msgs[0];
        assert_eq!(msg.kind, MessageKind::PathAnnouncement);
        assert_eq!(msg.planned_path, vec![cell(1, 0), cell(2, 0)]);
        assert_eq!(msg.next, cell(1, 0));
        assert_eq!(msg.sequence_number, 1);
        assert!(msg.full_state.is_none());
    }

    #[test]
    fn parked_agent_pads_its_cell() {
        let agents = ids(1);
        let mut ctrl = AgentController::new(agents[0], cell(4, 4));

        let msgs = ctrl.make_broadcast(cell(4, 4), true, false, Tick(2));
        let msg = &msgs[0];
        assert_eq!(msg.kind, MessageKind::GoalReached);
        assert_eq!(msg.planned_path.len(), STOPPED_PATH_LEN);
        assert!(msg.planned_path.iter().all(|&c| c == cell(4, 4)));
    }

    #[test]
    fn stopped_agent_pads_as_announcement() {
        let agents = ids(1);
        let mut ctrl = AgentController::new(agents[0], cell(3, 3));

        let msgs = ctrl.make_broadcast(cell(3, 3), false, true, Tick(2));
        let msg = &msgs[0];
        assert_eq!(msg.kind, MessageKind::PathAnnouncement);
        assert_eq!(msg.planned_path.len(), STOPPED_PATH_LEN);
    }

    #[test]
    fn state_sync_attached_on_interval() {
        let agents = ids(1);
        let mut ctrl = AgentController::new(agents[0], cell(0, 0));

        let msgs = ctrl.make_broadcast(cell(0, 0), false, false, Tick(STATE_BROADCAST_INTERVAL));
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[1].kind, MessageKind::StateSync);
        assert!(msgs[1].full_state.is_some());
        assert_eq!(ctrl.last_state_broadcast, Tick(STATE_BROADCAST_INTERVAL));

        // The very next tick is quiet again.
        let msgs = ctrl.make_broadcast(cell(0, 0), false, false, Tick(STATE_BROADCAST_INTERVAL + 1));
        assert_eq!(msgs.len(), 1);
    }

    #[test]
    fn state_sync_attached_when_peer_state_is_stale() {
        let agents = ids(1);
        let mut ctrl = AgentController::new(agents[0], cell(0, 0));
        // Recent broadcast, but nothing heard from peers for 16 ticks.
        ctrl.last_state_broadcast = Tick(12);

        let msgs = ctrl.make_broadcast(cell(0, 0), false, false, Tick(16));
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[1].kind, MessageKind::StateSync);
    }

    #[test]
    fn clock_component_grows_with_each_broadcast() {
        let agents = ids(1);
        let mut ctrl = AgentController::new(agents[0], cell(0, 0));

        let first = ctrl.make_broadcast(cell(0, 0), false, false, Tick(1));
        let second = ctrl.make_broadcast(cell(0, 0), false, false, Tick(2));
        let c1 = first[0].vector_clock.get(agents[0]);
        let c2 = second[0].vector_clock.get(agents[0]);
        assert!(c2 > c1);
    }
}

#[cfg(test)]
mod stuckness_tests {
    use super::*;

    #[test]
    fn stuck_counter_tracks_immobility() {
        let agents = ids(1);
        let mut ctrl = AgentController::new(agents[0], cell(0, 0));

        for t in 1..=3 {
            ctrl.observe_position(cell(0, 0), Tick(t));
        }
        assert_eq!(ctrl.stuck_counter, 3);

        ctrl.observe_position(cell(1, 0), Tick(4));
        assert_eq!(ctrl.stuck_counter, 0);
        assert_eq!(ctrl.last_successful_move, Tick(4));
        assert_eq!(ctrl.last_position, cell(1, 0));
    }

    #[test]
    fn deadlock_thresholds() {
        let agents = ids(1);
        let mut ctrl = AgentController::new(agents[0], cell(0, 0));

        ctrl.stuck_counter = STOPPED_DEADLOCK_THRESHOLD;
        assert!(ctrl.is_deadlocked(true));
        assert!(!ctrl.is_deadlocked(false));

        ctrl.stuck_counter = DEADLOCK_THRESHOLD;
        assert!(ctrl.is_deadlocked(false));
    }

    #[test]
    fn reset_for_replan_clears_plan_and_claims() {
        let agents = ids(2);
        let mut ctrl = AgentController::new(agents[0], cell(0, 0));
        ctrl.install_path(vec![cell(0, 0), cell(1, 0)], Tick(0));
        ctrl.local_reservations
            .insert(ReservationKey::new(cell(9, 9), Tick(9)), agents[1]);
        ctrl.stuck_counter = 7;

        ctrl.reset_for_replan(4);
        assert!(ctrl.current_path.is_empty());
        assert!(ctrl.needs_replan);
        assert_eq!(ctrl.stuck_counter, 0);
        assert_eq!(ctrl.wait_counter, 4);
        assert_eq!(ctrl.local_reservations.agent_entry_count(agents[0]), 0);
        // Peer claims survive.
        assert_eq!(
            ctrl.local_reservations.get(&ReservationKey::new(cell(9, 9), Tick(9))),
            Some(agents[1])
        );
    }
}
