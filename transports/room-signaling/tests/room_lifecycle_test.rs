//! Integration tests for room membership, kick and teardown

mod harness;

use harness::{message_to, MockMediaSource, TestRoom};
use room_signaling::{
    Coordinator, CoordinatorConfig, CoordinatorEvent, Error, ErrorCode, NotificationKind,
    ParticipantId, RelayEvent, RelayRequest, Role, RoomId, SignalMessage,
};
use std::sync::Arc;

#[tokio::test]
async fn test_join_twice_sends_one_request_and_notifies() {
    let mut room = TestRoom::start();
    room.create_room("r1", "a").await;

    room.handle.join_room("r2").unwrap();

    match room.next_event().await {
        CoordinatorEvent::Notification { kind, message } => {
            assert_eq!(kind, NotificationKind::AlreadyInRoom);
            assert_eq!(
                message,
                CoordinatorConfig::default().notifications.already_in_room
            );
        }
        other => panic!("expected notification, got {:?}", other),
    }
    room.assert_no_events().await;
    room.assert_no_requests().await;
}

#[tokio::test]
async fn test_join_blank_room_id_notifies() {
    let mut room = TestRoom::start();

    room.handle.join_room("   ").unwrap();

    assert!(matches!(
        room.next_event().await,
        CoordinatorEvent::Notification {
            kind: NotificationKind::MissingRoomId,
            ..
        }
    ));
    room.assert_no_requests().await;
}

#[tokio::test]
async fn test_join_waits_for_relay_confirmation() {
    let mut room = TestRoom::start();

    room.handle.join_room("r1").unwrap();
    assert_eq!(
        room.next_request().await,
        RelayRequest::CreateOrJoin {
            room: RoomId::new("r1")
        }
    );

    // Nothing changes locally until the relay answers
    assert_eq!(room.handle.room_id().await.unwrap(), None);
    room.assert_no_events().await;
}

#[tokio::test]
async fn test_created_makes_admin_initiator() {
    let mut room = TestRoom::start();
    room.create_room("r1", "a").await;

    let session = room.handle.session().await.unwrap();
    assert_eq!(session.room_id(), Some(&RoomId::new("r1")));
    assert_eq!(session.local_participant_id(), Some(&ParticipantId::new("a")));
    assert!(session.is_initiator());
    assert!(session.is_admin());
    assert!(!session.is_ready());

    assert!(room.handle.is_admin().await.unwrap());
    assert_eq!(
        room.handle.local_participant_id().await.unwrap(),
        Some(ParticipantId::new("a"))
    );
}

#[tokio::test]
async fn test_joined_makes_ready_responder() {
    let mut room = TestRoom::start();
    room.join_existing_room("r1", "b").await;

    let session = room.handle.session().await.unwrap();
    assert_eq!(session.room_id(), Some(&RoomId::new("r1")));
    assert_eq!(session.role(), Role::Responder);
    assert!(session.is_ready());
    assert!(!session.is_admin());
}

#[tokio::test]
async fn test_participant_arrival_marks_creator_ready() {
    let mut room = TestRoom::start();
    room.create_room("r1", "a").await;
    assert!(!room.handle.session().await.unwrap().is_ready());

    room.participant_arrives("r1").await;

    assert!(room.handle.session().await.unwrap().is_ready());
}

#[tokio::test]
async fn test_leave_when_not_in_room_notifies() {
    let mut room = TestRoom::start();

    room.handle.leave_room().unwrap();

    assert!(matches!(
        room.next_event().await,
        CoordinatorEvent::Notification {
            kind: NotificationKind::NotInRoom,
            ..
        }
    ));
    room.assert_no_requests().await;
}

#[tokio::test]
async fn test_leave_room_tears_down_on_confirmation() {
    let mut room = TestRoom::start();
    room.ready_initiator("r1", "a").await;
    room.handle.connect("b").unwrap();
    room.next_request().await;

    room.handle.leave_room().unwrap();
    assert_eq!(
        room.next_request().await,
        RelayRequest::LeaveRoom {
            room: RoomId::new("r1")
        }
    );

    // Initiator role dropped right away, membership kept until confirmed
    let session = room.handle.session().await.unwrap();
    assert_eq!(session.role(), Role::Responder);
    assert_eq!(session.room_id(), Some(&RoomId::new("r1")));
    assert_eq!(room.handle.participants().await.unwrap().len(), 1);

    room.deliver(RelayEvent::LeftRoom {
        room: RoomId::new("r1"),
    });

    assert!(matches!(
        room.next_event().await,
        CoordinatorEvent::ParticipantRemoved {
            participant_id: None
        }
    ));
    match room.next_event().await {
        CoordinatorEvent::RoomLeft { room_id } => assert_eq!(room_id, RoomId::new("r1")),
        other => panic!("expected room left, got {:?}", other),
    }

    assert!(room.factory.engine("b").unwrap().is_closed());
    assert!(room.handle.participants().await.unwrap().is_empty());
    let session = room.handle.session().await.unwrap();
    assert_eq!(session.room_id(), None);
    assert!(!session.is_admin());
    assert!(session.local_media().is_some());
}

#[tokio::test]
async fn test_left_room_for_other_room_is_ignored() {
    let mut room = TestRoom::start();
    room.create_room("r1", "a").await;

    room.deliver(RelayEvent::LeftRoom {
        room: RoomId::new("other"),
    });

    room.assert_no_events().await;
    assert_eq!(
        room.handle.room_id().await.unwrap(),
        Some(RoomId::new("r1"))
    );
}

#[tokio::test]
async fn test_rejoin_after_leaving() {
    let mut room = TestRoom::start();
    room.create_room("r1", "a").await;
    room.handle.leave_room().unwrap();
    room.next_request().await;
    room.deliver(RelayEvent::LeftRoom {
        room: RoomId::new("r1"),
    });
    room.drain_events().await;

    room.join_existing_room("r2", "a2").await;

    let session = room.handle.session().await.unwrap();
    assert_eq!(session.room_id(), Some(&RoomId::new("r2")));
    assert!(!session.is_admin());
}

#[tokio::test]
async fn test_kick_by_non_admin_is_refused() {
    let mut room = TestRoom::start();
    room.join_existing_room("r1", "b").await;

    room.handle.kick_participant("a").unwrap();

    assert!(matches!(
        room.next_event().await,
        CoordinatorEvent::Notification {
            kind: NotificationKind::NotAdmin,
            ..
        }
    ));
    room.assert_no_events().await;
    room.assert_no_requests().await;
}

#[tokio::test]
async fn test_admin_kick_removes_and_relays() {
    let mut room = TestRoom::start();
    room.ready_initiator("r1", "a").await;
    room.handle.connect("b").unwrap();
    room.next_request().await;

    room.handle.kick_participant("b").unwrap();

    match room.next_event().await {
        CoordinatorEvent::ParticipantRemoved { participant_id } => {
            assert_eq!(participant_id, Some(ParticipantId::new("b")))
        }
        other => panic!("expected removal, got {:?}", other),
    }
    assert_eq!(
        room.next_request().await,
        RelayRequest::Kickout {
            participant: ParticipantId::new("b"),
            room: RoomId::new("r1"),
        }
    );
    assert!(room.factory.engine("b").unwrap().is_closed());
    assert!(room.handle.participants().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_kickout_naming_self_tears_down() {
    let mut room = TestRoom::start();
    room.ready_responder("r1", "b").await;
    room.message("a", SignalMessage::GotStream);
    room.message("c", SignalMessage::GotStream);
    room.settle().await;
    assert_eq!(room.handle.participants().await.unwrap().len(), 2);

    room.deliver(RelayEvent::Kickout {
        participant: ParticipantId::new("b"),
    });

    assert!(matches!(room.next_event().await, CoordinatorEvent::Kicked));
    assert!(matches!(
        room.next_event().await,
        CoordinatorEvent::ParticipantRemoved {
            participant_id: None
        }
    ));
    room.assert_no_events().await;

    assert!(room.factory.engine("a").unwrap().is_closed());
    assert!(room.factory.engine("c").unwrap().is_closed());
    assert!(room.handle.participants().await.unwrap().is_empty());
    assert_eq!(room.handle.room_id().await.unwrap(), None);
}

#[tokio::test]
async fn test_kickout_naming_other_removes_only_them() {
    let mut room = TestRoom::start();
    room.ready_responder("r1", "b").await;
    room.message("a", SignalMessage::GotStream);
    room.message("c", SignalMessage::GotStream);
    room.settle().await;

    room.deliver(RelayEvent::Kickout {
        participant: ParticipantId::new("c"),
    });

    match room.next_event().await {
        CoordinatorEvent::ParticipantRemoved { participant_id } => {
            assert_eq!(participant_id, Some(ParticipantId::new("c")))
        }
        other => panic!("expected removal, got {:?}", other),
    }
    assert_eq!(
        room.handle.participants().await.unwrap(),
        vec![ParticipantId::new("a")]
    );
    assert_eq!(
        room.handle.room_id().await.unwrap(),
        Some(RoomId::new("r1"))
    );
}

#[tokio::test]
async fn test_remove_unknown_participant_still_emits() {
    let mut room = TestRoom::start();

    room.handle
        .remove_participant(Some(ParticipantId::new("ghost")))
        .unwrap();

    match room.next_event().await {
        CoordinatorEvent::ParticipantRemoved { participant_id } => {
            assert_eq!(participant_id, Some(ParticipantId::new("ghost")))
        }
        other => panic!("expected removal, got {:?}", other),
    }
    assert_eq!(room.factory.created_count(), 0);
}

#[tokio::test]
async fn test_full_teardown_empties_registry() {
    let mut room = TestRoom::start();
    room.ready_responder("r1", "b").await;
    room.message("a", SignalMessage::GotStream);
    room.message("c", SignalMessage::GotStream);
    room.settle().await;
    room.factory
        .engine("a")
        .unwrap()
        .sink()
        .track(room_signaling::RemoteStream::new("stream-a"));
    room.drain_events().await;

    room.handle.remove_participant(None).unwrap();
    assert!(matches!(
        room.next_event().await,
        CoordinatorEvent::ParticipantRemoved {
            participant_id: None
        }
    ));
    assert!(room.handle.participants().await.unwrap().is_empty());
    assert!(room.handle.peers().await.unwrap().is_empty());

    let closed_calls = room.factory.engine("a").unwrap().calls().len();
    room.handle
        .remove_participant(Some(ParticipantId::new("a")))
        .unwrap();
    assert!(matches!(
        room.next_event().await,
        CoordinatorEvent::ParticipantRemoved {
            participant_id: Some(_)
        }
    ));
    assert_eq!(room.factory.engine("a").unwrap().calls().len(), closed_calls);
}

#[tokio::test]
async fn test_signal_stream_ready() {
    let mut room = TestRoom::start();

    room.handle.signal_stream_ready().unwrap();
    assert!(matches!(
        room.next_event().await,
        CoordinatorEvent::Notification {
            kind: NotificationKind::JoinBeforeStream,
            ..
        }
    ));
    room.assert_no_requests().await;

    room.create_room("r1", "a").await;
    room.handle.signal_stream_ready().unwrap();
    assert_eq!(
        room.next_request().await,
        RelayRequest::broadcast(RoomId::new("r1"), SignalMessage::GotStream)
    );
}

#[tokio::test]
async fn test_media_failure_is_reported() {
    let mut room = TestRoom::start_with(
        CoordinatorConfig::default(),
        MockMediaSource { fail: true },
    );

    let result = room
        .handle
        .acquire_local_media(Default::default(), Default::default())
        .await;
    assert!(matches!(result, Err(Error::MediaError(_))));

    match room.next_event().await {
        CoordinatorEvent::Error(e) => {
            assert_eq!(e.code, ErrorCode::Media);
            assert_eq!(e.participant_id, None);
        }
        other => panic!("expected error, got {:?}", other),
    }
    assert!(room.handle.local_media().await.unwrap().is_none());

    // Non-media operations keep working
    room.create_room("r1", "a").await;
}

#[tokio::test]
async fn test_media_acquisition_is_kept() {
    let room = TestRoom::start();

    let media = room.acquire_media().await;

    let kept = room.handle.local_media().await.unwrap().unwrap();
    assert_eq!(kept.id(), media.id());
}

#[tokio::test]
async fn test_ready_reassigns_initiator_when_in_call() {
    let mut room = TestRoom::start();
    room.ready_responder("r1", "b").await;

    // Not in a call yet: no reassignment
    room.deliver(RelayEvent::Ready {
        participant: ParticipantId::new("c"),
    });
    room.settle().await;
    assert!(!room.handle.session().await.unwrap().is_initiator());

    room.message("a", SignalMessage::GotStream);
    room.message(
        "a",
        SignalMessage::Candidate {
            label: Some(0),
            id: None,
            candidate: "candidate:1 1 udp 1 10.0.0.1 5000 typ host".to_string(),
        },
    );

    // Our own readiness never promotes us
    room.deliver(RelayEvent::Ready {
        participant: ParticipantId::new("b"),
    });
    room.settle().await;
    assert!(!room.handle.session().await.unwrap().is_initiator());

    room.deliver(RelayEvent::Ready {
        participant: ParticipantId::new("c"),
    });
    room.settle().await;
    assert!(room.handle.session().await.unwrap().is_initiator());
}

#[tokio::test]
async fn test_relay_log_produces_no_events() {
    let mut room = TestRoom::start();

    room.deliver(RelayEvent::Log {
        args: vec![serde_json::json!("Room r1 now has"), serde_json::json!(2)],
    });

    room.assert_no_events().await;
    room.assert_no_requests().await;
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let (relay, _requests) = room_signaling::ChannelRelay::new();
    let config = CoordinatorConfig {
        max_participants: 0,
        ..Default::default()
    };

    let result = Coordinator::spawn(
        config,
        Arc::new(relay),
        Arc::new(harness::MockEngineFactory::default()),
        Arc::new(MockMediaSource::default()),
    );

    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}

#[tokio::test]
async fn test_shutdown_closes_engines_and_handle() {
    let mut room = TestRoom::start();
    room.ready_initiator("r1", "a").await;
    room.handle.connect("b").unwrap();
    assert_eq!(
        room.next_request().await,
        message_to("b", SignalMessage::Offer {
            sdp: "offer-for-b".to_string()
        })
    );

    room.handle.shutdown().await.unwrap();
    (&mut room.task).await.unwrap();

    assert!(room.factory.engine("b").unwrap().is_closed());
    assert!(room.handle.is_closed());
    assert!(matches!(
        room.handle.join_room("r2"),
        Err(Error::CoordinatorClosed)
    ));
    assert!(matches!(
        room.handle.session().await,
        Err(Error::CoordinatorClosed)
    ));
    assert!(room.inbox.deliver(RelayEvent::Join { room: RoomId::new("r1") }).is_err());
}
