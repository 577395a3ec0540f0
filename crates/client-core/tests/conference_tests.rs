//! Conference sessions against a scripted MCU: join, confirmed mute flow,
//! mixed stream announcements, subscriptions, and room broadcast.

mod common;

use common::*;
use rtclink_client_core::{
    ClientError, LocalStream, SessionState, StreamSourceInfo, TrackKind,
};
use rtclink_signaling_core::LoopbackHub;

#[tokio::test]
async fn join_runs_the_invite_handshake_against_the_room() {
    let hub = LoopbackHub::new();
    let mcu = FakeMcu::spawn(&hub, "room-1").await;
    let alice = connected_client(&hub, "alice").await;

    alice.join("room-1").await.expect("join succeeds");
    wait_for_state(&alice, "room-1", SessionState::Connected).await;
    mcu.log.wait_for("invite:alice").await;
}

#[tokio::test]
async fn confirmed_mute_fires_once_per_observer_in_registration_order() {
    let hub = LoopbackHub::new();
    let mcu = FakeMcu::spawn(&hub, "room-1").await;
    let alice = connected_client(&hub, "alice").await;

    alice.join("room-1").await.expect("join");
    wait_for_state(&alice, "room-1", SessionState::Connected).await;

    let stream = LocalStream::new(StreamSourceInfo::microphone_and_camera());
    let publication = alice
        .publish(&stream, "room-1", None)
        .await
        .expect("publish");
    mcu.log.wait_for(&format!("publish:{}", stream.id())).await;

    let flow_log = EventLog::new();
    publication
        .add_observer(FlowRecorder::new("first", flow_log.clone()))
        .await;
    publication
        .add_observer(FlowRecorder::new("second", flow_log.clone()))
        .await;

    // The call returns when the request is sent; state flips on the ack.
    publication.mute(TrackKind::Video).await.expect("mute");
    flow_log.wait_for("first:mute:video").await;
    flow_log.wait_for("second:mute:video").await;
    assert!(publication.is_muted(TrackKind::Video));
    assert!(!publication.is_muted(TrackKind::Audio));

    settle().await;
    assert_eq!(flow_log.count_of("first:mute:video").await, 1);
    assert_eq!(flow_log.count_of("second:mute:video").await, 1);
    assert_eq!(
        flow_log.entries().await,
        vec!["first:mute:video", "second:mute:video"]
    );

    // A repeated ack for the same state changes nothing.
    publication.mute(TrackKind::Video).await.expect("mute again");
    settle().await;
    assert_eq!(flow_log.count_of("first:mute:video").await, 1);

    publication.unmute(TrackKind::Video).await.expect("unmute");
    flow_log.wait_for("first:unmute:video").await;
    assert!(!publication.is_muted(TrackKind::Video));
}

#[tokio::test]
async fn mixed_stream_announcement_can_be_subscribed() {
    let hub = LoopbackHub::new();
    let mcu = FakeMcu::spawn(&hub, "room-1").await;
    let alice = connected_client(&hub, "alice").await;

    let alice_log = EventLog::new();
    alice.add_observer(Recorder::new(alice_log.clone())).await;

    alice.join("room-1").await.expect("join");
    wait_for_state(&alice, "room-1", SessionState::Connected).await;

    mcu.announce_stream("alice", mixed_stream_info("mix-1", "grid"))
        .await;
    alice_log.wait_for("stream-added:mix-1").await;

    let stream = alice.remote_stream("mix-1").await.expect("stream known");
    assert!(stream.is_mixed());
    assert_eq!(stream.viewport(), Some("grid"));
    assert_eq!(stream.origin(), "");

    let subscription = alice.subscribe(&stream, None).await.expect("subscribe");
    mcu.log.wait_for("subscribe:mix-1").await;

    let flow_log = EventLog::new();
    subscription
        .add_observer(FlowRecorder::new("sub", flow_log.clone()))
        .await;

    // The server retires the stream; the subscription ends exactly once
    // and the handle leaves the registry.
    mcu.end_stream("alice", "mix-1").await;
    flow_log.wait_for("sub:ended").await;
    alice_log.wait_for("stream-ended:mix-1").await;
    assert!(subscription.is_ended());
    settle().await;
    assert_eq!(flow_log.count_of("sub:ended").await, 1);
    assert!(alice.remote_stream("mix-1").await.is_none());

    // A fresh subscription on the ended handle is refused.
    assert!(matches!(
        alice.subscribe(&stream, None).await,
        Err(ClientError::InvalidParam(_))
    ));
}

#[tokio::test]
async fn reannounced_stream_updates_without_duplicate_events() {
    let hub = LoopbackHub::new();
    let mcu = FakeMcu::spawn(&hub, "room-1").await;
    let alice = connected_client(&hub, "alice").await;

    let alice_log = EventLog::new();
    alice.add_observer(Recorder::new(alice_log.clone())).await;

    alice.join("room-1").await.expect("join");
    wait_for_state(&alice, "room-1", SessionState::Connected).await;

    mcu.announce_stream("alice", mixed_stream_info("mix-1", "grid"))
        .await;
    alice_log.wait_for("stream-added:mix-1").await;

    mcu.announce_stream("alice", mixed_stream_info("mix-1", "grid"))
        .await;
    settle().await;
    assert_eq!(alice_log.count_of("stream-added:mix-1").await, 1);
}

#[tokio::test]
async fn broadcast_without_target_goes_to_the_room() {
    let hub = LoopbackHub::new();
    let mcu = FakeMcu::spawn(&hub, "room-1").await;
    let alice = connected_client(&hub, "alice").await;

    // Without a room there is nowhere to broadcast.
    assert!(matches!(
        alice.send("hi", None).await,
        Err(ClientError::InvalidParam(_))
    ));

    alice.join("room-1").await.expect("join");
    wait_for_state(&alice, "room-1", SessionState::Connected).await;

    alice.send("hello room", None).await.expect("broadcast");
    mcu.log.wait_for("data:hello room").await;
}

#[tokio::test]
async fn participant_events_reach_client_observers() {
    let hub = LoopbackHub::new();
    let mcu = FakeMcu::spawn(&hub, "room-1").await;
    let alice = connected_client(&hub, "alice").await;

    let alice_log = EventLog::new();
    alice.add_observer(Recorder::new(alice_log.clone())).await;

    alice.join("room-1").await.expect("join");
    wait_for_state(&alice, "room-1", SessionState::Connected).await;

    mcu.participant("alice", "carol", true).await;
    alice_log.wait_for("joined:carol").await;

    mcu.participant("alice", "carol", false).await;
    alice_log.wait_for("left:carol").await;
}

#[tokio::test]
async fn room_and_peer_targets_do_not_mix() {
    let hub = LoopbackHub::new();
    let _mcu = FakeMcu::spawn(&hub, "room-1").await;
    let alice = connected_client(&hub, "alice").await;

    alice.join("room-1").await.expect("join");
    wait_for_state(&alice, "room-1", SessionState::Connected).await;

    // The same target cannot be re-used as a peer session.
    assert!(matches!(
        alice.invite("room-1").await,
        Err(ClientError::InvalidParam(_))
    ));
}
