//! Error handling and contract-violation tests
//!
//! Protocol violations and late notifications are logged and ignored;
//! only rendering failures and misuse of a released session surface as
//! errors.

mod helpers;

use focus_arbiter::{Error, FocusRequest, FocusResponse};
use focus_common::events::DropReason;
use focus_common::{DurationHint, FocusEvent, FocusState, SessionId};
use helpers::{drain, events_for, settle, wait_for_event, Harness, RecordingListener};
use std::time::Duration;

#[tokio::test]
async fn test_second_request_while_outstanding_is_rejected() {
    let harness = Harness::new();
    let a = harness.session("A", DurationHint::Exclusive).await;

    a.start().await.unwrap();
    let result = a.start().await;
    assert!(matches!(result, Err(Error::RequestOutstanding(id)) if id == a.id()));

    // The original grant is untouched
    assert_eq!(a.focus_state().await, FocusState::Holding);
    assert_eq!(harness.context.arbiter().holder().await, Some(a.id()));
}

#[tokio::test]
async fn test_displaced_session_must_abandon_before_requesting() {
    let harness = Harness::new();
    let a = harness.session("A", DurationHint::Exclusive).await;
    let b = harness.session("B", DurationHint::Transient).await;

    a.start().await.unwrap();
    b.start().await.unwrap();

    assert!(matches!(a.start().await, Err(Error::RequestOutstanding(_))));

    a.stop().await.unwrap();
    a.start().await.unwrap();
    settle(&[&a, &b]).await;
    assert_eq!(a.focus_state().await, FocusState::Holding);
    assert_eq!(b.focus_state().await, FocusState::PausedLost);
}

#[tokio::test]
async fn test_unregistered_requester_is_denied() {
    let harness = Harness::new();
    let stranger = SessionId::new();

    let response = harness
        .context
        .arbiter()
        .request_focus(FocusRequest::new(stranger, DurationHint::Exclusive))
        .await
        .unwrap();
    assert_eq!(response, FocusResponse::Denied);
    assert_eq!(harness.context.arbiter().holder().await, None);
}

#[tokio::test]
async fn test_abandon_without_grant_is_a_no_op() {
    let harness = Harness::new();
    let arbiter = harness.context.arbiter();
    let a = harness.session("A", DurationHint::Exclusive).await;

    // Never requested, and entirely unknown
    assert_eq!(arbiter.abandon(a.id()).await, None);
    assert_eq!(arbiter.abandon(SessionId::new()).await, None);
    assert!(!arbiter.unregister(SessionId::new()).await);

    a.start().await.unwrap();
    assert_eq!(arbiter.holder().await, Some(a.id()));
}

#[tokio::test]
async fn test_start_failure_abandons_and_restores_previous_holder() {
    let harness = Harness::new();
    let a = harness.session("A", DurationHint::Exclusive).await;
    let b = harness.session("B", DurationHint::Transient).await;

    a.start().await.unwrap();
    harness.renderer.fail_next_start(b.id());

    let result = b.start().await;
    assert!(matches!(result, Err(Error::ResourceAcquisition { session, .. }) if session == b.id()));
    assert_eq!(b.focus_state().await, FocusState::Idle);
    assert!(!b.is_rendering());

    settle(&[&a, &b]).await;
    assert_eq!(a.focus_state().await, FocusState::Holding);
    assert!(a.is_rendering());
    assert_eq!(harness.context.arbiter().holder().await, Some(a.id()));

    // Failure was one-shot; the session can try again
    b.start().await.unwrap();
    assert_eq!(b.focus_state().await, FocusState::Holding);
}

#[tokio::test]
async fn test_resume_failure_gives_up_focus() {
    let harness = Harness::new();
    let a = harness.session("A", DurationHint::Exclusive).await;

    a.start().await.unwrap();
    a.pause().await.unwrap();
    harness.renderer.fail_next_start(a.id());

    assert!(matches!(a.resume().await, Err(Error::ResourceAcquisition { .. })));
    assert_eq!(a.focus_state().await, FocusState::Idle);
    assert_eq!(harness.context.arbiter().holder().await, None);
}

#[tokio::test]
async fn test_release_twice_has_one_effect() {
    let harness = Harness::new();
    let mut events = harness.events();
    let a = harness.session("A", DurationHint::Exclusive).await;

    a.start().await.unwrap();
    a.release().await.unwrap();
    a.release().await.unwrap();

    assert!(a.is_released());
    assert!(harness.renderer.is_released(a.id()));
    assert!(!harness.context.arbiter().is_registered(a.id()).await);

    let unregistered = events_for(&drain(&mut events), a.id())
        .into_iter()
        .filter(|e| matches!(e, FocusEvent::SessionUnregistered { .. }))
        .count();
    assert_eq!(unregistered, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_release_is_idempotent() {
    let harness = Harness::new();
    let mut events = harness.events();
    let a = std::sync::Arc::new(harness.session("A", DurationHint::Exclusive).await);
    a.start().await.unwrap();

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let session = a.clone();
        tasks.spawn(async move { session.release().await });
    }
    while let Some(result) = tasks.join_next().await {
        assert!(result.unwrap().is_ok());
    }

    let unregistered = events_for(&drain(&mut events), a.id())
        .into_iter()
        .filter(|e| matches!(e, FocusEvent::SessionUnregistered { .. }))
        .count();
    assert_eq!(unregistered, 1);
    assert_eq!(harness.context.arbiter().holder().await, None);
}

#[tokio::test]
async fn test_calls_after_release_report_released() {
    let harness = Harness::new();
    let a = harness.session("A", DurationHint::Exclusive).await;
    a.release().await.unwrap();

    assert!(matches!(a.start().await, Err(Error::Released(_))));
    assert!(matches!(a.resume().await, Err(Error::Released(_))));
    assert!(matches!(a.stop().await, Err(Error::Released(_))));
    assert_eq!(a.focus_state().await, FocusState::Idle);
}

/// A notification already queued when the session is released is dropped
#[tokio::test]
async fn test_notification_after_release_is_dropped() {
    let harness = Harness::new();
    let arbiter = harness.context.arbiter().clone();
    let mut events = harness.events();

    let a = harness.session("A", DurationHint::Exclusive).await;
    a.start().await.unwrap();
    let volume_before = harness.renderer.volume(a.id());

    // Displace A through a bare listener so no await point lets A's task run
    let interrupter = arbiter.register("interrupter", RecordingListener::new()).await;
    arbiter
        .request_focus(FocusRequest::new(interrupter.session, DurationHint::TransientMayDuck))
        .await
        .unwrap();
    a.release().await.unwrap();

    let dropped = wait_for_event(&mut events, Duration::from_secs(2), |e| {
        matches!(e, FocusEvent::NotificationDropped { session, .. } if *session == a.id())
    })
    .await;
    match dropped {
        Some(FocusEvent::NotificationDropped { reason, .. }) => {
            assert_eq!(reason, DropReason::Unregistered)
        }
        other => panic!("expected a dropped notification, got {:?}", other),
    }

    // Never ducked
    assert_eq!(harness.renderer.volume(a.id()), volume_before);
    assert!(harness.renderer.is_released(a.id()));
}

#[tokio::test]
async fn test_arbiter_never_notifies_after_unregister() {
    let harness = Harness::new();
    let arbiter = harness.context.arbiter();

    let listener = RecordingListener::new();
    let a = arbiter.register("A", listener.clone()).await;
    let b = arbiter.register("B", RecordingListener::new()).await;

    arbiter
        .request_focus(FocusRequest::new(a.session, DurationHint::Exclusive))
        .await
        .unwrap();
    assert!(arbiter.unregister(a.session).await);
    let before = listener.received().len();

    arbiter
        .request_focus(FocusRequest::new(b.session, DurationHint::Exclusive))
        .await
        .unwrap();
    arbiter.abandon(b.session).await;

    assert_eq!(listener.received().len(), before);
    assert!(!a.liveness.is_alive());
    for notification in listener.received() {
        assert!(!a.liveness.is_current(notification.epoch));
    }
}
