use std::time::Duration;

use kahoot_client::core::correlator::MessageCorrelator;
use kahoot_client::core::message::CometdMessage;
use kahoot_client::error::KahootError;

#[tokio::test(start_paused = true)]
async fn test_timeout_removes_entry_and_late_response_is_dropped() {
    let correlator = MessageCorrelator::new(Duration::from_secs(10));
    let mut message = CometdMessage::new("/service/controller");
    let pending = correlator.register(&mut message).unwrap();
    let id = pending.id();
    assert!(correlator.is_pending(id));

    let result = pending.wait().await;
    assert!(matches!(result, Err(KahootError::Timeout)));
    assert!(!correlator.is_pending(id));
    assert_eq!(correlator.pending_count(), 0);

    let late = CometdMessage::ack("/service/controller", Some(id.to_string()), true);
    assert!(!correlator.on_response(late));
}

#[tokio::test(start_paused = true)]
async fn test_response_before_deadline_wins() {
    let correlator = MessageCorrelator::new(Duration::from_secs(10));
    let mut message = CometdMessage::new("/service/controller");
    let pending = correlator.register(&mut message).unwrap();
    assert_eq!(message.id.as_deref(), Some("1"));

    let responder = correlator.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(9)).await;
        responder.on_response(CometdMessage::ack("/service/controller", Some("1".to_string()), true));
    });

    let response = pending.wait().await.unwrap();
    assert_eq!(response.successful, Some(true));
    assert_eq!(correlator.pending_count(), 0);
}

#[tokio::test]
async fn test_clear_fails_waiters_with_closed_session() {
    let correlator = MessageCorrelator::new(Duration::from_secs(10));
    let mut message = CometdMessage::new("/service/controller");
    let pending = correlator.register(&mut message).unwrap();

    correlator.clear();
    assert!(matches!(pending.wait().await, Err(KahootError::SessionClosed)));
}
