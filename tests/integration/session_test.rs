use std::time::{Duration, Instant};

use rabbit_session::rabbitmq::{ReadOutcome, TimeoutBudget};
use rabbit_session::DeliveryTag;
use serial_test::serial;
use tokio_util::sync::CancellationToken;

use crate::{connected_session, queue_name};

#[tokio::test]
#[serial]
#[ignore] // requires a running RabbitMQ instance
async fn test_publish_read_ack_scenario() {
    let mut session = connected_session().await;
    let queue = queue_name("jobs");

    session.create_queue(&queue).await.unwrap();
    session.publish(&queue, b"hello").await.unwrap();

    let outcome = session
        .read_message(&queue, TimeoutBudget::Unbounded, &CancellationToken::new())
        .await
        .unwrap();
    let delivery = outcome.into_delivery().expect("message delivered");
    assert_eq!(delivery.delivery_tag, DeliveryTag(1));
    assert_eq!(delivery.body, b"hello");

    session.ack(delivery.delivery_tag).await.unwrap();
    session.destroy_queue(&queue).await.unwrap();
    session.close().await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore]
async fn test_binary_payload_survives_byte_for_byte() {
    let mut session = connected_session().await;
    let queue = queue_name("binary");
    let payload: Vec<u8> = (0..=255u8).collect();

    session.create_queue(&queue).await.unwrap();
    session.publish(&queue, &payload).await.unwrap();

    let delivery = session
        .read_message(&queue, TimeoutBudget::Slices(5), &CancellationToken::new())
        .await
        .unwrap()
        .into_delivery()
        .expect("message delivered");
    assert_eq!(delivery.body, payload);

    session.ack(delivery.delivery_tag).await.unwrap();
    session.destroy_queue(&queue).await.unwrap();
    session.close().await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore]
async fn test_empty_queue_times_out_after_budget() {
    let mut session = connected_session().await;
    let queue = queue_name("empty");
    session.create_queue(&queue).await.unwrap();

    let started = Instant::now();
    let outcome = session
        .read_message(&queue, TimeoutBudget::Slices(2), &CancellationToken::new())
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(outcome, ReadOutcome::TimedOut);
    assert!(elapsed >= Duration::from_secs(2), "returned early after {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(4), "took {:?}", elapsed);

    session.destroy_queue(&queue).await.unwrap();
    session.close().await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore]
async fn test_nacked_message_is_redelivered() {
    let mut session = connected_session().await;
    let queue = queue_name("requeue");
    let cancel = CancellationToken::new();

    session.create_queue(&queue).await.unwrap();
    session.publish(&queue, b"retry me").await.unwrap();

    let first = session
        .read_message(&queue, TimeoutBudget::Slices(5), &cancel)
        .await
        .unwrap()
        .into_delivery()
        .expect("first delivery");
    session.nack(first.delivery_tag).await.unwrap();

    let second = session
        .read_message(&queue, TimeoutBudget::Slices(5), &cancel)
        .await
        .unwrap()
        .into_delivery()
        .expect("redelivery");
    assert_eq!(second.body, b"retry me");
    assert_ne!(second.delivery_tag, first.delivery_tag);

    session.ack(second.delivery_tag).await.unwrap();
    session.destroy_queue(&queue).await.unwrap();
    session.close().await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore]
async fn test_double_ack_surfaces_as_failure_not_crash() {
    let mut session = connected_session().await;
    let queue = queue_name("double-ack");

    session.create_queue(&queue).await.unwrap();
    session.publish(&queue, b"once").await.unwrap();
    let delivery = session
        .read_message(&queue, TimeoutBudget::Slices(5), &CancellationToken::new())
        .await
        .unwrap()
        .into_delivery()
        .expect("delivery");

    session.ack(delivery.delivery_tag).await.unwrap();

    // The broker answers an unknown tag by closing the channel; it shows up on this call or
    // the next one.
    let second = session.ack(delivery.delivery_tag).await;
    let follow_up = session.create_queue(&queue).await;
    assert!(second.is_err() || follow_up.is_err());

    // fail-open teardown: the session can always be reset
    let _ = session.close().await;
    assert!(!session.is_connected());
    drop(session);

    let mut session = connected_session().await;
    session.destroy_queue(&queue).await.unwrap();
    session.close().await.unwrap();
}
