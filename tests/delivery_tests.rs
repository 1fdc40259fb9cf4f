mod common;

use common::{data_url, sample_ping, spawn_collector, ScriptedOutcomes};
use ping_relay::simulator::{FixedOutcome, OutcomeDecision};
use ping_relay::{
    ClientStatistics, Deliver, DeliveryError, PingDispatcher, RetryPolicy, RetryScheduler,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::sleep;

fn dispatcher_for(url: String, idle_timeout: Duration) -> (PingDispatcher, Arc<ClientStatistics>) {
    let stats = Arc::new(ClientStatistics::new());
    let dispatcher = PingDispatcher::new(url, idle_timeout, Arc::clone(&stats)).unwrap();
    (dispatcher, stats)
}

#[tokio::test]
async fn test_successful_delivery_counts_success() {
    let (addr, store) = spawn_collector(Arc::new(FixedOutcome(OutcomeDecision::Accept))).await;
    let (dispatcher, stats) = dispatcher_for(data_url(addr), Duration::from_secs(5));

    dispatcher.deliver(&sample_ping()).await.unwrap();

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.requests, 1);
    assert_eq!(snapshot.success, 1);
    assert_eq!(store.records(), vec![sample_ping()]);
}

#[tokio::test]
async fn test_server_error_is_classified() {
    let (addr, store) = spawn_collector(Arc::new(FixedOutcome(OutcomeDecision::Error))).await;
    let (dispatcher, stats) = dispatcher_for(data_url(addr), Duration::from_secs(5));

    let err = dispatcher.deliver(&sample_ping()).await.unwrap_err();

    match err {
        DeliveryError::ServerError { body } => assert_eq!(body, "Random internal error"),
        other => panic!("expected server error, got {:?}", other),
    }
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.requests, 1);
    assert_eq!(snapshot.errors_500, 1);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_hang_surfaces_as_timeout() {
    let (addr, store) = spawn_collector(Arc::new(FixedOutcome(OutcomeDecision::Hang))).await;
    let (dispatcher, stats) = dispatcher_for(data_url(addr), Duration::from_millis(200));

    let err = dispatcher.deliver(&sample_ping()).await.unwrap_err();

    assert!(matches!(err, DeliveryError::Timeout));
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.requests, 1);
    assert_eq!(snapshot.errors_timeout, 1);
    assert!(store.is_empty());
}

/// Answers one request with a 200 whose 10 byte body trickles out one byte per `gap`.
async fn spawn_trickling_collector(gap: Duration) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut request = vec![0u8; 4096];
        let _ = stream.read(&mut request).await.unwrap();

        stream
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 10\r\n\r\n")
            .await
            .unwrap();
        for byte in b"0123456789" {
            sleep(gap).await;
            stream.write_all(&[*byte]).await.unwrap();
            stream.flush().await.unwrap();
        }
        // Keep the socket open until the client is done with it
        sleep(Duration::from_secs(2)).await;
    });

    addr
}

#[tokio::test]
async fn test_slow_but_active_response_is_not_a_timeout() {
    // 10 x 100 ms = 1 s in total, twice the idle timeout, never idle for more than 100 ms
    let addr = spawn_trickling_collector(Duration::from_millis(100)).await;
    let (dispatcher, stats) = dispatcher_for(data_url(addr), Duration::from_millis(500));

    dispatcher.deliver(&sample_ping()).await.unwrap();

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.requests, 1);
    assert_eq!(snapshot.success, 1);
    assert_eq!(snapshot.errors_timeout, 0);
}

#[tokio::test]
async fn test_stalled_response_body_is_a_timeout() {
    let addr = spawn_trickling_collector(Duration::from_millis(600)).await;
    let (dispatcher, stats) = dispatcher_for(data_url(addr), Duration::from_millis(200));

    let err = dispatcher.deliver(&sample_ping()).await.unwrap_err();

    assert!(matches!(err, DeliveryError::Timeout), "got {:?}", err);
    assert_eq!(stats.snapshot().errors_timeout, 1);
}

#[tokio::test]
async fn test_unexpected_status_is_unclassified() {
    let (addr, _) = spawn_collector(Arc::new(FixedOutcome(OutcomeDecision::Accept))).await;
    let (dispatcher, stats) =
        dispatcher_for(format!("http://{}/wrong", addr), Duration::from_secs(5));

    let err = dispatcher.deliver(&sample_ping()).await.unwrap_err();

    assert!(matches!(
        err,
        DeliveryError::UnexpectedStatus(status) if status.as_u16() == 400
    ));
    assert_eq!(stats.snapshot().errors_other, 1);
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (dispatcher, stats) = dispatcher_for(data_url(addr), Duration::from_secs(5));
    let err = dispatcher.deliver(&sample_ping()).await.unwrap_err();

    assert!(matches!(err, DeliveryError::Transport(_)));
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.requests, 1);
    assert_eq!(snapshot.errors_other, 1);
}

#[tokio::test]
async fn test_counters_balance_over_mixed_outcomes() {
    let script = [
        OutcomeDecision::Accept,
        OutcomeDecision::Error,
        OutcomeDecision::Hang,
        OutcomeDecision::Error,
        OutcomeDecision::Accept,
        OutcomeDecision::Hang,
    ];
    let (addr, store) = spawn_collector(Arc::new(ScriptedOutcomes::new(script))).await;
    let (dispatcher, stats) = dispatcher_for(data_url(addr), Duration::from_millis(200));

    for id in 1..=script.len() as u64 {
        let _ = dispatcher
            .deliver(&ping_relay::PingData::new(id, 1_700_000_000_000, 10.0))
            .await;
    }

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.requests, 6);
    assert_eq!(snapshot.success, 2);
    assert_eq!(snapshot.errors_500, 2);
    assert_eq!(snapshot.errors_timeout, 2);
    assert_eq!(snapshot.errors_other, 0);
    assert_eq!(snapshot.requests, snapshot.completed());
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_scheduler_retries_until_accepted() {
    let script = [OutcomeDecision::Error, OutcomeDecision::Error];
    let (addr, store) = spawn_collector(Arc::new(ScriptedOutcomes::new(script))).await;
    let (dispatcher, stats) = dispatcher_for(data_url(addr), Duration::from_secs(5));

    let policy = RetryPolicy {
        base_delay: Duration::from_millis(5),
        ..RetryPolicy::default()
    };
    let scheduler = RetryScheduler::new(Arc::new(dispatcher), policy);
    scheduler.submit(sample_ping());

    for _ in 0..200 {
        if scheduler.in_flight() == 0 {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(scheduler.in_flight(), 0);

    let records = store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].delivery_attempt, 3);
    assert_eq!(records[0].ping_id, 1);
    assert_eq!(records[0].date, 1_700_000_000_000);
    assert_eq!(records[0].response_time, 42.0);

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.requests, 3);
    assert_eq!(snapshot.success, 1);
    assert_eq!(snapshot.errors_500, 2);
}

#[tokio::test]
async fn test_scheduler_retries_after_timeout() {
    let script = [OutcomeDecision::Hang];
    let (addr, store) = spawn_collector(Arc::new(ScriptedOutcomes::new(script))).await;
    let (dispatcher, stats) = dispatcher_for(data_url(addr), Duration::from_millis(150));

    let policy = RetryPolicy {
        base_delay: Duration::from_millis(5),
        ..RetryPolicy::default()
    };
    let scheduler = RetryScheduler::new(Arc::new(dispatcher), policy);
    scheduler.submit(sample_ping());

    for _ in 0..200 {
        if scheduler.in_flight() == 0 {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }

    let records = store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].delivery_attempt, 2);

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.errors_timeout, 1);
    assert_eq!(snapshot.success, 1);
}
