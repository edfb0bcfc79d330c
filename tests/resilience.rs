//! Resilience tests for the TfL client against a real socket upstream.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tube_status::resilience::{CircuitBreaker, CircuitState, RetryPolicy};
use tube_status::tfl::{ReqwestTransport, TflClient, TflError};

mod common;

fn client_for(
    upstream: &common::MockUpstream,
    breaker: Arc<CircuitBreaker>,
    max_attempts: u32,
    deadline: Duration,
) -> TflClient {
    TflClient::new(
        Arc::new(ReqwestTransport::new(Duration::from_millis(200)).unwrap()),
        breaker,
        RetryPolicy::new(max_attempts, Duration::from_millis(1)),
        upstream.base_url(),
        deadline,
    )
}

fn breaker(threshold: u32, open_for: Duration) -> Arc<CircuitBreaker> {
    Arc::new(CircuitBreaker::new("tfl", threshold, open_for, 1))
}

#[tokio::test]
async fn test_retry_on_server_errors() {
    let call_count = Arc::new(AtomicU32::new(0));
    let cc = call_count.clone();
    let upstream = common::start_programmable_backend(move |_| {
        let cc = cc.clone();
        async move {
            if cc.fetch_add(1, Ordering::SeqCst) < 3 {
                (503, "{}".into())
            } else {
                (200, common::LINES_JSON.into())
            }
        }
    })
    .await;

    let client = client_for(&upstream, breaker(10, Duration::from_secs(30)), 4, Duration::from_secs(1));
    let lines = client.get_all_tube_line_status().await.expect("should succeed after retries");

    assert_eq!(lines[0].id, "central");
    assert_eq!(upstream.hits(), 4);
    assert_eq!(upstream.paths()[0], "/Line/Mode/tube/Status");
}

#[tokio::test]
async fn test_client_error_single_attempt() {
    let upstream = common::start_mock_backend(404, r#"{"message":"not found"}"#).await;
    let client = client_for(&upstream, breaker(10, Duration::from_secs(30)), 3, Duration::from_secs(1));

    let err = client.get_line_status("nope", None).await.unwrap_err();

    assert!(matches!(err, TflError::BadUpstreamRequest { status: 404 }));
    assert_eq!(upstream.hits(), 1);
}

#[tokio::test]
async fn test_slow_upstream_times_out() {
    let upstream = common::start_programmable_backend(|_| async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        (200, common::LINES_JSON.into())
    })
    .await;
    let client = client_for(&upstream, breaker(10, Duration::from_secs(30)), 2, Duration::from_millis(100));

    let err = client.get_all_tube_line_status().await.unwrap_err();

    assert!(matches!(err, TflError::UpstreamUnavailable { status: None, .. }), "got {err:?}");
    assert_eq!(client.breaker().consecutive_failures(), 2);
}

#[tokio::test]
async fn test_breaker_opens_and_stops_traffic() {
    let upstream = common::start_mock_backend(500, "{}").await;
    let client = client_for(&upstream, breaker(3, Duration::from_secs(30)), 1, Duration::from_secs(1));

    for _ in 0..3 {
        let err = client.get_all_tube_line_status().await.unwrap_err();
        assert!(matches!(err, TflError::UpstreamUnavailable { status: Some(500), .. }));
    }
    assert_eq!(client.breaker().state(), CircuitState::Open);

    for _ in 0..5 {
        let err = client.get_all_tube_line_status().await.unwrap_err();
        assert!(matches!(err, TflError::CircuitOpen));
    }
    assert_eq!(upstream.hits(), 3, "open breaker must not reach the upstream");
}

#[tokio::test]
async fn test_half_open_probe_closes_breaker() {
    let healthy = Arc::new(AtomicBool::new(false));
    let h = healthy.clone();
    let upstream = common::start_programmable_backend(move |_| {
        let h = h.clone();
        async move {
            if h.load(Ordering::SeqCst) {
                (200, common::LINES_JSON.into())
            } else {
                (502, "{}".into())
            }
        }
    })
    .await;
    let client = client_for(&upstream, breaker(2, Duration::from_millis(100)), 1, Duration::from_secs(1));

    for _ in 0..2 {
        let _ = client.get_all_tube_line_status().await;
    }
    assert_eq!(client.breaker().state(), CircuitState::Open);

    healthy.store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(150)).await;

    let lines = client.get_all_tube_line_status().await.expect("probe should succeed");
    assert_eq!(lines.len(), 1);
    assert_eq!(client.breaker().state(), CircuitState::Closed);
    assert_eq!(client.breaker().consecutive_failures(), 0);
}

#[tokio::test]
async fn test_concurrent_calls_share_one_breaker() {
    let upstream = common::start_mock_backend(200, common::LINES_JSON).await;
    let client = Arc::new(client_for(&upstream, breaker(3, Duration::from_secs(30)), 1, Duration::from_secs(1)));

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.get_all_tube_line_status().await })
        })
        .collect();

    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }
    assert_eq!(upstream.hits(), 20);
    assert_eq!(client.breaker().state(), CircuitState::Closed);
}
