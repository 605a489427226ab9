// ABOUTME: Integration tests for the connection bootstrap and init gate.
// ABOUTME: Liveness checks, retry windows, concurrent first calls, deadlines and cancellation.

mod support;

use dockutil::docker::{ClientErrorKind, GateStatus, InitError, RetryPolicy, TransportError};
use std::time::Duration;
use support::{MockTransport, client, client_with, options};
use tokio_util::sync::CancellationToken;

#[tokio::test(start_paused = true)]
async fn failed_liveness_check_blocks_every_operation() {
    let transport = MockTransport::new();
    transport.set_info(Err(TransportError::Connection("socket closed".to_string())));
    let (client, connector) = client(transport.clone());
    let ctx = CancellationToken::new();

    let err = client.ensure_ready(&ctx).await.unwrap_err();
    assert_eq!(err.kind(), ClientErrorKind::Init);
    assert!(err.to_string().contains("socket closed"));
    assert_eq!(connector.connects(), 1, "connect itself succeeded");
    assert_eq!(client.status(), GateStatus::Failed { attempts: 1 });
    assert!(client.settings().is_none());

    let err = client.images(&ctx, false).await.unwrap_err();
    assert_eq!(err.kind(), ClientErrorKind::Init);
    assert_eq!(transport.calls("list_images"), 0);
}

#[tokio::test(start_paused = true)]
async fn recovers_once_retry_window_reopens() {
    let transport = MockTransport::new();
    let (client, connector) = client(transport.clone());
    connector.set_failing(true);
    let ctx = CancellationToken::new();

    client.ensure_ready(&ctx).await.unwrap_err();

    // inside the backoff window: fail fast without reconnecting
    connector.set_failing(false);
    let err = client.count_volumes(&ctx).await.unwrap_err();
    assert!(matches!(
        err,
        dockutil::docker::ClientError::Init {
            source: InitError::RetryLater { .. }
        }
    ));
    assert_eq!(connector.connects(), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    client.ensure_ready(&ctx).await.unwrap();
    assert_eq!(client.status(), GateStatus::Ready);

    // ready is sticky: no further bootstrap work
    client.images(&ctx, false).await.unwrap();
    client.hostname(&ctx).await.unwrap();
    assert_eq!(connector.connects(), 2);
    assert_eq!(transport.calls("info"), 2, "one liveness check plus hostname");
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_are_terminal() {
    let transport = MockTransport::new();
    let mut options = options();
    options.retry = RetryPolicy {
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(10),
        max_attempts: Some(2),
    };
    let (client, connector) = client_with(transport, options);
    connector.set_failing(true);
    let ctx = CancellationToken::new();

    client.ensure_ready(&ctx).await.unwrap_err();
    tokio::time::advance(Duration::from_millis(20)).await;
    client.ensure_ready(&ctx).await.unwrap_err();

    connector.set_failing(false);
    tokio::time::advance(Duration::from_secs(3600)).await;
    let err = client.ensure_ready(&ctx).await.unwrap_err();
    assert!(matches!(
        err,
        dockutil::docker::ClientError::Init {
            source: InitError::Exhausted { attempts: 2, .. }
        }
    ));
    assert_eq!(connector.connects(), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_first_calls_bootstrap_once() {
    let transport = MockTransport::new();
    transport.set_delay(Duration::from_millis(100));
    let (client, connector) = client(transport.clone());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client.images(&CancellationToken::new(), false).await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().len(), 1);
    }

    assert_eq!(connector.connects(), 1);
    assert_eq!(transport.calls("info"), 1);
    assert_eq!(transport.calls("list_images"), 8);
}

#[tokio::test(start_paused = true)]
async fn slow_liveness_check_times_out() {
    let transport = MockTransport::new();
    transport.set_delay(Duration::from_secs(60));
    let (client, _) = client(transport);

    let err = client
        .ensure_ready(&CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ClientErrorKind::Init);
    assert!(err.to_string().contains("timed out"), "{err}");
}

#[tokio::test(start_paused = true)]
async fn slow_operation_times_out_after_bootstrap() {
    let transport = MockTransport::new();
    let (client, _) = client(transport.clone());
    let ctx = CancellationToken::new();
    client.ensure_ready(&ctx).await.unwrap();

    transport.set_delay(Duration::from_secs(6));
    let err = client.count_volumes(&ctx).await.unwrap_err();
    assert_eq!(err.kind(), ClientErrorKind::Timeout);
    assert_eq!(transport.calls("list_volumes"), 1);
}

#[tokio::test]
async fn cancelled_context_is_reported_not_retried() {
    let transport = MockTransport::new();
    let (client, connector) = client(transport.clone());

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let err = client.images(&cancelled, true).await.unwrap_err();
    assert_eq!(err.kind(), ClientErrorKind::Cancelled);
    assert_eq!(connector.connects(), 0);

    let ctx = CancellationToken::new();
    client.ensure_ready(&ctx).await.unwrap();
    let err = client.images(&cancelled, true).await.unwrap_err();
    assert_eq!(err.kind(), ClientErrorKind::Cancelled);
    assert_eq!(transport.calls("list_images"), 0);
}

#[tokio::test]
async fn settings_are_frozen_by_bootstrap() {
    let transport = MockTransport::new();
    let mut options = options();
    options.collect_network = false;
    options.inspect_cache_ttl = Duration::from_secs(42);
    let (client, _) = client_with(transport, options);

    assert!(client.settings().is_none());
    client.ensure_ready(&CancellationToken::new()).await.unwrap();

    let settings = client.settings().unwrap();
    assert!(!settings.collect_network);
    assert_eq!(settings.inspect_cache_ttl, Duration::from_secs(42));
}
