//! HttpFetcher and preflight against a local origin and forward proxy

mod support;

use anyhow::Result;
use gauge_http::{preflight, FetchError, Fetcher, HttpConfig, PreflightError, ProxyTarget, Route, TransferClass};
use std::time::Duration;
use support::{closed_port, fetcher, fetcher_with, image_bytes, Origin, ProxyMode, TestProxy, PAGE};

#[tokio::test]
async fn test_direct_fetch_bypasses_proxy() -> Result<()> {
    let origin = Origin::start().await?;
    let proxy = TestProxy::start(ProxyMode::Faithful).await?;
    let fetcher = fetcher(&proxy);

    let result = fetcher
        .fetch(&origin.endpoint("/page", TransferClass::Small), Route::Direct)
        .await;

    assert!(result.is_ok(), "{:?}", result.error);
    assert_eq!(result.route, Route::Direct);
    assert_eq!(result.status, Some(200));
    assert_eq!(&result.bytes[..], PAGE.as_bytes());
    assert_eq!(proxy.requests(), 0);
    Ok(())
}

#[tokio::test]
async fn test_proxied_fetch_goes_through_proxy() -> Result<()> {
    let origin = Origin::start().await?;
    let proxy = TestProxy::start(ProxyMode::Faithful).await?;
    let fetcher = fetcher(&proxy);

    let result = fetcher
        .fetch(&origin.endpoint("/image", TransferClass::Large), Route::Proxied)
        .await;

    assert!(result.is_ok(), "{:?}", result.error);
    assert_eq!(result.route, Route::Proxied);
    assert_eq!(&result.bytes[..], &image_bytes()[..]);
    assert!(result.elapsed > Duration::ZERO);
    assert_eq!(proxy.requests(), 1);
    Ok(())
}

#[tokio::test]
async fn test_error_status_still_returns_body() -> Result<()> {
    let origin = Origin::start().await?;
    let proxy = TestProxy::start(ProxyMode::Faithful).await?;
    let fetcher = fetcher(&proxy);

    let result = fetcher
        .fetch(&origin.endpoint("/missing", TransferClass::Small), Route::Proxied)
        .await;

    assert!(result.is_ok());
    assert_eq!(result.status, Some(404));
    assert_eq!(&result.bytes[..], b"no such page");
    Ok(())
}

#[tokio::test]
async fn test_slow_origin_times_out() -> Result<()> {
    let origin = Origin::start().await?;
    let proxy = TestProxy::start(ProxyMode::Faithful).await?;
    let config = HttpConfig {
        timeout: Duration::from_millis(300),
        connect_timeout: Duration::from_millis(300),
        ..HttpConfig::default()
    };
    let fetcher = fetcher_with(config, proxy.target());

    let result = fetcher
        .fetch(&origin.endpoint("/stall", TransferClass::Small), Route::Direct)
        .await;

    assert_eq!(result.error, Some(FetchError::Timeout { after_ms: 300 }));
    assert!(result.bytes.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unreachable_proxy_is_a_fetch_error() -> Result<()> {
    let origin = Origin::start().await?;
    let fetcher = fetcher_with(
        HttpConfig::default(),
        ProxyTarget::new("127.0.0.1", closed_port()),
    );

    let result = fetcher
        .fetch(&origin.endpoint("/page", TransferClass::Small), Route::Proxied)
        .await;

    assert!(!result.is_ok());
    assert!(result.bytes.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_preflight() -> Result<()> {
    let proxy = TestProxy::start(ProxyMode::Faithful).await?;
    preflight(&proxy.target(), Duration::from_secs(2)).await?;

    let closed = ProxyTarget::new("127.0.0.1", closed_port());
    let err = preflight(&closed, Duration::from_secs(2)).await.unwrap_err();
    assert!(matches!(err, PreflightError::Unreachable { .. }));
    Ok(())
}
