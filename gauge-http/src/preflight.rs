//! Startup reachability check for the proxy under test

use crate::errors::PreflightError;
use crate::types::ProxyTarget;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Open (and drop) one TCP connection to the proxy.
///
/// This is the only fatal check in a run: it happens once, before any
/// sampling or probing.
pub async fn preflight(target: &ProxyTarget, timeout: Duration) -> Result<(), PreflightError> {
    debug!("Preflight connect to proxy {}", target);

    let host = target.host.trim_start_matches('[').trim_end_matches(']');
    match tokio::time::timeout(timeout, TcpStream::connect((host, target.port))).await {
        Ok(Ok(_stream)) => {
            info!("Proxy {} is accepting connections", target);
            Ok(())
        }
        Ok(Err(e)) => Err(PreflightError::Unreachable {
            target: target.clone(),
            reason: e.to_string(),
        }),
        Err(_) => Err(PreflightError::Timeout {
            target: target.clone(),
            after: timeout,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_preflight_accepts_listening_proxy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let target = ProxyTarget::new("127.0.0.1", addr.port());
        assert!(preflight(&target, Duration::from_secs(2)).await.is_ok());
    }

    #[tokio::test]
    async fn test_preflight_reports_closed_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let target = ProxyTarget::new("127.0.0.1", port);
        let err = preflight(&target, Duration::from_secs(2)).await.unwrap_err();
        assert!(matches!(err, PreflightError::Unreachable { .. }));
        assert!(err.to_string().contains(&format!("127.0.0.1:{}", port)));
    }
}
