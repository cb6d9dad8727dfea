//! Local origin server and forward proxy for end-to-end tests
#![allow(dead_code)]

use anyhow::Result;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use gauge_http::{Endpoint, HttpConfig, HttpFetcher, ProxyTarget, TransferClass};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

pub const PAGE: &str = "<html><body><h1>Professor</h1><p>Short biography.</p></body></html>";
pub const CACHEABLE: &str = "<html><body>cacheable page</body></html>";

/// How long a cold fetch of `/cacheable` takes at the origin
pub const COLD_DELAY: Duration = Duration::from_millis(200);

/// Deterministic binary payload with every byte value present
pub fn image_bytes() -> Vec<u8> {
    (0..8192u32).map(|i| (i * 31 % 256) as u8).collect()
}

pub struct Origin {
    pub addr: SocketAddr,
}

impl Origin {
    pub async fn start() -> Result<Self> {
        let app = Router::new()
            .route("/page", get(|| async { PAGE }))
            .route("/image", get(|| async { image_bytes() }))
            .route(
                "/cacheable",
                get(|| async {
                    tokio::time::sleep(COLD_DELAY).await;
                    CACHEABLE
                }),
            )
            .route(
                "/missing",
                get(|| async { (StatusCode::NOT_FOUND, "no such page") }),
            )
            .route(
                "/stall",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            );

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(Self { addr })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn endpoint(&self, path: &str, class: TransferClass) -> Endpoint {
        Endpoint::parse(&self.url(path), class, "text/html").expect("valid origin url")
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ProxyMode {
    /// Relay every response unchanged
    Faithful,
    /// Serve repeat requests from memory
    Caching,
    /// Corrupt responses once more than `limit` requests have been in flight
    /// at the same time
    CorruptAbove(usize),
}

struct ProxyState {
    mode: ProxyMode,
    client: reqwest::Client,
    cache: Mutex<HashMap<String, Bytes>>,
    requests: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// Time each request is held so that a round's requests overlap
const HOLD: Duration = Duration::from_millis(150);

impl ProxyState {
    async fn respond(&self, url: &str) -> Response {
        if let ProxyMode::Caching = self.mode {
            let cached = self.cache.lock().unwrap().get(url).cloned();
            if let Some(body) = cached {
                return (StatusCode::OK, body).into_response();
            }
        }

        let corrupt = match self.mode {
            ProxyMode::CorruptAbove(limit) => {
                tokio::time::sleep(HOLD).await;
                self.peak.load(Ordering::SeqCst) > limit
            }
            _ => false,
        };

        let upstream = match self.client.get(url).send().await {
            Ok(upstream) => upstream,
            Err(e) => return (StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
        };
        let status = StatusCode::from_u16(upstream.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        let body = match upstream.bytes().await {
            Ok(body) => body,
            Err(e) => return (StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
        };

        if let ProxyMode::Caching = self.mode {
            self.cache.lock().unwrap().insert(url.to_string(), body.clone());
        }

        let body = if corrupt {
            let mut bytes = body.to_vec();
            if let Some(last) = bytes.last_mut() {
                *last ^= 0xff;
            }
            Bytes::from(bytes)
        } else {
            body
        };
        (status, body).into_response()
    }
}

/// Requests through an HTTP proxy arrive in absolute form, so the request URI
/// is the upstream URL.
async fn forward(State(state): State<Arc<ProxyState>>, request: Request) -> Response {
    let url = request.uri().to_string();
    state.requests.fetch_add(1, Ordering::SeqCst);
    let in_flight = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.peak.fetch_max(in_flight, Ordering::SeqCst);

    let response = state.respond(&url).await;

    state.in_flight.fetch_sub(1, Ordering::SeqCst);
    response
}

pub struct TestProxy {
    pub addr: SocketAddr,
    state: Arc<ProxyState>,
}

impl TestProxy {
    pub async fn start(mode: ProxyMode) -> Result<Self> {
        let state = Arc::new(ProxyState {
            mode,
            client: reqwest::Client::builder().no_proxy().build()?,
            cache: Mutex::new(HashMap::new()),
            requests: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let app = Router::new().fallback(forward).with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(Self { addr, state })
    }

    pub fn target(&self) -> ProxyTarget {
        ProxyTarget::new("127.0.0.1", self.addr.port())
    }

    /// Requests relayed so far
    pub fn requests(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous requests seen
    pub fn peak(&self) -> usize {
        self.state.peak.load(Ordering::SeqCst)
    }
}

pub fn fetcher(proxy: &TestProxy) -> Arc<HttpFetcher> {
    fetcher_with(HttpConfig::default(), proxy.target())
}

pub fn fetcher_with(config: HttpConfig, target: ProxyTarget) -> Arc<HttpFetcher> {
    Arc::new(HttpFetcher::new(config, Some(target)).expect("http clients build"))
}

/// A local port with nothing listening on it
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    port
}
