//! HTTP client implementation

use crate::config::HttpConfig;
use crate::errors::FetchError;
use crate::types::{Endpoint, FetchResult, ProxyTarget, Route};
use reqwest::Client;
use std::time::Instant;
use tracing::{debug, warn};

/// Something that can perform a single GET for an endpoint.
///
/// Implementations must never panic or return early on network failure:
/// every problem is reported through [`FetchResult::error`].
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, endpoint: &Endpoint, route: Route) -> FetchResult;
}

/// reqwest-backed fetcher holding one client per route.
///
/// Both clients keep no idle connections, so every fetch opens its own
/// connection the way an independent client would.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    direct: Client,
    proxied: Option<Client>,
    proxy: Option<ProxyTarget>,
    config: HttpConfig,
}

impl HttpFetcher {
    /// Build the direct client and, when a proxy is given, the proxied one
    pub fn new(config: HttpConfig, proxy: Option<ProxyTarget>) -> Result<Self, FetchError> {
        debug!(
            "Creating HttpFetcher with timeout: {}s, proxy: {:?}",
            config.timeout.as_secs(),
            proxy.as_ref().map(|p| p.to_string())
        );

        // The direct client must ignore HTTP_PROXY and friends, otherwise the
        // baseline itself would travel through some proxy.
        let direct = Self::builder(&config)
            .no_proxy()
            .build()
            .map_err(|e| FetchError::from_reqwest(&e, config.timeout))?;

        let proxied = match proxy {
            Some(ref target) => {
                let proxy = reqwest::Proxy::all(target.proxy_url())
                    .map_err(|e| FetchError::from_reqwest(&e, config.timeout))?;
                Some(
                    Self::builder(&config)
                        .proxy(proxy)
                        .build()
                        .map_err(|e| FetchError::from_reqwest(&e, config.timeout))?,
                )
            }
            None => None,
        };

        Ok(Self {
            direct,
            proxied,
            proxy,
            config,
        })
    }

    /// Direct-only fetcher, used where no proxy is involved
    pub fn direct(config: HttpConfig) -> Result<Self, FetchError> {
        Self::new(config, None)
    }

    pub fn proxy(&self) -> Option<&ProxyTarget> {
        self.proxy.as_ref()
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    fn builder(config: &HttpConfig) -> reqwest::ClientBuilder {
        Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .redirect(reqwest::redirect::Policy::limited(
                config.max_redirects as usize,
            ))
            .pool_max_idle_per_host(0)
    }

    fn client_for(&self, route: Route) -> Option<&Client> {
        match route {
            Route::Direct => Some(&self.direct),
            Route::Proxied => self.proxied.as_ref(),
        }
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, endpoint: &Endpoint, route: Route) -> FetchResult {
        let start = Instant::now();

        let Some(client) = self.client_for(route) else {
            warn!("Proxied fetch of {} requested without a proxy target", endpoint);
            return FetchResult::failure(route, FetchError::NoProxy, start.elapsed());
        };

        debug!("GET {} ({})", endpoint, route);
        let response = match client.get(endpoint.url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                let error = FetchError::from_reqwest(&e, self.config.timeout);
                debug!("GET {} ({}) failed: {}", endpoint, route, error);
                return FetchResult::failure(route, error, start.elapsed());
            }
        };

        // Non-2xx bodies are still returned: the verifier decides on bytes alone.
        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(bytes) => {
                let elapsed = start.elapsed();
                debug!(
                    "GET {} ({}) -> {} with {} bytes in {:?}",
                    endpoint,
                    route,
                    status,
                    bytes.len(),
                    elapsed
                );
                FetchResult::success(route, status, bytes, elapsed)
            }
            Err(e) => {
                let error = FetchError::from_reqwest(&e, self.config.timeout);
                debug!("Reading body of {} ({}) failed: {}", endpoint, route, error);
                FetchResult::failure(route, error, start.elapsed())
            }
        }
    }
}
