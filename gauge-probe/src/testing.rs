//! Scripted in-memory fetcher for deterministic tests
//!
//! Every direct fetch opens a new "round" on the script; proxied fetches are
//! numbered 1, 2, 3... within the current round in the order they reach the
//! fetcher. Faults are keyed on that ordinal, which makes behaviour depend only
//! on how many fetches a round issued, never on scheduling.

use async_trait::async_trait;
use bytes::Bytes;
use gauge_http::{Endpoint, FetchError, FetchResult, Fetcher, Route};
use std::sync::Mutex;
use std::time::Duration;

/// Misbehaviour injected into proxied fetches
#[derive(Debug, Clone)]
pub enum Fault {
    /// Ordinals above `limit` get one byte flipped at `offset`
    CorruptBeyond { limit: usize, offset: usize },
    /// Ordinals above `limit` fail with `error`
    FailBeyond { limit: usize, error: FetchError },
    /// Ordinals above `limit` are cut to their first `keep` bytes
    TruncateBeyond { limit: usize, keep: usize },
    /// The fetch with this ordinal stalls for `duration` before answering
    Stall { ordinal: usize, duration: Duration },
}

#[derive(Debug, Default)]
struct ScriptState {
    generation: usize,
    rounds: Vec<usize>,
    direct_calls: usize,
    proxied_calls: usize,
}

/// A [`Fetcher`] that serves a fixed body and reports synthetic latencies
#[derive(Debug)]
pub struct ScriptedFetcher {
    body: Bytes,
    direct_latency: Duration,
    proxied_latency: Duration,
    proxied_latency_script: Vec<Duration>,
    rotate_content: bool,
    direct_error: Option<FetchError>,
    fault: Option<Fault>,
    state: Mutex<ScriptState>,
}

impl ScriptedFetcher {
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            direct_latency: Duration::from_millis(10),
            proxied_latency: Duration::from_millis(10),
            proxied_latency_script: Vec::new(),
            rotate_content: false,
            direct_error: None,
            fault: None,
            state: Mutex::new(ScriptState::default()),
        }
    }

    /// Elapsed time reported for every fetch on `route`
    pub fn with_latency(mut self, route: Route, latency: Duration) -> Self {
        match route {
            Route::Direct => self.direct_latency = latency,
            Route::Proxied => self.proxied_latency = latency,
        }
        self
    }

    /// Elapsed times for the first proxied fetches, in call order
    pub fn with_proxied_latencies(mut self, latencies: Vec<Duration>) -> Self {
        self.proxied_latency_script = latencies;
        self
    }

    /// Change the served content every time a direct fetch is made
    pub fn rotating_content(mut self) -> Self {
        self.rotate_content = true;
        self
    }

    pub fn fail_direct(mut self, error: FetchError) -> Self {
        self.direct_error = Some(error);
        self
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = Some(fault);
        self
    }

    /// Proxied fetches per round, in round order
    pub fn rounds(&self) -> Vec<usize> {
        self.lock().rounds.clone()
    }

    pub fn direct_calls(&self) -> usize {
        self.lock().direct_calls
    }

    pub fn proxied_calls(&self) -> usize {
        self.lock().proxied_calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn body_for(&self, generation: usize) -> Bytes {
        if self.rotate_content {
            let mut body = self.body.to_vec();
            body.extend_from_slice(format!("#{}", generation).as_bytes());
            Bytes::from(body)
        } else {
            self.body.clone()
        }
    }

    async fn fetch_proxied(&self) -> FetchResult {
        let (ordinal, call, generation) = {
            let mut state = self.lock();
            if state.rounds.is_empty() {
                state.rounds.push(0);
            }
            let call = state.proxied_calls;
            state.proxied_calls += 1;
            let current = state.rounds.last_mut().map(|n| {
                *n += 1;
                *n
            });
            (current.unwrap_or(1), call, state.generation)
        };

        let latency = self
            .proxied_latency_script
            .get(call)
            .copied()
            .unwrap_or(self.proxied_latency);
        let body = self.body_for(generation);

        match self.fault {
            Some(Fault::CorruptBeyond { limit, offset }) if ordinal > limit => {
                let mut corrupted = body.to_vec();
                match corrupted.get_mut(offset) {
                    Some(byte) => *byte ^= 0xff,
                    None => corrupted.push(b'!'),
                }
                FetchResult::success(Route::Proxied, 200, Bytes::from(corrupted), latency)
            }
            Some(Fault::FailBeyond { limit, ref error }) if ordinal > limit => {
                FetchResult::failure(Route::Proxied, error.clone(), latency)
            }
            Some(Fault::TruncateBeyond { limit, keep }) if ordinal > limit => {
                let keep = keep.min(body.len());
                FetchResult::success(Route::Proxied, 200, body.slice(..keep), latency)
            }
            Some(Fault::Stall { ordinal: stalled, duration }) if ordinal == stalled => {
                tokio::time::sleep(duration).await;
                FetchResult::success(Route::Proxied, 200, body, duration)
            }
            _ => FetchResult::success(Route::Proxied, 200, body, latency),
        }
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, _endpoint: &Endpoint, route: Route) -> FetchResult {
        match route {
            Route::Direct => {
                let generation = {
                    let mut state = self.lock();
                    state.direct_calls += 1;
                    state.generation += 1;
                    state.rounds.push(0);
                    state.generation
                };

                match self.direct_error {
                    Some(ref error) => {
                        FetchResult::failure(Route::Direct, error.clone(), self.direct_latency)
                    }
                    None => FetchResult::success(
                        Route::Direct,
                        200,
                        self.body_for(generation),
                        self.direct_latency,
                    ),
                }
            }
            Route::Proxied => self.fetch_proxied().await,
        }
    }
}
