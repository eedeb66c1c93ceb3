//! Browser identities for outbound requests.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};

use crate::config::UserAgentStrategy;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_1) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// Fixed pool of plausible browser User-Agent strings.
///
/// Only varies the outbound fingerprint; nothing depends on which string is picked.
pub struct UserAgentRotator {
    pool: &'static [&'static str],
    next: AtomicUsize,
    strategy: UserAgentStrategy,
}

impl UserAgentRotator {
    pub fn new(strategy: UserAgentStrategy) -> Self {
        Self {
            pool: USER_AGENTS,
            next: AtomicUsize::new(0),
            strategy,
        }
    }

    pub fn pool(&self) -> &'static [&'static str] {
        self.pool
    }

    /// Uniformly random pick.
    pub fn get_random(&self) -> &'static str {
        self.pool
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0])
    }

    /// Round-robin pick, shared across callers.
    pub fn get_next(&self) -> &'static str {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.pool.len();
        self.pool[index]
    }

    /// Pick according to the configured strategy.
    pub fn pick(&self) -> &'static str {
        match self.strategy {
            UserAgentStrategy::Random => self.get_random(),
            UserAgentStrategy::RoundRobin => self.get_next(),
        }
    }
}

impl Default for UserAgentRotator {
    fn default() -> Self {
        Self::new(UserAgentStrategy::Random)
    }
}

/// Headers a browser would send to a JSON endpoint.
pub fn browser_headers(user_agent: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("zh-TW,zh;q=0.9,en-US;q=0.8,en;q=0.7"),
    );
    headers.insert(USER_AGENT, HeaderValue::from_static(user_agent));
    headers
}
