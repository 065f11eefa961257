use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Token-bucket-by-window rate limiter keyed by client address. Each key
/// keeps a list of recent request timestamps; a request is allowed if fewer
/// than `max_requests` fall within the trailing `window`.
pub struct RateLimiter {
    requests: DashMap<String, Vec<Instant>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            requests: DashMap::new(),
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Records the attempt and returns whether it's allowed.
    pub fn is_allowed(&self, client_key: &str) -> bool {
        let now = Instant::now();
        let mut entry = self.requests.entry(client_key.to_string()).or_default();
        entry.retain(|&t| now.duration_since(t) < self.window);

        if entry.len() >= self.max_requests as usize {
            return false;
        }

        entry.push(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_limit_then_rejects() {
        let limiter = RateLimiter::new(3, 60);
        assert!(limiter.is_allowed("1.2.3.4"));
        assert!(limiter.is_allowed("1.2.3.4"));
        assert!(limiter.is_allowed("1.2.3.4"));
        assert!(!limiter.is_allowed("1.2.3.4"));
    }

    #[test]
    fn tracks_clients_independently() {
        let limiter = RateLimiter::new(1, 60);
        assert!(limiter.is_allowed("a"));
        assert!(limiter.is_allowed("b"));
        assert!(!limiter.is_allowed("a"));
    }
}
