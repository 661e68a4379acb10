// ============================================================================
// RateLimiter — per-IP sliding window
// ============================================================================

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Tracked addresses before idle entries are swept
const MAX_TRACKED_CLIENTS: usize = 10_000;

pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    requests: Mutex<HashMap<IpAddr, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            requests: Mutex::new(HashMap::new()),
        }
    }

    /// Record a request from `ip`; false when the window is already full
    pub fn check(&self, ip: IpAddr) -> bool {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> bool {
        let mut requests = self
            .requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if requests.len() >= MAX_TRACKED_CLIENTS {
            let window = self.window;
            requests.retain(|_, times| {
                times
                    .back()
                    .is_some_and(|last| now.duration_since(*last) <= window)
            });
            debug!("Swept rate limiter, {} clients tracked", requests.len());
        }

        let times = requests.entry(ip).or_default();
        while times
            .front()
            .is_some_and(|t| now.duration_since(*t) > self.window)
        {
            times.pop_front();
        }

        if times.len() >= self.max_requests {
            return false;
        }

        times.push_back(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_up_to_limit() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        let now = Instant::now();

        assert!(limiter.check_at(ip, now));
        assert!(limiter.check_at(ip, now));
        assert!(limiter.check_at(ip, now));
        assert!(!limiter.check_at(ip, now));
    }

    #[test]
    fn test_window_slides() {
        let limiter = RateLimiter::new(2, Duration::from_secs(10));
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        let start = Instant::now();

        assert!(limiter.check_at(ip, start));
        assert!(limiter.check_at(ip, start + Duration::from_secs(5)));
        assert!(!limiter.check_at(ip, start + Duration::from_secs(9)));
        // First request has left the window
        assert!(limiter.check_at(ip, start + Duration::from_secs(11)));
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();

        assert!(limiter.check_at("10.0.0.1".parse().unwrap(), now));
        assert!(!limiter.check_at("10.0.0.1".parse().unwrap(), now));
        assert!(limiter.check_at("10.0.0.2".parse().unwrap(), now));
    }
}
