//! Per-IP sliding-window rate limiting.
//!
//! Each client IP gets a ring buffer holding the instants of its last
//! `max_requests` accepted requests. A new request is accepted iff the
//! slot it would overwrite (the oldest) is empty or older than the
//! window. That's an exact "at most N per rolling minute" limit with
//! O(1) work per request and a fixed amount of memory per client.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Clients tracked before idle entries are swept.
const SWEEP_THRESHOLD: usize = 4096;

/// Hard cap on tracked clients. Unknown IPs beyond it are refused until a
/// sweep frees room.
const MAX_CLIENTS: usize = 4 * SWEEP_THRESHOLD;

/// Minimum time between two sweeps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

struct Window {
    stamps: Box<[Option<Instant>]>,
    next: usize,
}

impl Window {
    fn new(capacity: usize) -> Self {
        Self {
            stamps: vec![None; capacity].into_boxed_slice(),
            next: 0,
        }
    }

    fn try_record(&mut self, now: Instant, window: Duration) -> bool {
        let allowed = match self.stamps[self.next] {
            None => true,
            Some(oldest) => now.saturating_duration_since(oldest) > window,
        };
        if allowed {
            self.stamps[self.next] = Some(now);
            self.next = (self.next + 1) % self.stamps.len();
        }
        allowed
    }

    /// The most recent accepted request, if any.
    fn newest(&self) -> Option<Instant> {
        let last = (self.next + self.stamps.len() - 1) % self.stamps.len();
        self.stamps[last]
    }
}

#[derive(Default)]
struct Clients {
    windows: HashMap<IpAddr, Window>,
    last_sweep: Option<Instant>,
}

/// Limits each IP to `max_requests` per `window`.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    sweep_threshold: usize,
    max_clients: usize,
    clients: Mutex<Clients>,
}

impl RateLimiter {
    /// Creates a limiter allowing `max_requests` per `window` per IP.
    /// A limit of 0 is raised to 1.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self::with_capacity(max_requests, window, SWEEP_THRESHOLD, MAX_CLIENTS)
    }

    fn with_capacity(
        max_requests: usize,
        window: Duration,
        sweep_threshold: usize,
        max_clients: usize,
    ) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            sweep_threshold,
            max_clients: max_clients.max(sweep_threshold),
            clients: Mutex::new(Clients::default()),
        }
    }

    /// `max_requests` per rolling minute.
    pub fn per_minute(max_requests: usize) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }

    /// Records a request from `ip` now. Returns `false` if over the limit.
    pub fn allow(&self, ip: IpAddr) -> bool {
        self.allow_at(ip, Instant::now())
    }

    /// Records a request from `ip` at `now`. Returns `false` if over the
    /// limit; rejected requests don't count against the client.
    ///
    /// Idle clients are swept once the table reaches its threshold, at
    /// most once per second. A new client that finds the table full is
    /// refused.
    pub fn allow_at(&self, ip: IpAddr, now: Instant) -> bool {
        let mut clients = self.lock();
        if !clients.windows.contains_key(&ip) {
            if clients.windows.len() >= self.sweep_threshold {
                self.sweep(&mut clients, now);
            }
            if clients.windows.len() >= self.max_clients {
                tracing::warn!(
                    %ip,
                    tracked = clients.windows.len(),
                    "rate limiter full, refusing new client"
                );
                return false;
            }
        }
        clients
            .windows
            .entry(ip)
            .or_insert_with(|| Window::new(self.max_requests))
            .try_record(now, self.window)
    }

    fn sweep(&self, clients: &mut Clients, now: Instant) {
        let due = clients
            .last_sweep
            .is_none_or(|last| now.saturating_duration_since(last) >= SWEEP_INTERVAL);
        if !due {
            return;
        }
        clients.last_sweep = Some(now);
        let window = self.window;
        clients.windows.retain(|_, w| {
            w.newest()
                .is_some_and(|t| now.saturating_duration_since(t) <= window)
        });
    }

    /// Number of client IPs currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.lock().windows.len()
    }

    /// Forgets every client.
    pub fn clear(&self) {
        let mut clients = self.lock();
        clients.windows.clear();
        clients.last_sweep = None;
    }

    fn lock(&self) -> MutexGuard<'_, Clients> {
        // A panic while holding the lock can't leave a window half
        // updated in a harmful way, so a poisoned lock is still usable.
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn test_allow_at_under_limit_is_allowed() {
        let limiter = RateLimiter::per_minute(3);
        let now = Instant::now();
        assert!(limiter.allow_at(ip(1), now));
        assert!(limiter.allow_at(ip(1), now));
        assert!(limiter.allow_at(ip(1), now));
    }

    #[test]
    fn test_allow_at_over_limit_is_rejected() {
        let limiter = RateLimiter::per_minute(3);
        let now = Instant::now();
        for _ in 0..3 {
            assert!(limiter.allow_at(ip(1), now));
        }
        assert!(!limiter.allow_at(ip(1), now + Duration::from_secs(30)));
    }

    #[test]
    fn test_allow_at_after_window_is_allowed_again() {
        let limiter = RateLimiter::per_minute(2);
        let now = Instant::now();
        assert!(limiter.allow_at(ip(1), now));
        assert!(limiter.allow_at(ip(1), now + Duration::from_secs(10)));
        // Exactly one minute after the oldest: not yet.
        assert!(!limiter.allow_at(ip(1), now + Duration::from_secs(60)));
        // Just past it: the oldest slot frees up, but only that one.
        assert!(limiter.allow_at(ip(1), now + Duration::from_secs(61)));
        assert!(!limiter.allow_at(ip(1), now + Duration::from_secs(62)));
    }

    #[test]
    fn test_allow_at_limits_are_per_ip() {
        let limiter = RateLimiter::per_minute(1);
        let now = Instant::now();
        assert!(limiter.allow_at(ip(1), now));
        assert!(!limiter.allow_at(ip(1), now));
        assert!(limiter.allow_at(ip(2), now));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_new_zero_limit_is_raised_to_one() {
        let limiter = RateLimiter::per_minute(0);
        let now = Instant::now();
        assert!(limiter.allow_at(ip(1), now));
        assert!(!limiter.allow_at(ip(1), now));
    }

    #[test]
    fn test_clear_forgets_clients() {
        let limiter = RateLimiter::per_minute(1);
        let now = Instant::now();
        limiter.allow_at(ip(1), now);
        limiter.clear();
        assert_eq!(limiter.tracked_clients(), 0);
        assert!(limiter.allow_at(ip(1), now));
    }

    #[test]
    fn test_allow_at_sweeps_idle_clients_at_threshold() {
        let limiter = RateLimiter::with_capacity(1, Duration::from_secs(60), 2, 3);
        let now = Instant::now();
        assert!(limiter.allow_at(ip(1), now));
        assert!(limiter.allow_at(ip(2), now));

        assert!(limiter.allow_at(ip(3), now + Duration::from_secs(61)));

        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_allow_at_full_table_refuses_new_clients() {
        let limiter = RateLimiter::with_capacity(5, Duration::from_secs(60), 2, 3);
        let now = Instant::now();
        for last in 1..=3 {
            assert!(limiter.allow_at(ip(last), now));
        }

        // Every client is active and a sweep just ran.
        assert!(!limiter.allow_at(ip(4), now));
        assert_eq!(limiter.tracked_clients(), 3);
        // Known clients keep their own budget.
        assert!(limiter.allow_at(ip(1), now));
    }

    #[test]
    fn test_allow_at_sweeps_at_most_once_per_interval() {
        let limiter = RateLimiter::with_capacity(5, Duration::from_secs(60), 2, 3);
        let now = Instant::now();
        let at = |ms: u64| now + Duration::from_millis(ms);
        assert!(limiter.allow_at(ip(1), now));
        assert!(limiter.allow_at(ip(2), at(59_500)));
        // Sweeps with nothing idle yet, then fills the table.
        assert!(limiter.allow_at(ip(3), at(59_600)));

        // ip 1 has gone idle, but the last sweep is too recent.
        assert!(!limiter.allow_at(ip(4), at(60_200)));

        assert!(limiter.allow_at(ip(4), at(60_700)));
        assert_eq!(limiter.tracked_clients(), 3);
    }
}
