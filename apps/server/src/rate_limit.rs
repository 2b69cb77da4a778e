//! Per-route, per-client rate governor
//!
//! A soft, process-local fixed-window counter: state is lost on restart and
//! no cross-instance coordination is attempted. Each `(client, route)` pair
//! gets a window record; the counter always increments, then is compared
//! against the route's quota. A periodic sweep drops expired windows to
//! bound memory.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::config::{RateLimitConfig, RouteQuota};

/// Outcome of a governor check, carrying everything the HTTP layer needs for
/// the `X-RateLimit-*` and `Retry-After` headers.
#[derive(Debug, Clone)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub retry_after: Duration,
    pub reset_at: DateTime<Utc>,
}

struct Window {
    count: u32,
    started: Instant,
}

pub struct RateGovernor {
    config: RateLimitConfig,
    windows: Mutex<HashMap<(String, String), Window>>,
    sweeper: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl RateGovernor {
    /// Create the governor and start its stale-window sweep.
    pub fn new(config: RateLimitConfig) -> Arc<Self> {
        let interval = Duration::from_secs(config.sweep_interval_seconds.max(1));

        let governor = Arc::new(Self {
            config,
            windows: Mutex::new(HashMap::new()),
            sweeper: Mutex::new(None),
        });

        let weak = Arc::downgrade(&governor);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(governor) = weak.upgrade() else {
                    break;
                };
                governor.sweep_stale();
            }
        });
        *governor.sweeper.lock().expect("governor mutex poisoned") = Some(handle);

        governor
    }

    fn quota_for(&self, route: &str) -> &RouteQuota {
        self.config.routes.get(route).unwrap_or(&self.config.default)
    }

    /// Record one attempt for `(client_key, route)` and decide whether it is
    /// within quota.
    pub fn check(&self, client_key: &str, route: &str) -> RateDecision {
        let quota = self.quota_for(route);
        let window_duration = quota.window();
        let now = Instant::now();

        let mut windows = self.windows.lock().expect("governor mutex poisoned");
        let window = windows
            .entry((client_key.to_string(), route.to_string()))
            .or_insert(Window {
                count: 0,
                started: now,
            });

        if now.duration_since(window.started) >= window_duration {
            window.count = 0;
            window.started = now;
        }

        window.count += 1;
        let allowed = window.count <= quota.max_requests;
        let remaining = quota.max_requests.saturating_sub(window.count);

        let window_remaining =
            window_duration.saturating_sub(now.duration_since(window.started));
        let reset_at = Utc::now()
            + chrono::Duration::from_std(window_remaining)
                .unwrap_or_else(|_| chrono::Duration::seconds(0));

        let retry_after = if allowed {
            Duration::ZERO
        } else {
            // Round up so clients never retry a moment too early.
            Duration::from_secs(window_remaining.as_secs_f64().ceil() as u64)
        };

        RateDecision {
            allowed,
            limit: quota.max_requests,
            remaining,
            retry_after,
            reset_at,
        }
    }

    /// Drop windows whose period has fully elapsed.
    pub fn sweep_stale(&self) {
        let mut windows = self.windows.lock().expect("governor mutex poisoned");
        let before = windows.len();
        windows.retain(|(_, route), window| {
            window.started.elapsed() < self.quota_for(route).window()
        });
        let purged = before - windows.len();
        if purged > 0 {
            tracing::debug!(purged, "Purged stale rate windows");
        }
    }

    /// Number of live windows (sweep diagnostics and tests).
    pub fn window_count(&self) -> usize {
        self.windows.lock().expect("governor mutex poisoned").len()
    }

    pub fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().expect("governor mutex poisoned").take() {
            handle.abort();
        }
    }
}
