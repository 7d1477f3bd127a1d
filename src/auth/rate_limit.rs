// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fixed-window action quotas.
//!
//! Each `(action kind, key)` pair owns one window `{count, started_at}`.
//! A window is valid for `window_hours` after it starts; the first access
//! after that replaces it with a fresh window. Check-and-increment holds the
//! window's shard lock for its whole duration, so concurrent requests for the
//! same key are linearized and cannot over-admit.
//!
//! Increments are not rolled back when a later stage of the request fails.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::RateLimitError;

/// Source of "now" for window arithmetic.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let delta = TimeDelta::from_std(by).unwrap_or(TimeDelta::MAX);
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now = now.checked_add_signed(delta).unwrap_or(*now);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Kinds of throttled actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Login / session issuance attempts, keyed before authentication
    Login,
    /// Message creation, keyed by principal
    Message,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Login => "login",
            ActionKind::Message => "message",
        }
    }

    pub fn parse(s: &str) -> Option<ActionKind> {
        match s.trim().to_lowercase().as_str() {
            "login" => Some(ActionKind::Login),
            "message" => Some(ActionKind::Message),
            _ => None,
        }
    }

    /// Whether the quota key is derived before authentication.
    pub fn is_pre_authentication(self) -> bool {
        matches!(self, ActionKind::Login)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quota for one action kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSpec {
    pub kind: ActionKind,
    pub max_count: u32,
    pub window_hours: u32,
}

impl RateLimitSpec {
    pub fn new(kind: ActionKind, max_count: u32, window_hours: u32) -> Self {
        Self {
            kind,
            max_count,
            window_hours,
        }
    }
}

/// Remaining quota in the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct RateStatus {
    /// Actions still allowed in the current window
    pub remaining: u32,
    /// Seconds until the window resets (0 when no window is running)
    pub reset_in_secs: u64,
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    started_at: DateTime<Utc>,
}

impl RateWindow {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            started_at: now,
        }
    }

    fn is_expired(&self, now: DateTime<Utc>, window: TimeDelta) -> bool {
        now - self.started_at >= window
    }

    /// Saturates at `Duration::MAX` when the reset lies past the last
    /// representable instant.
    fn time_left(&self, now: DateTime<Utc>, window: TimeDelta) -> Duration {
        match self.started_at.checked_add_signed(window) {
            Some(resets_at) => (resets_at - now).to_std().unwrap_or(Duration::ZERO),
            None => Duration::MAX,
        }
    }
}

/// In-memory window store with atomic check-and-increment per key.
pub struct RateLimiter {
    windows: DashMap<(ActionKind, String), RateWindow>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            clock,
        }
    }

    /// Count one action against `(kind, key)`, or refuse it if the window's
    /// quota is used up. A refused attempt is not counted.
    ///
    /// `max_count == 0` refuses everything.
    pub fn check_and_increment(
        &self,
        kind: ActionKind,
        key: &str,
        max_count: u32,
        window_hours: u32,
    ) -> Result<(), RateLimitError> {
        let window = window_length(window_hours);
        let now = self.clock.now();

        let mut entry = self
            .windows
            .entry((kind, key.to_string()))
            .or_insert_with(|| RateWindow::fresh(now));

        if entry.is_expired(now, window) {
            *entry = RateWindow::fresh(now);
        }

        if entry.count >= max_count {
            let retry_after = entry.time_left(now, window);
            tracing::warn!(
                kind = %kind,
                count = entry.count,
                max_count,
                retry_after_secs = retry_after.as_secs(),
                "rate limit exceeded"
            );
            return Err(RateLimitError::Exceeded { retry_after });
        }

        entry.count += 1;
        tracing::debug!(kind = %kind, count = entry.count, max_count, "rate limit counted");
        Ok(())
    }

    /// [`check_and_increment`](Self::check_and_increment) with a spec.
    pub fn check_spec(&self, spec: &RateLimitSpec, key: &str) -> Result<(), RateLimitError> {
        self.check_and_increment(spec.kind, key, spec.max_count, spec.window_hours)
    }

    /// Remaining quota for `(kind, key)` without counting anything.
    pub fn remaining(
        &self,
        kind: ActionKind,
        key: &str,
        max_count: u32,
        window_hours: u32,
    ) -> RateStatus {
        let window = window_length(window_hours);
        let now = self.clock.now();

        match self.windows.get(&(kind, key.to_string())) {
            Some(entry) if !entry.is_expired(now, window) => RateStatus {
                remaining: max_count.saturating_sub(entry.count),
                reset_in_secs: ceil_secs(entry.time_left(now, window)),
            },
            _ => RateStatus {
                remaining: max_count,
                reset_in_secs: 0,
            },
        }
    }

    /// Drop windows that started more than `max_window_hours` ago.
    ///
    /// Pass the longest configured window so no live window is removed.
    pub fn prune_expired(&self, max_window_hours: u32) -> usize {
        let window = window_length(max_window_hours);
        let now = self.clock.now();
        let before = self.windows.len();
        self.windows.retain(|_, w| !w.is_expired(now, window));
        before.saturating_sub(self.windows.len())
    }

    /// Number of tracked windows.
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn window_length(hours: u32) -> TimeDelta {
    TimeDelta::try_hours(i64::from(hours)).unwrap_or(TimeDelta::MAX)
}

/// Whole seconds, rounded up.
pub(crate) fn ceil_secs(d: Duration) -> u64 {
    d.as_secs().saturating_add(u64::from(d.subsec_nanos() > 0))
}
