//! Fixed-window request gate keyed by client identity.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use utoipa::ToSchema;

use crate::config::RateLimitingConfig;

/// Policy values the gate enforces.
#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    pub allowed_origin: String,
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitPolicy {
    pub fn new(
        allowed_origin: impl Into<String>,
        max_requests: u32,
        window: std::time::Duration,
    ) -> Self {
        Self {
            allowed_origin: allowed_origin.into(),
            max_requests,
            window: Duration::from_std(window).unwrap_or_else(|_| Duration::days(36_500)),
        }
    }

    fn bypasses(&self, referer: &str) -> bool {
        !self.allowed_origin.is_empty() && referer.starts_with(&self.allowed_origin)
    }
}

impl From<&RateLimitingConfig> for RateLimitPolicy {
    fn from(config: &RateLimitingConfig) -> Self {
        Self::new(
            config.allowed_origin.clone(),
            config.max_requests_per_window,
            config.window(),
        )
    }
}

/// Requests seen from one identity in its current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageRecord {
    pub count: u32,
    pub reset_at: DateTime<Utc>,
}

impl UsageRecord {
    fn fresh(now: DateTime<Utc>, window: Duration) -> Self {
        Self {
            count: 0,
            reset_at: now
                .checked_add_signed(window)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.reset_at
    }
}

/// Quota figures reported alongside a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaStatus {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Referer matched the allowed origin; no counter was touched.
    Bypassed,
    Admitted(QuotaStatus),
    Rejected {
        quota: QuotaStatus,
        retry_after_minutes: u64,
    },
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Decision::Rejected { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UsageEntry {
    pub ip: String,
    pub count: u32,
    #[serde(rename = "resetTime")]
    pub reset_time: String,
    pub remaining: u32,
}

/// Read-only view of the gate's state.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStats {
    #[serde(rename = "totalTrackedIPs")]
    pub total_tracked_ips: usize,
    pub allowed_domain: String,
    pub max_requests_per_day: u32,
    pub window_ms: i64,
    pub current_entries: Vec<UsageEntry>,
}

/// Per-identity request gate.
///
/// Each identity's check-and-increment runs under the map shard lock for
/// that key, so concurrent requests from one client cannot overshoot the
/// limit. Windows are fixed: a burst at the end of one window followed by a
/// burst at the start of the next can pass up to twice the limit.
pub struct RateLimiter {
    policy: RateLimitPolicy,
    records: DashMap<String, UsageRecord>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            records: DashMap::new(),
        }
    }

    pub fn from_config(config: &RateLimitingConfig) -> Self {
        Self::new(RateLimitPolicy::from(config))
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Check a request against the current wall clock.
    pub fn check(&self, identity: &str, referer: &str) -> Decision {
        self.check_at(identity, referer, Utc::now())
    }

    pub fn check_at(&self, identity: &str, referer: &str, now: DateTime<Utc>) -> Decision {
        if self.policy.bypasses(referer) {
            trace!(identity, referer, "Allowed origin, skipping quota");
            return Decision::Bypassed;
        }

        match self.records.entry(identity.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    debug!(identity, "Usage window expired, starting a new one");
                    let mut record = UsageRecord::fresh(now, self.policy.window);
                    let decision = self.evaluate(&mut record, now);
                    if decision.is_admitted() {
                        occupied.insert(record);
                    } else {
                        occupied.remove();
                    }
                    decision
                } else {
                    self.evaluate(occupied.get_mut(), now)
                }
            }
            Entry::Vacant(vacant) => {
                let mut record = UsageRecord::fresh(now, self.policy.window);
                let decision = self.evaluate(&mut record, now);
                if decision.is_admitted() {
                    vacant.insert(record);
                }
                decision
            }
        }
    }

    /// Increments `record` only when the request is admitted.
    fn evaluate(&self, record: &mut UsageRecord, now: DateTime<Utc>) -> Decision {
        let limit = self.policy.max_requests;

        if record.count >= limit {
            let quota = QuotaStatus {
                limit,
                remaining: 0,
                reset_at: record.reset_at,
            };
            return Decision::Rejected {
                quota,
                retry_after_minutes: minutes_until(record.reset_at, now),
            };
        }

        record.count += 1;
        Decision::Admitted(QuotaStatus {
            limit,
            remaining: limit.saturating_sub(record.count),
            reset_at: record.reset_at,
        })
    }

    /// Current record for an identity, if one is tracked.
    pub fn usage(&self, identity: &str) -> Option<UsageRecord> {
        self.records.get(identity).map(|record| *record)
    }

    pub fn tracked_identities(&self) -> usize {
        self.records.len()
    }

    pub fn stats(&self) -> RateLimitStats {
        let mut current_entries: Vec<UsageEntry> = self
            .records
            .iter()
            .map(|entry| UsageEntry {
                ip: entry.key().clone(),
                count: entry.count,
                reset_time: entry.reset_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                remaining: self.policy.max_requests.saturating_sub(entry.count),
            })
            .collect();
        current_entries.sort_by(|a, b| a.ip.cmp(&b.ip));

        RateLimitStats {
            total_tracked_ips: current_entries.len(),
            allowed_domain: self.policy.allowed_origin.clone(),
            max_requests_per_day: self.policy.max_requests,
            window_ms: self.policy.window.num_milliseconds(),
            current_entries,
        }
    }

    /// Remove every expired record. Returns how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        self.cleanup_expired_at(Utc::now())
    }

    pub fn cleanup_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        self.records.retain(|_, record| {
            if record.is_expired(now) {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }
}

/// Whole minutes until `reset_at`, rounded up.
fn minutes_until(reset_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let millis = (reset_at - now).num_milliseconds().max(0) as u64;
    millis.div_ceil(60_000)
}
