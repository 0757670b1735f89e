// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Latency Governor
//!
//! Every Seal runs inside a [`Deadline`]. Store calls are raced against both
//! the deadline and the node's shutdown token, and abandoned when either
//! fires. Abandoning does not revoke a write the store already accepted;
//! idempotency replay covers that case.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::SealingError;
use crate::store::{StoreError, StoreResult};

/// Recent latencies kept for percentile reporting.
const WINDOW: usize = 1024;

/// Pipeline step at which a deadline check happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validate,
    Idempotency,
    Reserve,
    Link,
    Commit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Validate => "validate",
            Stage::Idempotency => "idempotency",
            Stage::Reserve => "reserve",
            Stage::Link => "link",
            Stage::Commit => "commit",
        };
        f.write_str(s)
    }
}

/// Time budget of a single Seal.
#[derive(Debug, Clone)]
pub struct Deadline {
    started: Instant,
    expires: Instant,
    budget: Duration,
    cancel: CancellationToken,
}

impl Deadline {
    pub fn new(budget: Duration, cancel: CancellationToken) -> Self {
        let started = Instant::now();
        Self {
            started,
            expires: started + budget,
            budget,
            cancel,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }

    pub fn remaining(&self) -> Duration {
        self.expires.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn exceeded(&self, stage: Stage) -> SealingError {
        SealingError::DeadlineExceeded {
            stage,
            elapsed_ms: self.elapsed_ms(),
            budget_ms: self.budget.as_millis() as u64,
        }
    }

    pub fn checkpoint(&self, stage: Stage) -> Result<(), SealingError> {
        if self.is_cancelled() {
            return Err(cancelled());
        }
        if self.is_expired() {
            tracing::debug!("Deadline passed at {} after {} ms", stage, self.elapsed_ms());
            return Err(self.exceeded(stage));
        }
        Ok(())
    }

    /// Runs one store call under this deadline.
    ///
    /// `call` receives the timeout it must hand to the adapter: the smaller of
    /// the remaining budget and `store_timeout`.
    pub async fn bound<T, F, Fut>(&self, stage: Stage, store_timeout: Duration, call: F) -> Result<T, SealingError>
    where
        F: FnOnce(Duration) -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        self.checkpoint(stage)?;
        let remaining = self.remaining();
        let deadline_bound = remaining <= store_timeout;
        let fut = call(remaining.min(store_timeout));

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(cancelled()),
            res = tokio::time::timeout_at(self.expires, fut) => match res {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(StoreError::Timeout(_))) if deadline_bound => Err(self.exceeded(stage)),
                Ok(Err(e)) => {
                    tracing::error!("Store call failed during {}: {}", stage, e);
                    Err(e.into())
                }
                Err(_) => Err(self.exceeded(stage)),
            },
        }
    }

    /// Waits on a local future (e.g. a lock) under this deadline.
    pub async fn wait<T, Fut>(&self, stage: Stage, fut: Fut) -> Result<T, SealingError>
    where
        Fut: Future<Output = T>,
    {
        self.checkpoint(stage)?;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(cancelled()),
            res = tokio::time::timeout_at(self.expires, fut) => res.map_err(|_| self.exceeded(stage)),
        }
    }
}

fn cancelled() -> SealingError {
    SealingError::StoreUnavailable("sealing cancelled: node shutting down".into())
}

/// Terminal result of one Seal, as seen by the governor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Sealed,
    Replayed,
    /// Ran out of budget; the write may still land.
    TimedOut,
    /// Any other failure, by error kind.
    Rejected(&'static str),
}

impl From<&SealingError> for Outcome {
    fn from(e: &SealingError) -> Self {
        match e {
            SealingError::DeadlineExceeded { .. } => Outcome::TimedOut,
            other => Outcome::Rejected(other.kind()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub budget_ms: u64,
    pub sealed: u64,
    pub replayed: u64,
    pub rejected: u64,
    pub deadline_exceeded: u64,
    pub p50_ms: f64,
    pub p99_ms: f64,
    pub max_ms: f64,
}

#[derive(Debug, Default)]
struct Stats {
    sealed: u64,
    replayed: u64,
    rejected: u64,
    deadline_exceeded: u64,
    window: VecDeque<Duration>,
}

impl Stats {
    fn push(&mut self, latency: Duration) {
        if self.window.len() == WINDOW {
            self.window.pop_front();
        }
        self.window.push_back(latency);
    }
}

pub struct LatencyGovernor {
    budget: Duration,
    root: CancellationToken,
    stats: Mutex<Stats>,
}

impl LatencyGovernor {
    pub fn new(budget: Duration) -> Self {
        Self {
            budget,
            root: CancellationToken::new(),
            stats: Mutex::new(Stats::default()),
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Opens the deadline for a new Seal.
    pub fn start(&self) -> Deadline {
        Deadline::new(self.budget, self.root.child_token())
    }

    pub fn observe(&self, deadline: &Deadline, outcome: Outcome) {
        let latency = deadline.elapsed();
        metrics::histogram!("ledger_seal_duration_seconds", latency.as_secs_f64());

        match outcome {
            Outcome::Sealed => {
                metrics::increment_counter!("ledger_events_sealed_total");
            }
            Outcome::Replayed => {
                metrics::increment_counter!("ledger_idempotent_replays_total");
            }
            Outcome::TimedOut => {
                metrics::increment_counter!(
                    "ledger_seal_rejections_total",
                    "reason" => SealingError::DEADLINE_EXCEEDED
                );
            }
            Outcome::Rejected(reason) => {
                metrics::increment_counter!("ledger_seal_rejections_total", "reason" => reason);
            }
        }

        if latency > self.budget && outcome != Outcome::TimedOut {
            tracing::warn!("Seal took {:?}, over the {:?} budget", latency, self.budget);
        }

        let mut stats = match self.stats.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match outcome {
            Outcome::Sealed => stats.sealed += 1,
            Outcome::Replayed => stats.replayed += 1,
            Outcome::TimedOut => {
                stats.rejected += 1;
                stats.deadline_exceeded += 1;
            }
            Outcome::Rejected(_) => stats.rejected += 1,
        }
        stats.push(latency);
    }

    pub fn summary(&self) -> LatencySummary {
        let stats = match self.stats.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut sorted: Vec<Duration> = stats.window.iter().copied().collect();
        sorted.sort_unstable();

        LatencySummary {
            budget_ms: self.budget.as_millis() as u64,
            sealed: stats.sealed,
            replayed: stats.replayed,
            rejected: stats.rejected,
            deadline_exceeded: stats.deadline_exceeded,
            p50_ms: percentile(&sorted, 0.50),
            p99_ms: percentile(&sorted, 0.99),
            max_ms: sorted.last().map(as_ms).unwrap_or(0.0),
        }
    }

    /// Cancels every in-flight Seal. New deadlines start cancelled.
    pub fn shutdown(&self) {
        tracing::info!("Governor shutting down, abandoning in-flight seals");
        self.root.cancel();
    }
}

fn as_ms(d: &Duration) -> f64 {
    d.as_micros() as f64 / 1000.0
}

/// Nearest-rank percentile over an ascending slice.
fn percentile(sorted: &[Duration], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (q * sorted.len() as f64).ceil() as usize;
    as_ms(&sorted[rank.clamp(1, sorted.len()) - 1])
}
