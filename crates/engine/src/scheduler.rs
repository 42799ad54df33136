// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tick-driven poll scheduling and circuit breaker gating, following a
//! tick-and-dispatch shape: a flat table of timers checked once per tick,
//! firing when their deadline has passed. Here each "timer" is a
//! plugin/command poll schedule instead of a cron job's next run.

use crate::error::EngineError;
use crate::store::Store;
use crate::work_queue::{EnqueueParams, WorkQueue};
use ductile_core::{Clock, Event, IdGen, LifecycleEvent};
use ductile_storage::BreakerStatus;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

/// One plugin command the scheduler polls on a fixed interval.
#[derive(Debug, Clone)]
pub struct ScheduleEntry {
    pub plugin: String,
    pub command: String,
    pub interval: Duration,
}

/// Parse a schedule expression: `<number><unit>` (`s`/`m`/`h`/`d`/`w`) or one
/// of the named aliases `hourly`/`daily`/`weekly`/`monthly`.
pub fn parse_schedule_expr(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    match raw {
        "hourly" => return Ok(Duration::from_secs(3600)),
        "daily" => return Ok(Duration::from_secs(86_400)),
        "weekly" => return Ok(Duration::from_secs(7 * 86_400)),
        "monthly" => return Ok(Duration::from_secs(30 * 86_400)),
        _ => {}
    }
    if raw.is_empty() {
        return Err("empty schedule expression".to_string());
    }
    let split_at = raw
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(raw.len());
    let (num, unit) = raw.split_at(split_at);
    let num: u64 = num.parse().map_err(|_| format!("invalid number in schedule: {raw}"))?;
    let secs = match unit {
        "s" => num,
        "m" => num * 60,
        "h" => num * 3600,
        "d" => num * 86_400,
        "w" => num * 604_800,
        other => return Err(format!("unknown schedule unit: {other}")),
    };
    Ok(Duration::from_secs(secs))
}

fn breaker_key(plugin: &str, command: &str) -> String {
    format!("{plugin}:{command}")
}

pub struct Scheduler<G: IdGen, C: Clock> {
    store: Arc<Store>,
    clock: Arc<C>,
    work_queue: Arc<WorkQueue<G, C>>,
    entries: Vec<ScheduleEntry>,
    breaker_threshold: u32,
    breaker_cooldown: Duration,
    /// Poll guard: an entry is only enqueued while it has fewer than this
    /// many non-terminal (`Queued`/`Running`) jobs outstanding.
    max_outstanding_polls: u32,
    /// Consecutive-failure counters per (plugin, command). Ephemeral: a
    /// restart resets them, which only delays breaker-opening rather than
    /// ever masking a real outage (the persisted `BreakerRecord` is what
    /// gates poll enqueue across restarts, not this counter).
    failure_counts: Mutex<HashMap<String, u32>>,
}

impl<G: IdGen, C: Clock> Scheduler<G, C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<Store>,
        clock: Arc<C>,
        work_queue: Arc<WorkQueue<G, C>>,
        entries: Vec<ScheduleEntry>,
        breaker_threshold: u32,
        breaker_cooldown: Duration,
        max_outstanding_polls: u32,
    ) -> Self {
        Self {
            store,
            clock,
            work_queue,
            entries,
            breaker_threshold,
            breaker_cooldown,
            max_outstanding_polls,
            failure_counts: Mutex::new(HashMap::new()),
        }
    }

    fn now_ms(&self) -> u64 {
        self.clock.now().timestamp_millis().max(0) as u64
    }

    /// One scheduler tick: enqueue a poll job for every entry whose breaker
    /// allows it, promoting any cooled-down `Open` breaker to `HalfOpen`
    /// first. Returns lifecycle events worth publishing.
    pub fn tick(&self) -> Result<Vec<LifecycleEvent>, EngineError> {
        let now_ms = self.now_ms();
        let mut published = Vec::new();

        for entry in &self.entries {
            if let Some(event) = self.promote_if_cooled_down(&entry.plugin, &entry.command, now_ms)? {
                published.push(event);
            }

            let status = self.store.read().breaker(&entry.plugin, &entry.command).status;
            if status == BreakerStatus::Open {
                published.push(LifecycleEvent::PollThrottled {
                    plugin: entry.plugin.clone(),
                    command: entry.command.clone(),
                });
                continue;
            }

            let outstanding = self.outstanding_count(&entry.plugin, &entry.command);
            if outstanding >= self.max_outstanding_polls {
                published.push(LifecycleEvent::PollThrottled {
                    plugin: entry.plugin.clone(),
                    command: entry.command.clone(),
                });
                continue;
            }

            let interval_ms = entry.interval.as_millis().max(1) as u64;
            let bucket = now_ms / interval_ms;
            let dedupe_key = format!("poll:{}:{}:{}", entry.plugin, entry.command, bucket);

            let params = EnqueueParams::new(entry.plugin.clone(), entry.command.clone(), "scheduler")
                .with_dedupe_key(dedupe_key)
                .with_payload(serde_json::json!({}));
            self.work_queue.enqueue(params)?;
        }

        Ok(published)
    }

    /// Count this entry's non-terminal (`Queued`/`Running`) jobs, the poll
    /// guard's "already outstanding" tally.
    fn outstanding_count(&self, plugin: &str, command: &str) -> u32 {
        self.work_queue
            .list_jobs(&crate::work_queue::JobFilter {
                plugin: Some(plugin.to_string()),
                command: Some(command.to_string()),
                status: None,
            })
            .iter()
            .filter(|j| !j.status.is_terminal())
            .count() as u32
    }

    fn promote_if_cooled_down(
        &self,
        plugin: &str,
        command: &str,
        now_ms: u64,
    ) -> Result<Option<LifecycleEvent>, EngineError> {
        let record = self.store.read().breaker(plugin, command);
        if record.status == BreakerStatus::Open && record.until_ms.is_some_and(|until| until <= now_ms) {
            self.store.apply(Event::BreakerHalfOpen {
                plugin: plugin.to_string(),
                command: command.to_string(),
            })?;
            return Ok(Some(LifecycleEvent::BreakerHalfOpen {
                plugin: plugin.to_string(),
                command: command.to_string(),
            }));
        }
        Ok(None)
    }

    /// Record a poll/command failure for breaker accounting. Opens the
    /// breaker once `breaker_threshold` consecutive failures accumulate.
    pub fn record_failure(&self, plugin: &str, command: &str) -> Result<Option<LifecycleEvent>, EngineError> {
        let key = breaker_key(plugin, command);
        let count = {
            let mut counts = self.failure_counts.lock();
            let entry = counts.entry(key).or_insert(0);
            *entry += 1;
            *entry
        };

        if count >= self.breaker_threshold {
            let now_ms = self.now_ms();
            let until_ms = now_ms + self.breaker_cooldown.as_millis() as u64;
            self.store.apply(Event::BreakerOpened {
                plugin: plugin.to_string(),
                command: command.to_string(),
                until_ms,
            })?;
            return Ok(Some(LifecycleEvent::BreakerOpened {
                plugin: plugin.to_string(),
                command: command.to_string(),
            }));
        }
        Ok(None)
    }

    /// Record a poll/command success. Resets the failure counter and, if
    /// the breaker was half-open, closes it — one success in half-open
    /// closes the breaker.
    pub fn record_success(&self, plugin: &str, command: &str) -> Result<Option<LifecycleEvent>, EngineError> {
        self.failure_counts.lock().remove(&breaker_key(plugin, command));

        let status = self.store.read().breaker(plugin, command).status;
        if status == BreakerStatus::HalfOpen {
            self.store.apply(Event::BreakerClosed {
                plugin: plugin.to_string(),
                command: command.to_string(),
            })?;
            return Ok(Some(LifecycleEvent::BreakerClosed {
                plugin: plugin.to_string(),
                command: command.to_string(),
            }));
        }
        Ok(None)
    }
}

/// Deterministic, dependency-free jitter used when spreading identical
/// schedule entries apart; exposed for the pruner/dispatcher to reuse the
/// same hash-based approach as the Work Queue's retry backoff.
pub fn jitter_ms(seed: &str, bound_ms: u64) -> u64 {
    if bound_ms == 0 {
        return 0;
    }
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    hasher.finish() % bound_ms
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
