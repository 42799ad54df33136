// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process lifecycle event fan-out, used by an SSE endpoint.
//! `tokio::sync::broadcast`'s lagged-receiver signal maps directly onto
//! "a slow subscriber's overflow drops the oldest entries with a
//! counter," built from the `broadcast` primitive already pulled in via
//! the `tokio` feature set.

use ductile_core::LifecycleEvent;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

pub struct EventHub {
    sender: broadcast::Sender<LifecycleEvent>,
    next_id: AtomicU64,
    lagged_count: AtomicU64,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            next_id: AtomicU64::new(1),
            lagged_count: AtomicU64::new(0),
        }
    }

    /// Publish a lifecycle event to every current subscriber, returning
    /// the monotonic id assigned to it (for an SSE framer's `id:` field).
    /// A no-op beyond the id bump when nobody is subscribed.
    pub fn publish(&self, event: LifecycleEvent) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let _ = self.sender.send(event);
        id
    }

    /// Matches the `EngineFacade::subscribe_events` contract directly: a
    /// raw broadcast receiver an SSE layer can `recv()` from, translating
    /// `RecvError::Lagged` itself into whatever its framing needs.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }

    /// Drains the lagged-receiver counter reported by a subscriber that
    /// fell behind; callers that track this per-subscriber should report
    /// back here so `total_lagged` reflects hub-wide overflow.
    pub fn record_lagged(&self, skipped: u64) {
        self.lagged_count.fetch_add(skipped, Ordering::SeqCst);
    }

    pub fn total_lagged(&self) -> u64 {
        self.lagged_count.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "event_hub_tests.rs"]
mod tests;
