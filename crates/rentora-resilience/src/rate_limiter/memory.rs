//! Process-local rate limit store.

use super::store::{RateLimitStore, WindowHit};
use crate::error::RateLimitResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

#[derive(Default)]
struct State {
    windows: HashMap<String, VecDeque<i64>>,
    blocks: HashMap<String, i64>,
    last_sweep_ms: i64,
}

impl State {
    /// Drops windows whose newest entry has left the window and expired blocks.
    fn sweep(&mut self, now_ms: i64, window_ms: i64) {
        let cutoff = now_ms - window_ms;
        self.windows
            .retain(|_, entries| entries.back().is_some_and(|&ts| ts > cutoff));
        self.blocks.retain(|_, until| *until > now_ms);
        self.last_sweep_ms = now_ms;
    }
}

/// In-memory store for single-instance deployments and tests.
#[derive(Default)]
pub struct InMemoryRateLimitStore {
    state: Mutex<State>,
}

impl InMemoryRateLimitStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn hit(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: i64,
        max_requests: u64,
    ) -> RateLimitResult<WindowHit> {
        let mut state = self.state.lock();
        if now_ms - state.last_sweep_ms >= window_ms {
            state.sweep(now_ms, window_ms);
        }
        let entries = state.windows.entry(key.to_string()).or_default();

        let cutoff = now_ms - window_ms;
        while entries.front().is_some_and(|&ts| ts <= cutoff) {
            entries.pop_front();
        }

        let admitted = (entries.len() as u64) < max_requests;
        if admitted {
            entries.push_back(now_ms);
        }

        let hit = WindowHit {
            admitted,
            count: entries.len() as u64,
            oldest_ms: entries.front().copied(),
        };
        if entries.is_empty() {
            state.windows.remove(key);
        }
        Ok(hit)
    }

    async fn reset(&self, key: &str) -> RateLimitResult<()> {
        self.state.lock().windows.remove(key);
        Ok(())
    }

    async fn block(&self, subject: &str, _now_ms: i64, until_ms: i64) -> RateLimitResult<()> {
        self.state.lock().blocks.insert(subject.to_string(), until_ms);
        Ok(())
    }

    async fn blocked_until(&self, subject: &str, now_ms: i64) -> RateLimitResult<Option<i64>> {
        let mut state = self.state.lock();
        match state.blocks.get(subject).copied() {
            Some(until) if until > now_ms => Ok(Some(until)),
            Some(_) => {
                state.blocks.remove(subject);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn unblock(&self, subject: &str) -> RateLimitResult<()> {
        self.state.lock().blocks.remove(subject);
        Ok(())
    }
}
