//! Bounded-rate text reveal for streaming messages.
//!
//! The scheduler keeps two maps keyed by message id: `target`, the latest
//! known text, and `displayed`, the prefix the UI currently shows. A single
//! global tick advances every lagging entry by a fixed character budget,
//! independent of how fast chunks arrive. The scheduler owns no messages;
//! entries are evicted a fixed delay after their stream finishes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

/// Typewriter pacing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TypewriterConfig {
    /// Tick interval in milliseconds, shared by all in-flight messages.
    pub tick_interval_ms: u64,
    /// Characters revealed per key per tick.
    pub chars_per_tick: usize,
    /// Delay after finish before a key's entries are evicted, letting the
    /// final characters animate out.
    pub cleanup_delay_ms: u64,
}

impl Default for TypewriterConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 30,
            chars_per_tick: 3,
            cleanup_delay_ms: 1000,
        }
    }
}

#[derive(Default)]
struct TypewriterState {
    target: HashMap<String, String>,
    displayed: HashMap<String, String>,
    finished: HashMap<String, Instant>,
}

/// Explicit typewriter scheduler.
///
/// `tick()` is a plain method so pacing is unit-testable without a runtime;
/// `start()` spawns a background driver that calls it on an interval.
pub struct Typewriter {
    config: TypewriterConfig,
    state: Arc<Mutex<TypewriterState>>,
    stop_tx: Option<watch::Sender<bool>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl Typewriter {
    pub fn new(config: TypewriterConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(TypewriterState::default())),
            stop_tx: None,
            task: None,
        }
    }

    /// Replace the target text for a key.
    pub fn set_target(&self, id: &str, text: impl Into<String>) {
        let mut state = self.lock();
        state.target.insert(id.to_string(), text.into());
        state.displayed.entry(id.to_string()).or_default();
    }

    /// Extend the target text for a key.
    pub fn append_target(&self, id: &str, delta: &str) {
        let mut state = self.lock();
        state
            .target
            .entry(id.to_string())
            .or_default()
            .push_str(delta);
        state.displayed.entry(id.to_string()).or_default();
    }

    /// The currently revealed text for a key, if tracked.
    pub fn displayed(&self, id: &str) -> Option<String> {
        self.lock().displayed.get(id).cloned()
    }

    /// The target text for a key, if tracked.
    pub fn target(&self, id: &str) -> Option<String> {
        self.lock().target.get(id).cloned()
    }

    /// Force the displayed text to the full target and arm eviction.
    ///
    /// Terminal events call this so a `done` payload that diverges from the
    /// streamed text never leaves a truncated permanent display.
    pub fn finish(&self, id: &str) {
        let mut state = self.lock();
        if let Some(target) = state.target.get(id).cloned() {
            state.displayed.insert(id.to_string(), target);
        }
        state.finished.insert(id.to_string(), Instant::now());
    }

    /// Migrate a key to a new id, preserving both texts.
    pub fn rekey(&self, old_id: &str, new_id: &str) {
        let mut state = self.lock();
        if let Some(target) = state.target.remove(old_id) {
            state.target.insert(new_id.to_string(), target);
        }
        if let Some(displayed) = state.displayed.remove(old_id) {
            state.displayed.insert(new_id.to_string(), displayed);
        }
        if let Some(at) = state.finished.remove(old_id) {
            state.finished.insert(new_id.to_string(), at);
        }
    }

    /// Drop all entries.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.target.clear();
        state.displayed.clear();
        state.finished.clear();
    }

    /// Advance every lagging key by the per-tick character budget and evict
    /// finished keys whose cleanup delay has elapsed.
    pub fn tick(&self) {
        advance(&mut self.lock(), &self.config);
    }

    /// Spawn the background tick driver. Idempotent while running.
    pub fn start(&mut self) {
        if self.task.is_some() {
            return;
        }
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let state = Arc::clone(&self.state);
        let config = self.config.clone();

        let task = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_millis(config.tick_interval_ms));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Ok(mut state) = state.lock() {
                            advance(&mut state, &config);
                        }
                    }
                    _ = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        self.stop_tx = Some(stop_tx);
        self.task = Some(task);
    }

    /// Stop the background driver and wait for it to exit.
    pub async fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TypewriterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn advance(state: &mut TypewriterState, config: &TypewriterConfig) {
    let budget = config.chars_per_tick;

    for (id, target) in &state.target {
        let displayed = state.displayed.entry(id.clone()).or_default();
        // Targets only ever extend the displayed prefix in normal
        // operation; a shrunk or divergent target stalls the reveal until
        // finish() forces it.
        if target.len() <= displayed.len() || !target.starts_with(displayed.as_str()) {
            continue;
        }
        let tail = &target[displayed.len()..];
        let step = tail
            .char_indices()
            .nth(budget)
            .map(|(i, _)| i)
            .unwrap_or(tail.len());
        displayed.push_str(&tail[..step]);
    }

    let cleanup = Duration::from_millis(config.cleanup_delay_ms);
    let expired: Vec<String> = state
        .finished
        .iter()
        .filter(|(_, at)| at.elapsed() >= cleanup)
        .map(|(id, _)| id.clone())
        .collect();
    for id in expired {
        debug!(id = %id, "Evicting finished typewriter entry");
        state.target.remove(&id);
        state.displayed.remove(&id);
        state.finished.remove(&id);
    }
}

impl Drop for Typewriter {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typewriter(budget: usize) -> Typewriter {
        Typewriter::new(TypewriterConfig {
            tick_interval_ms: 10,
            chars_per_tick: budget,
            cleanup_delay_ms: 0,
        })
    }

    #[test]
    fn test_tick_advances_by_budget() {
        let tw = typewriter(3);
        tw.set_target("m1", "abcdefgh");

        tw.tick();
        assert_eq!(tw.displayed("m1").unwrap(), "abc");
        tw.tick();
        assert_eq!(tw.displayed("m1").unwrap(), "abcdef");
        tw.tick();
        assert_eq!(tw.displayed("m1").unwrap(), "abcdefgh");
        // No overshoot once caught up.
        tw.tick();
        assert_eq!(tw.displayed("m1").unwrap(), "abcdefgh");
    }

    #[test]
    fn test_monotonic_reveal_across_appends() {
        let tw = typewriter(2);
        tw.set_target("m1", "ab");
        let mut last_len = 0;
        for i in 0..10 {
            if i == 3 {
                tw.append_target("m1", "cdef");
            }
            tw.tick();
            let len = tw.displayed("m1").unwrap().chars().count();
            assert!(len >= last_len, "displayed length shrank");
            last_len = len;
        }
        assert_eq!(tw.displayed("m1").unwrap(), "abcdef");
    }

    #[test]
    fn test_advance_respects_char_boundaries() {
        let tw = typewriter(2);
        tw.set_target("m1", "日本語テキスト");
        tw.tick();
        assert_eq!(tw.displayed("m1").unwrap(), "日本");
        tw.tick();
        assert_eq!(tw.displayed("m1").unwrap(), "日本語テ");
    }

    #[test]
    fn test_divergent_target_stalls() {
        let tw = typewriter(3);
        tw.set_target("m1", "abcdef");
        tw.tick();
        assert_eq!(tw.displayed("m1").unwrap(), "abc");

        // Replacement that is not an extension of the displayed prefix.
        tw.set_target("m1", "xyz123");
        tw.tick();
        assert_eq!(tw.displayed("m1").unwrap(), "abc");

        // Finalization forces the display to the new target.
        tw.finish("m1");
        assert_eq!(tw.displayed("m1").unwrap(), "xyz123");
    }

    #[test]
    fn test_shrunk_target_stalls() {
        let tw = typewriter(10);
        tw.set_target("m1", "abcdef");
        tw.tick();
        tw.set_target("m1", "abc");
        tw.tick();
        assert_eq!(tw.displayed("m1").unwrap(), "abcdef");
    }

    #[test]
    fn test_finish_and_eviction() {
        let tw = typewriter(1);
        tw.set_target("m1", "hello");
        tw.finish("m1");
        assert_eq!(tw.displayed("m1").unwrap(), "hello");

        // cleanup_delay_ms is 0, so the next tick evicts.
        tw.tick();
        assert!(tw.displayed("m1").is_none());
        assert!(tw.target("m1").is_none());
    }

    #[test]
    fn test_eviction_waits_for_delay() {
        let tw = Typewriter::new(TypewriterConfig {
            tick_interval_ms: 10,
            chars_per_tick: 1,
            cleanup_delay_ms: 60_000,
        });
        tw.set_target("m1", "hi");
        tw.finish("m1");
        tw.tick();
        assert_eq!(tw.displayed("m1").unwrap(), "hi");
    }

    #[test]
    fn test_rekey_migrates_both_maps() {
        let tw = typewriter(2);
        tw.set_target("local", "abcd");
        tw.tick();
        tw.rekey("local", "srv");

        assert!(tw.displayed("local").is_none());
        assert_eq!(tw.displayed("srv").unwrap(), "ab");
        assert_eq!(tw.target("srv").unwrap(), "abcd");

        tw.tick();
        assert_eq!(tw.displayed("srv").unwrap(), "abcd");
    }

    #[test]
    fn test_independent_keys_share_tick() {
        let tw = typewriter(2);
        tw.set_target("m1", "aaaa");
        tw.set_target("m2", "bb");
        tw.tick();
        assert_eq!(tw.displayed("m1").unwrap(), "aa");
        assert_eq!(tw.displayed("m2").unwrap(), "bb");
    }

    #[tokio::test]
    async fn test_background_driver_advances() {
        let mut tw = typewriter(5);
        tw.set_target("m1", "streaming text");
        tw.start();
        tokio::time::sleep(Duration::from_millis(120)).await;
        tw.stop().await;

        let shown = tw.displayed("m1").unwrap();
        assert!(!shown.is_empty());
        assert!("streaming text".starts_with(&shown));
    }
}
