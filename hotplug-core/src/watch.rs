//! Polling loop that keeps a [`PluginSet`] in sync with disk

use std::time::Duration;

use crate::config::WatchConfig;
use crate::plugins::{ModuleLoader, PluginEvents, PluginSet};

/// Block the calling thread for `ms` milliseconds.
pub fn sleep_ms(ms: u64) {
    std::thread::sleep(Duration::from_millis(ms));
}

/// Drives [`PluginSet::poll`] at a fixed interval on the calling thread.
#[derive(Debug, Clone)]
pub struct Watcher {
    interval: Duration,
}

impl Watcher {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn from_config(config: &WatchConfig) -> Self {
        Self::new(config.poll_interval())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll `set` until `keep_going` returns `false`.
    ///
    /// `keep_going` sees the names reloaded by each poll. The loop sleeps
    /// between polls, never after the last one. Returns the number of polls.
    pub fn run<L, E, F>(&self, set: &mut PluginSet<L>, events: &mut E, mut keep_going: F) -> usize
    where
        L: ModuleLoader + Clone,
        E: PluginEvents<L> + ?Sized,
        F: FnMut(&[String]) -> bool,
    {
        let mut polls = 0;
        loop {
            let reloaded = set.poll(&mut *events);
            polls += 1;
            if !reloaded.is_empty() {
                tracing::info!(plugins = ?reloaded, "Reloaded changed plugins");
            }
            if !keep_going(&reloaded) {
                break;
            }
            std::thread::sleep(self.interval);
        }
        polls
    }
}
