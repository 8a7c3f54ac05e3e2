// Bot presence: cycles the "Playing ..." status through a configured list.
//
// `StatusRotation` is the plain round-robin; `spawn_rotation` is the Discord
// glue that applies it on a timer.

use poise::serenity_prelude as serenity;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StatusRotation {
    statuses: Vec<String>,
    next: usize,
}

impl StatusRotation {
    pub fn new(statuses: Vec<String>, start: usize) -> Self {
        let next = if statuses.is_empty() {
            0
        } else {
            start % statuses.len()
        };
        Self { statuses, next }
    }

    /// Starts at a random entry so restarts don't always show the same status.
    pub fn shuffled_start(statuses: Vec<String>) -> Self {
        let start = if statuses.is_empty() {
            0
        } else {
            rand::thread_rng().gen_range(0..statuses.len())
        };
        Self::new(statuses, start)
    }

    pub fn next_status(&mut self) -> Option<&str> {
        if self.statuses.is_empty() {
            return None;
        }
        let idx = self.next;
        self.next = (self.next + 1) % self.statuses.len();
        Some(&self.statuses[idx])
    }
}

fn apply(ctx: &serenity::Context, status: &str) {
    let activity = serenity::ActivityData::playing(status);
    ctx.set_presence(Some(activity), serenity::OnlineStatus::Online);
}

/// Sets the first status right away, then rotates every `interval`.
pub fn spawn_rotation(ctx: serenity::Context, statuses: Vec<String>, interval: Duration) {
    let mut rotation = StatusRotation::shuffled_start(statuses);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match rotation.next_status() {
                Some(status) => {
                    tracing::debug!("Updating presence: {}", status);
                    apply(&ctx, status);
                }
                None => break,
            }
        }
    });
}
