use crate::entities::item::ItemTypeId;
use crate::world::item_types::DecayRule;
use std::time::{Duration, Instant};

/// Decay progress of one item instance. Elapsed time only accrues while the
/// item lies on a tile; the scheduler polls `expired` and swaps the item for
/// `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decay {
    pub duration: Duration,
    pub target: Option<ItemTypeId>,
    elapsed: Duration,
    started_at: Option<Instant>,
}

impl Decay {
    pub fn new(duration: Duration, target: Option<ItemTypeId>) -> Self {
        Self {
            duration,
            target,
            elapsed: Duration::ZERO,
            started_at: None,
        }
    }

    pub fn from_rule(rule: &DecayRule) -> Self {
        Self::new(Duration::from_secs(u64::from(rule.duration_secs)), rule.target)
    }

    pub fn started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn start(&mut self, now: Instant) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    pub fn pause(&mut self, now: Instant) {
        if let Some(started_at) = self.started_at.take() {
            self.elapsed += now.saturating_duration_since(started_at);
        }
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        match self.started_at {
            Some(started_at) => self.elapsed + now.saturating_duration_since(started_at),
            None => self.elapsed,
        }
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.duration.saturating_sub(self.elapsed(now))
    }

    pub fn expired(&self, now: Instant) -> bool {
        self.elapsed(now) >= self.duration
    }
}
