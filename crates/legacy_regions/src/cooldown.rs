use crate::region::RegionKey;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use legacy_db::schema::PlayerId;
use std::time::{Duration, Instant};

/// Rate limit for "you can't build here" feedback, per region and player.
pub struct FailedAccessCooldown {
    duration: Duration,
    last: DashMap<(RegionKey, PlayerId), Instant>,
}

impl FailedAccessCooldown {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            last: DashMap::new(),
        }
    }

    /// Records a failed attempt at `now`. Returns whether feedback should be
    /// shown, which is the case unless the last shown feedback for the same
    /// pair is still within the cooldown.
    pub fn try_trigger(&self, region: RegionKey, player: PlayerId, now: Instant) -> bool {
        match self.last.entry((region, player)) {
            Entry::Occupied(mut slot) => {
                let due = now.saturating_duration_since(*slot.get()) >= self.duration;
                if due {
                    slot.insert(now);
                }
                due
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        }
    }

    /// Forgets every entry for `region`.
    pub fn invalidate(&self, region: RegionKey) {
        self.last.retain(|(key, _), _| *key != region);
    }

    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}
