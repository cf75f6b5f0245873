//! Deterministic respawn queue
//!
//! Respawns are scheduled tasks keyed by `(fire_at, monster)` and polled by the
//! server loop, so they mutate state in the same serialized context as every
//! other operation. Re-arming a monster bumps its generation; entries from an
//! older generation are discarded when popped, which keeps at most one live
//! respawn per monster.

use shared::EntityId;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScheduledRespawn {
    fire_at: u64,
    monster_id: EntityId,
    generation: u64,
}

impl Ord for ScheduledRespawn {
    fn cmp(&self, other: &Self) -> Ordering {
        // min-heap via reversed ordering
        other
            .fire_at
            .cmp(&self.fire_at)
            .then_with(|| other.monster_id.cmp(&self.monster_id))
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

impl PartialOrd for ScheduledRespawn {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
pub struct RespawnScheduler {
    queue: BinaryHeap<ScheduledRespawn>,
    /// Current generation for each monster with a live entry.
    armed: HashMap<EntityId, u64>,
    next_generation: u64,
}

impl RespawnScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the respawn for `monster_id`, replacing any pending one.
    pub fn schedule(&mut self, monster_id: EntityId, fire_at: u64) {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.armed.insert(monster_id, generation);
        self.queue.push(ScheduledRespawn {
            fire_at,
            monster_id,
            generation,
        });
    }

    /// Number of monsters with a live respawn.
    pub fn pending(&self) -> usize {
        self.armed.len()
    }

    /// Pops every live respawn due at or before `now`, earliest first.
    pub fn take_due(&mut self, now: u64) -> Vec<EntityId> {
        let mut due = Vec::new();

        while let Some(entry) = self.queue.peek() {
            if entry.fire_at > now {
                break;
            }
            let entry = *entry;
            self.queue.pop();

            if self.armed.get(&entry.monster_id) == Some(&entry.generation) {
                self.armed.remove(&entry.monster_id);
                due.push(entry.monster_id);
            }
        }

        due
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.armed.clear();
    }
}
