use shared::EntityId;

/// Allocates identities for players and monsters from a single id space.
pub trait IdGenerator: Send {
    fn next_id(&mut self) -> EntityId;
}

/// Hands out 1, 2, 3, ...
#[derive(Debug, Clone)]
pub struct SequentialIds {
    next: u32,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u32) -> Self {
        Self { next: first }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ids() {
        let mut ids = SequentialIds::new();
        assert_eq!(ids.next_id(), EntityId(1));
        assert_eq!(ids.next_id(), EntityId(2));

        let mut offset = SequentialIds::starting_at(100);
        assert_eq!(offset.next_id(), EntityId(100));
    }
}
