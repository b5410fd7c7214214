//! Sources of candidate instance identifiers.

/// Supplies raw 64-bit candidates; the registry rejects collisions.
pub(crate) trait IdSource: Send {
    fn next_id(&mut self) -> u64;
}

/// Uniformly random identifiers from the thread-local generator.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct RandomIds;

impl IdSource for RandomIds {
    fn next_id(&mut self) -> u64 {
        rand::random()
    }
}

/// Replays a fixed sequence, then keeps counting upwards from its last value.
#[cfg(test)]
#[derive(Debug, Clone)]
pub(crate) struct ScriptedIds {
    script: std::collections::VecDeque<u64>,
    last: u64,
}

#[cfg(test)]
impl ScriptedIds {
    pub(crate) fn new(script: impl IntoIterator<Item = u64>) -> Self {
        Self {
            script: script.into_iter().collect(),
            last: 0,
        }
    }
}

#[cfg(test)]
impl IdSource for ScriptedIds {
    fn next_id(&mut self) -> u64 {
        let next = self
            .script
            .pop_front()
            .unwrap_or_else(|| self.last.wrapping_add(1));
        self.last = next;
        next
    }
}
