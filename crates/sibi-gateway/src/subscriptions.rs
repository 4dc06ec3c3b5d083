/// Ids of live market-data lines.
///
/// Kept in subscription order so a bulk cancel reports ids in the order they
/// were opened. Entries survive reconnects and are only removed by an
/// explicit cancel or a server error for that line.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    ids: Vec<i64>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id`. Returns `false` if it was already active.
    pub fn add(&mut self, id: i64) -> bool {
        if self.ids.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Remove `id`. Returns `false` if it was not active.
    pub fn remove(&mut self, id: i64) -> bool {
        match self.ids.iter().position(|active| *active == id) {
            Some(index) => {
                self.ids.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    /// Empty the registry, returning every id in subscription order.
    pub fn drain_all(&mut self) -> Vec<i64> {
        std::mem::take(&mut self.ids)
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent_and_ordered() {
        let mut registry = SubscriptionRegistry::new();
        assert!(registry.add(12));
        assert!(registry.add(7));
        assert!(!registry.add(12));

        assert_eq!(registry.ids(), &[12, 7]);
    }

    #[test]
    fn remove_single() {
        let mut registry = SubscriptionRegistry::new();
        registry.add(7);
        registry.add(9);

        assert!(registry.remove(7));
        assert!(!registry.remove(7));
        assert_eq!(registry.ids(), &[9]);
    }

    #[test]
    fn drain_empties() {
        let mut registry = SubscriptionRegistry::new();
        for id in [7, 9, 12] {
            registry.add(id);
        }

        assert_eq!(registry.drain_all(), vec![7, 9, 12]);
        assert!(registry.is_empty());
    }
}
