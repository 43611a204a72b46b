use std::sync::Arc;

/// Handle returned on registration, used to unregister again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Ordered list of subscribed callbacks, owned by whoever emits the events.
pub struct ListenerRegistry<L: ?Sized> {
    next_id: u64,
    entries: Vec<(ListenerId, Arc<L>)>,
}

impl<L: ?Sized> ListenerRegistry<L> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, listener: Arc<L>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    /// Returns `false` if the handle was not registered.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(i, _)| *i != id);
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Listeners in registration order, detached from the registry so they
    /// can be invoked without holding whatever lock guards it.
    pub fn snapshot(&self) -> Vec<Arc<L>> {
        self.entries.iter().map(|(_, l)| l.clone()).collect()
    }
}

impl<L: ?Sized> Default for ListenerRegistry<L> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_only_drops_matching_handle() {
        let mut registry: ListenerRegistry<dyn Fn() -> u8 + Send + Sync> = ListenerRegistry::new();
        let a = registry.add(Arc::new(|| 1));
        let _b = registry.add(Arc::new(|| 2));

        assert!(registry.remove(a));
        assert!(!registry.remove(a));

        let values: Vec<u8> = registry.snapshot().iter().map(|f| f()).collect();
        assert_eq!(values, vec![2]);
    }
}
