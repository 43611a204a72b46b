//! Matching of pending local events against the events the server returned.

use crate::model::event::XEvent;

/// Result of matching a batch of local events against server events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventMapping {
    /// `(local index, server index)` pairs of equivalent events.
    pub mapped: Vec<(usize, usize)>,
    /// Local events without a server counterpart, in local order.
    pub unmapped: Vec<usize>,
}

impl EventMapping {
    /// The local event confirmed by server event `server`, if any.
    pub fn local_index_of(&self, server: usize) -> Option<usize> {
        self.mapped.iter().find(|(_, s)| *s == server).map(|(l, _)| *l)
    }
}

/// Strategy deciding which server event (if any) confirms a local event.
pub trait EventMapper: Send + Sync {
    fn map_events(&self, local: &[XEvent], server: &[XEvent]) -> EventMapping;
}

/// Each local event takes the first unused equivalent server event, wherever
/// it is in the batch.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnorderedEventMapper;

impl EventMapper for UnorderedEventMapper {
    fn map_events(&self, local: &[XEvent], server: &[XEvent]) -> EventMapping {
        let mut used = vec![false; server.len()];
        let mut mapping = EventMapping::default();

        for (l, event) in local.iter().enumerate() {
            let hit = server
                .iter()
                .enumerate()
                .find(|(s, candidate)| !used[*s] && candidate.is_equivalent(event))
                .map(|(s, _)| s);

            match hit {
                Some(s) => {
                    used[s] = true;
                    mapping.mapped.push((l, s));
                }
                None => mapping.unmapped.push(l),
            }
        }
        mapping
    }
}

/// Like [`UnorderedEventMapper`] but matches must keep the local order: a
/// local event can only map to a server event after the previous match.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrderedEventMapper;

impl EventMapper for OrderedEventMapper {
    fn map_events(&self, local: &[XEvent], server: &[XEvent]) -> EventMapping {
        let mut next = 0;
        let mut mapping = EventMapping::default();

        for (l, event) in local.iter().enumerate() {
            match server[next..].iter().position(|candidate| candidate.is_equivalent(event)) {
                Some(offset) => {
                    mapping.mapped.push((l, next + offset));
                    next += offset + 1;
                }
                None => mapping.unmapped.push(l),
            }
        }
        mapping
    }
}
