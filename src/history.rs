//! Bounded undo/redo history of typed reversible operations.
//!
//! Every mutating domain operation records a [`HistoryEntry`] carrying the
//! snapshots its inverse needs. Replay is pessimistic: an entry moves
//! between the stacks only after the store confirms the inverse/forward
//! call succeeded, so a failed replay leaves history consistent with what
//! is actually persisted.
use crate::model::{Connection, TimelineEvent, Track};
use crate::store::StoreRequest;
use std::collections::VecDeque;

pub const DEFAULT_MAX_DEPTH: usize = 100;

/// One reversible operation, entity x create/update/delete plus track
/// reorder. The exhaustive matches in [`HistoryEntry::inverse_request`]
/// and [`HistoryEntry::forward_request`] are the whole replay table.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryEntry {
    EventCreated {
        after: TimelineEvent,
    },
    EventUpdated {
        before: TimelineEvent,
        after: TimelineEvent,
    },
    EventDeleted {
        before: TimelineEvent,
    },
    TrackCreated {
        after: Track,
    },
    TrackUpdated {
        before: Track,
        after: Track,
    },
    TrackDeleted {
        before: Track,
    },
    TracksReordered {
        before: Vec<String>,
        after: Vec<String>,
    },
    ConnectionCreated {
        after: Connection,
    },
    ConnectionUpdated {
        before: Connection,
        after: Connection,
    },
    ConnectionDeleted {
        before: Connection,
    },
}

impl HistoryEntry {
    pub fn label(&self) -> &'static str {
        match self {
            HistoryEntry::EventCreated { .. } => "create event",
            HistoryEntry::EventUpdated { .. } => "update event",
            HistoryEntry::EventDeleted { .. } => "delete event",
            HistoryEntry::TrackCreated { .. } => "create track",
            HistoryEntry::TrackUpdated { .. } => "update track",
            HistoryEntry::TrackDeleted { .. } => "delete track",
            HistoryEntry::TracksReordered { .. } => "reorder tracks",
            HistoryEntry::ConnectionCreated { .. } => "create connection",
            HistoryEntry::ConnectionUpdated { .. } => "update connection",
            HistoryEntry::ConnectionDeleted { .. } => "delete connection",
        }
    }

    /// Request that reverses this entry's forward effect. Creations are
    /// undone by deletion, deletions by full-snapshot recreation, updates
    /// by restoring the `before` snapshot, reorders by re-applying the
    /// prior ordering.
    pub fn inverse_request(&self) -> StoreRequest {
        match self {
            HistoryEntry::EventCreated { after } => StoreRequest::DeleteEvent(after.id.clone()),
            HistoryEntry::EventUpdated { before, .. } => StoreRequest::UpdateEvent(before.clone()),
            HistoryEntry::EventDeleted { before } => StoreRequest::CreateEvent(before.clone()),
            HistoryEntry::TrackCreated { after } => StoreRequest::DeleteTrack(after.id.clone()),
            HistoryEntry::TrackUpdated { before, .. } => StoreRequest::UpdateTrack(before.clone()),
            HistoryEntry::TrackDeleted { before } => StoreRequest::CreateTrack(before.clone()),
            HistoryEntry::TracksReordered { before, .. } => {
                StoreRequest::ReorderTracks(before.clone())
            }
            HistoryEntry::ConnectionCreated { after } => {
                StoreRequest::DeleteConnection(after.id.clone())
            }
            HistoryEntry::ConnectionUpdated { before, .. } => {
                StoreRequest::UpdateConnection(before.clone())
            }
            HistoryEntry::ConnectionDeleted { before } => {
                StoreRequest::CreateConnection(before.clone())
            }
        }
    }

    /// Request that re-applies this entry's forward effect.
    pub fn forward_request(&self) -> StoreRequest {
        match self {
            HistoryEntry::EventCreated { after } => StoreRequest::CreateEvent(after.clone()),
            HistoryEntry::EventUpdated { after, .. } => StoreRequest::UpdateEvent(after.clone()),
            HistoryEntry::EventDeleted { before } => StoreRequest::DeleteEvent(before.id.clone()),
            HistoryEntry::TrackCreated { after } => StoreRequest::CreateTrack(after.clone()),
            HistoryEntry::TrackUpdated { after, .. } => StoreRequest::UpdateTrack(after.clone()),
            HistoryEntry::TrackDeleted { before } => StoreRequest::DeleteTrack(before.id.clone()),
            HistoryEntry::TracksReordered { after, .. } => {
                StoreRequest::ReorderTracks(after.clone())
            }
            HistoryEntry::ConnectionCreated { after } => {
                StoreRequest::CreateConnection(after.clone())
            }
            HistoryEntry::ConnectionUpdated { after, .. } => {
                StoreRequest::UpdateConnection(after.clone())
            }
            HistoryEntry::ConnectionDeleted { before } => {
                StoreRequest::DeleteConnection(before.id.clone())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayDirection {
    Undo,
    Redo,
}

#[derive(Debug, Clone)]
struct InFlight {
    entry: HistoryEntry,
    direction: ReplayDirection,
    generation: Option<u64>,
}

/// Undo/redo stacks, newest first, bounded by `max_depth`.
#[derive(Debug)]
pub struct History {
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: VecDeque<HistoryEntry>,
    max_depth: usize,
    in_flight: Option<InFlight>,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl History {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_depth: max_depth.max(1),
            in_flight: None,
        }
    }

    /// Record a completed forward operation. Always clears the redo stack.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.undo_stack.push_front(entry);
        self.undo_stack.truncate(self.max_depth);
        self.redo_stack.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn newest_undo(&self) -> Option<&HistoryEntry> {
        self.undo_stack.front()
    }

    pub fn replay_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Start undoing the newest entry. Returns the inverse request to
    /// submit, or `None` when there is nothing to undo or another replay
    /// has not completed yet. The entry stays on the undo stack until
    /// [`History::complete`] confirms success.
    pub fn begin_undo(&mut self) -> Option<StoreRequest> {
        if self.in_flight.is_some() {
            return None;
        }
        let entry = self.undo_stack.front()?.clone();
        let request = entry.inverse_request();
        self.in_flight = Some(InFlight {
            entry,
            direction: ReplayDirection::Undo,
            generation: None,
        });
        Some(request)
    }

    /// Start redoing the newest redo entry. Mirror of [`History::begin_undo`].
    pub fn begin_redo(&mut self) -> Option<StoreRequest> {
        if self.in_flight.is_some() {
            return None;
        }
        let entry = self.redo_stack.front()?.clone();
        let request = entry.forward_request();
        self.in_flight = Some(InFlight {
            entry,
            direction: ReplayDirection::Redo,
            generation: None,
        });
        Some(request)
    }

    /// Tie the in-flight replay to the dispatcher generation of its
    /// submitted request.
    pub fn submitted(&mut self, generation: u64) {
        if let Some(in_flight) = &mut self.in_flight {
            in_flight.generation = Some(generation);
        }
    }

    /// Handle a replay completion. On success the entry finally swaps
    /// stacks; on failure both stacks stay as they were. Completions that
    /// do not belong to the in-flight replay are ignored.
    pub fn complete(&mut self, generation: u64, success: bool) -> Option<ReplayDirection> {
        let in_flight = self.in_flight.take()?;
        if in_flight.generation != Some(generation) {
            self.in_flight = Some(in_flight);
            return None;
        }

        if success {
            match in_flight.direction {
                ReplayDirection::Undo => {
                    if let Some(pos) =
                        self.undo_stack.iter().position(|e| *e == in_flight.entry)
                    {
                        if let Some(entry) = self.undo_stack.remove(pos) {
                            self.redo_stack.push_front(entry);
                        }
                    }
                }
                ReplayDirection::Redo => {
                    if let Some(pos) =
                        self.redo_stack.iter().position(|e| *e == in_flight.entry)
                    {
                        if let Some(entry) = self.redo_stack.remove(pos) {
                            self.undo_stack.push_front(entry);
                        }
                    }
                }
            }
        } else {
            tracing::warn!(
                "history replay failed ({}); stacks unchanged",
                in_flight.entry.label()
            );
        }
        Some(in_flight.direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EventType;
    use crate::store::{apply, MemoryStore, TimelineStore};

    fn event(id: &str, title: &str) -> TimelineEvent {
        TimelineEvent {
            id: id.into(),
            timeline_id: "t1".into(),
            track_id: "tr".into(),
            title: title.into(),
            description: String::new(),
            start_date: "2024-01-01".into(),
            end_date: None,
            event_type: EventType::Point,
            importance: 3,
            color: None,
            tags: String::new(),
        }
    }

    fn created(id: &str) -> HistoryEntry {
        HistoryEntry::EventCreated {
            after: event(id, "T"),
        }
    }

    /// Drive one replay synchronously against a store, the way the app
    /// drives it through the dispatcher.
    fn run_replay(
        history: &mut History,
        store: &mut MemoryStore,
        direction: ReplayDirection,
    ) -> bool {
        let request = match direction {
            ReplayDirection::Undo => history.begin_undo(),
            ReplayDirection::Redo => history.begin_redo(),
        };
        let Some(request) = request else {
            return false;
        };
        history.submitted(7);
        let ok = apply(store, request).is_ok();
        history.complete(7, ok);
        ok
    }

    #[test]
    fn push_always_clears_redo() {
        let mut history = History::default();
        let mut store = MemoryStore::new();
        store.create_event(event("a", "T")).unwrap();

        history.push(created("a"));
        assert!(run_replay(&mut history, &mut store, ReplayDirection::Undo));
        assert_eq!(history.redo_len(), 1);

        history.push(created("b"));
        assert_eq!(history.redo_len(), 0);
        assert_eq!(history.undo_len(), 1);
    }

    #[test]
    fn depth_is_bounded_and_newest_survives() {
        let mut history = History::new(3);
        for i in 0..7 {
            history.push(created(&format!("e{i}")));
        }
        assert_eq!(history.undo_len(), 3);
        assert_eq!(history.newest_undo(), Some(&created("e6")));
    }

    #[test]
    fn undo_then_redo_restores_store_content() {
        let mut history = History::default();
        let mut store = MemoryStore::new();
        let persisted = store.create_event(event("a", "Original")).unwrap();
        history.push(HistoryEntry::EventCreated {
            after: persisted.clone(),
        });

        assert!(run_replay(&mut history, &mut store, ReplayDirection::Undo));
        assert!(store.list_events("t1").unwrap().is_empty());
        assert!(history.can_redo());
        assert!(!history.can_undo());

        assert!(run_replay(&mut history, &mut store, ReplayDirection::Redo));
        assert_eq!(store.list_events("t1").unwrap(), vec![persisted]);
        assert!(history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn update_undo_restores_before_snapshot() {
        let mut history = History::default();
        let mut store = MemoryStore::new();
        let before = store.create_event(event("a", "Before")).unwrap();
        let after = store.update_event(event("a", "After")).unwrap();
        history.push(HistoryEntry::EventUpdated {
            before: before.clone(),
            after,
        });

        assert!(run_replay(&mut history, &mut store, ReplayDirection::Undo));
        assert_eq!(store.list_events("t1").unwrap(), vec![before]);
    }

    #[test]
    fn reorder_undo_reapplies_prior_ordering() {
        let mut history = History::default();
        let mut store = MemoryStore::new();
        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            store
                .create_track(Track {
                    id: (*id).into(),
                    timeline_id: "t1".into(),
                    name: (*id).into(),
                    color: "#3b82f6".into(),
                    sort_order: i as i32,
                    visible: true,
                })
                .unwrap();
        }
        let before: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
        let after: Vec<String> = vec!["c".into(), "a".into(), "b".into()];
        store.reorder_tracks(&after).unwrap();
        history.push(HistoryEntry::TracksReordered { before, after });

        assert!(run_replay(&mut history, &mut store, ReplayDirection::Undo));
        let order: Vec<String> = store
            .list_tracks("t1")
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn failed_replay_leaves_stacks_untouched() {
        let mut history = History::default();
        let mut store = MemoryStore::new();
        // Entry claims an event the store never saw; the inverse delete
        // will fail.
        history.push(created("phantom"));

        assert!(!run_replay(&mut history, &mut store, ReplayDirection::Undo));
        assert_eq!(history.undo_len(), 1);
        assert_eq!(history.redo_len(), 0);
        assert!(!history.replay_in_flight());
    }

    #[test]
    fn only_one_replay_may_be_in_flight() {
        let mut history = History::default();
        history.push(created("a"));
        history.push(created("b"));

        assert!(history.begin_undo().is_some());
        assert!(history.begin_undo().is_none());
        history.submitted(1);
        history.complete(1, true);
        assert!(history.begin_undo().is_some());
    }

    #[test]
    fn completion_for_unrelated_generation_is_ignored() {
        let mut history = History::default();
        history.push(created("a"));
        assert!(history.begin_undo().is_some());
        history.submitted(5);

        assert_eq!(history.complete(4, true), None);
        assert!(history.replay_in_flight());
        assert_eq!(history.complete(5, true), Some(ReplayDirection::Undo));
        assert!(history.can_redo());
    }

    #[test]
    fn inverse_and_forward_requests_mirror_each_other() {
        let entry = HistoryEntry::EventDeleted {
            before: event("a", "T"),
        };
        assert_eq!(
            entry.inverse_request(),
            StoreRequest::CreateEvent(event("a", "T"))
        );
        assert_eq!(
            entry.forward_request(),
            StoreRequest::DeleteEvent("a".into())
        );
    }
}
