//! Persistence boundary. The canvas core never talks to a database; it
//! issues [`StoreRequest`] values against a [`TimelineStore`] owned by the
//! dispatcher worker, and consumes typed replies.
pub mod dispatch;

use crate::model::{Connection, TimelineEvent, Track};
use anyhow::{bail, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;

pub trait TimelineStore: Send {
    fn create_event(&mut self, event: TimelineEvent) -> Result<TimelineEvent>;
    fn update_event(&mut self, event: TimelineEvent) -> Result<TimelineEvent>;
    fn delete_event(&mut self, id: &str) -> Result<()>;
    fn list_events(&mut self, timeline_id: &str) -> Result<Vec<TimelineEvent>>;

    fn create_track(&mut self, track: Track) -> Result<Track>;
    fn update_track(&mut self, track: Track) -> Result<Track>;
    fn delete_track(&mut self, id: &str) -> Result<()>;
    fn list_tracks(&mut self, timeline_id: &str) -> Result<Vec<Track>>;
    fn reorder_tracks(&mut self, track_ids: &[String]) -> Result<()>;

    fn create_connection(&mut self, connection: Connection) -> Result<Connection>;
    fn update_connection(&mut self, connection: Connection) -> Result<Connection>;
    fn delete_connection(&mut self, id: &str) -> Result<()>;
    fn list_connections(&mut self, timeline_id: &str) -> Result<Vec<Connection>>;
}

/// One operation against the store. Creation takes a full record so history
/// replay can resurrect deleted entities snapshot-for-snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreRequest {
    CreateEvent(TimelineEvent),
    UpdateEvent(TimelineEvent),
    DeleteEvent(String),
    ListEvents(String),
    CreateTrack(Track),
    UpdateTrack(Track),
    DeleteTrack(String),
    ListTracks(String),
    ReorderTracks(Vec<String>),
    CreateConnection(Connection),
    UpdateConnection(Connection),
    DeleteConnection(String),
    ListConnections(String),
}

impl StoreRequest {
    pub fn describe(&self) -> &'static str {
        match self {
            StoreRequest::CreateEvent(_) => "create event",
            StoreRequest::UpdateEvent(_) => "update event",
            StoreRequest::DeleteEvent(_) => "delete event",
            StoreRequest::ListEvents(_) => "list events",
            StoreRequest::CreateTrack(_) => "create track",
            StoreRequest::UpdateTrack(_) => "update track",
            StoreRequest::DeleteTrack(_) => "delete track",
            StoreRequest::ListTracks(_) => "list tracks",
            StoreRequest::ReorderTracks(_) => "reorder tracks",
            StoreRequest::CreateConnection(_) => "create connection",
            StoreRequest::UpdateConnection(_) => "update connection",
            StoreRequest::DeleteConnection(_) => "delete connection",
            StoreRequest::ListConnections(_) => "list connections",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreReply {
    Event(TimelineEvent),
    Events(Vec<TimelineEvent>),
    Track(Track),
    Tracks(Vec<Track>),
    Connection(Connection),
    Connections(Vec<Connection>),
    Done,
}

/// Execute one request. This is the only call site the dispatcher worker
/// needs.
pub fn apply(store: &mut dyn TimelineStore, request: StoreRequest) -> Result<StoreReply> {
    Ok(match request {
        StoreRequest::CreateEvent(event) => StoreReply::Event(store.create_event(event)?),
        StoreRequest::UpdateEvent(event) => StoreReply::Event(store.update_event(event)?),
        StoreRequest::DeleteEvent(id) => {
            store.delete_event(&id)?;
            StoreReply::Done
        }
        StoreRequest::ListEvents(timeline_id) => {
            StoreReply::Events(store.list_events(&timeline_id)?)
        }
        StoreRequest::CreateTrack(track) => StoreReply::Track(store.create_track(track)?),
        StoreRequest::UpdateTrack(track) => StoreReply::Track(store.update_track(track)?),
        StoreRequest::DeleteTrack(id) => {
            store.delete_track(&id)?;
            StoreReply::Done
        }
        StoreRequest::ListTracks(timeline_id) => {
            StoreReply::Tracks(store.list_tracks(&timeline_id)?)
        }
        StoreRequest::ReorderTracks(ids) => {
            store.reorder_tracks(&ids)?;
            StoreReply::Done
        }
        StoreRequest::CreateConnection(connection) => {
            StoreReply::Connection(store.create_connection(connection)?)
        }
        StoreRequest::UpdateConnection(connection) => {
            StoreReply::Connection(store.update_connection(connection)?)
        }
        StoreRequest::DeleteConnection(id) => {
            store.delete_connection(&id)?;
            StoreReply::Done
        }
        StoreRequest::ListConnections(timeline_id) => {
            StoreReply::Connections(store.list_connections(&timeline_id)?)
        }
    })
}

fn random_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect()
}

/// In-memory reference store. Insertion order is preserved so listings are
/// deterministic; tracks are additionally sorted by their order index.
#[derive(Debug, Default)]
pub struct MemoryStore {
    events: Vec<TimelineEvent>,
    tracks: Vec<Track>,
    connections: Vec<Connection>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimelineStore for MemoryStore {
    fn create_event(&mut self, mut event: TimelineEvent) -> Result<TimelineEvent> {
        if event.id.is_empty() {
            event.id = random_id();
        }
        if self.events.iter().any(|e| e.id == event.id) {
            bail!("event {} already exists", event.id);
        }
        self.events.push(event.clone());
        Ok(event)
    }

    fn update_event(&mut self, event: TimelineEvent) -> Result<TimelineEvent> {
        match self.events.iter_mut().find(|e| e.id == event.id) {
            Some(slot) => {
                *slot = event.clone();
                Ok(event)
            }
            None => bail!("no such event {}", event.id),
        }
    }

    fn delete_event(&mut self, id: &str) -> Result<()> {
        let before = self.events.len();
        self.events.retain(|e| e.id != id);
        if self.events.len() == before {
            bail!("no such event {id}");
        }
        self.connections
            .retain(|c| c.source_event_id != id && c.target_event_id != id);
        Ok(())
    }

    fn list_events(&mut self, timeline_id: &str) -> Result<Vec<TimelineEvent>> {
        Ok(self
            .events
            .iter()
            .filter(|e| e.timeline_id == timeline_id)
            .cloned()
            .collect())
    }

    fn create_track(&mut self, mut track: Track) -> Result<Track> {
        if track.id.is_empty() {
            track.id = random_id();
        }
        if self.tracks.iter().any(|t| t.id == track.id) {
            bail!("track {} already exists", track.id);
        }
        self.tracks.push(track.clone());
        Ok(track)
    }

    fn update_track(&mut self, track: Track) -> Result<Track> {
        match self.tracks.iter_mut().find(|t| t.id == track.id) {
            Some(slot) => {
                *slot = track.clone();
                Ok(track)
            }
            None => bail!("no such track {}", track.id),
        }
    }

    fn delete_track(&mut self, id: &str) -> Result<()> {
        let before = self.tracks.len();
        self.tracks.retain(|t| t.id != id);
        if self.tracks.len() == before {
            bail!("no such track {id}");
        }
        Ok(())
    }

    fn list_tracks(&mut self, timeline_id: &str) -> Result<Vec<Track>> {
        let mut tracks: Vec<Track> = self
            .tracks
            .iter()
            .filter(|t| t.timeline_id == timeline_id)
            .cloned()
            .collect();
        tracks.sort_by_key(|t| t.sort_order);
        Ok(tracks)
    }

    fn reorder_tracks(&mut self, track_ids: &[String]) -> Result<()> {
        for (position, id) in track_ids.iter().enumerate() {
            match self.tracks.iter_mut().find(|t| &t.id == id) {
                Some(track) => track.sort_order = position as i32,
                None => bail!("no such track {id}"),
            }
        }
        Ok(())
    }

    fn create_connection(&mut self, mut connection: Connection) -> Result<Connection> {
        if connection.id.is_empty() {
            connection.id = random_id();
        }
        if self.connections.iter().any(|c| c.id == connection.id) {
            bail!("connection {} already exists", connection.id);
        }
        self.connections.push(connection.clone());
        Ok(connection)
    }

    fn update_connection(&mut self, connection: Connection) -> Result<Connection> {
        match self.connections.iter_mut().find(|c| c.id == connection.id) {
            Some(slot) => {
                *slot = connection.clone();
                Ok(connection)
            }
            None => bail!("no such connection {}", connection.id),
        }
    }

    fn delete_connection(&mut self, id: &str) -> Result<()> {
        let before = self.connections.len();
        self.connections.retain(|c| c.id != id);
        if self.connections.len() == before {
            bail!("no such connection {id}");
        }
        Ok(())
    }

    fn list_connections(&mut self, timeline_id: &str) -> Result<Vec<Connection>> {
        Ok(self
            .connections
            .iter()
            .filter(|c| c.timeline_id == timeline_id)
            .cloned()
            .collect())
    }
}
