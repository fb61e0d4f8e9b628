//! Domain models for timelines, tracks, events and connections.
use serde::{Deserialize, Serialize};

pub const TRACK_COLORS: [&str; 8] = [
    "#3b82f6", // blue
    "#ef4444", // red
    "#10b981", // green
    "#f59e0b", // amber
    "#8b5cf6", // violet
    "#ec4899", // pink
    "#06b6d4", // cyan
    "#f97316", // orange
];

pub const DEFAULT_TRACK_COLOR: &str = TRACK_COLORS[0];

pub const MIN_IMPORTANCE: u8 = 1;
pub const MAX_IMPORTANCE: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Point,
    Range,
    Milestone,
    Era,
}

impl Default for EventType {
    fn default() -> Self {
        EventType::Point
    }
}

impl EventType {
    /// Draw order: eras at the back, milestones on top. Later-drawn types
    /// are preferred by hit-testing on overlap.
    pub fn draw_priority(self) -> u8 {
        match self {
            EventType::Era => 0,
            EventType::Range => 1,
            EventType::Point => 2,
            EventType::Milestone => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Related,
    Caused,
    Preceded,
    Influenced,
}

impl Default for ConnectionType {
    fn default() -> Self {
        ConnectionType::Related
    }
}

impl std::fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionType::Related => write!(f, "related"),
            ConnectionType::Caused => write!(f, "caused"),
            ConnectionType::Preceded => write!(f, "preceded"),
            ConnectionType::Influenced => write!(f, "influenced"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub timeline_id: String,
    pub name: String,
    pub color: String,
    pub sort_order: i32,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: String,
    pub timeline_id: String,
    pub track_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Flexible precision: "2024", "2024-06", "2024-06-05" or a datetime.
    pub start_date: String,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub event_type: EventType,
    #[serde(default = "default_importance")]
    pub importance: u8,
    #[serde(default)]
    pub color: Option<String>,
    /// Comma separated, as entered by the user.
    #[serde(default)]
    pub tags: String,
}

fn default_importance() -> u8 {
    3
}

impl TimelineEvent {
    pub fn clamped_importance(&self) -> u8 {
        self.importance.clamp(MIN_IMPORTANCE, MAX_IMPORTANCE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    pub timeline_id: String,
    pub source_event_id: String,
    pub target_event_id: String,
    #[serde(default)]
    pub connection_type: ConnectionType,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

pub fn parse_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_priority_orders_types_back_to_front() {
        let mut types = [
            EventType::Milestone,
            EventType::Era,
            EventType::Point,
            EventType::Range,
        ];
        types.sort_by_key(|t| t.draw_priority());
        assert_eq!(
            types,
            [
                EventType::Era,
                EventType::Range,
                EventType::Point,
                EventType::Milestone
            ]
        );
    }

    #[test]
    fn importance_is_clamped_into_band() {
        let mut event = sample_event();
        event.importance = 9;
        assert_eq!(event.clamped_importance(), MAX_IMPORTANCE);
        event.importance = 0;
        assert_eq!(event.clamped_importance(), MIN_IMPORTANCE);
    }

    #[test]
    fn parse_tags_trims_and_drops_empties() {
        assert_eq!(parse_tags("a, b , ,c"), vec!["a", "b", "c"]);
        assert!(parse_tags("  ").is_empty());
    }

    fn sample_event() -> TimelineEvent {
        TimelineEvent {
            id: "e1".into(),
            timeline_id: "t1".into(),
            track_id: "tr1".into(),
            title: "Sample".into(),
            description: String::new(),
            start_date: "2024-01-01".into(),
            end_date: None,
            event_type: EventType::Point,
            importance: 3,
            color: None,
            tags: String::new(),
        }
    }
}
