//! Scene builder and hit-testing for the timeline canvas.
//!
//! Each build consumes a viewport + domain snapshot + theme and produces an
//! ordered list of backend-neutral primitives, plus a screen-space cache of
//! event rects and sampled connection polylines for pointer interaction.
//! The cache always reflects exactly the most recent build.
use crate::canvas::math::{
    generate_axis_labels, parse_date_to_timestamp, timestamp_to_pixel, truncate,
};
use crate::model::{Connection, ConnectionType, EventType, TimelineEvent, Track};
use crate::theme::{color_or, contrast_text, with_alpha, CanvasTheme};
use eframe::egui::{pos2, vec2, Color32, Pos2, Rect};
use std::collections::{HashMap, HashSet};

pub const TRACK_HEIGHT: f32 = 60.0;
pub const AXIS_HEIGHT: f32 = 40.0;

/// Below this zoom events collapse to plain dots.
pub const LOD_DOT_ZOOM: f64 = 0.05;
/// Between the dot threshold and this zoom events render as dot + short label.
pub const LOD_FULL_ZOOM: f64 = 0.2;
const LOD_LABEL_MAX_CHARS: usize = 15;

const CONNECTION_SAMPLES: usize = 10;
const CONNECTION_HIT_DISTANCE: f32 = 6.0;
const AXIS_LABEL_CULL_MARGIN: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    LeftCenter,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeSpec {
    pub width: f32,
    pub color: Color32,
}

/// Backend-neutral drawing primitive. The GUI maps these onto an
/// `egui::Painter`; tests inspect them directly.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Rect {
        rect: Rect,
        rounding: f32,
        fill: Color32,
        stroke: Option<StrokeSpec>,
    },
    Line {
        from: Pos2,
        to: Pos2,
        stroke: StrokeSpec,
    },
    Polyline {
        points: Vec<Pos2>,
        stroke: StrokeSpec,
    },
    DashedPolyline {
        points: Vec<Pos2>,
        stroke: StrokeSpec,
        dash_lengths: Vec<f32>,
        gap_lengths: Vec<f32>,
    },
    Circle {
        center: Pos2,
        radius: f32,
        fill: Color32,
        stroke: Option<StrokeSpec>,
    },
    Polygon {
        points: Vec<Pos2>,
        fill: Color32,
    },
    Text {
        pos: Pos2,
        text: String,
        size: f32,
        color: Color32,
        align: TextAlign,
        strong: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneParams<'a> {
    pub width: f32,
    pub height: f32,
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
    pub tracks: &'a [Track],
    pub events: &'a [TimelineEvent],
    pub connections: &'a [Connection],
    pub selected_event_id: Option<&'a str>,
    pub selected_connection_id: Option<&'a str>,
    pub highlighted_event_ids: Option<&'a HashSet<String>>,
    /// Injected so the today marker is deterministic under test.
    pub now_ms: i64,
    pub theme: CanvasTheme,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventRect {
    pub event_id: String,
    pub rect: Rect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionPath {
    pub connection_id: String,
    pub points: Vec<Pos2>,
}

/// Deterministic stand-in for real glyph metrics, monotone in string
/// length. The painter lays out actual text; the cache only needs a
/// stable, roughly proportional width.
pub fn approx_text_width(text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * font_size * 0.6
}

#[derive(Debug, Default)]
pub struct SceneEngine {
    event_rects: Vec<EventRect>,
    connection_paths: Vec<ConnectionPath>,
}

impl SceneEngine {
    /// Rebuild the scene from scratch. Replaces both caches.
    pub fn build(&mut self, params: &SceneParams<'_>) -> Vec<Primitive> {
        self.event_rects.clear();
        self.connection_paths.clear();

        let mut out = Vec::new();
        let theme = params.theme;

        out.push(Primitive::Rect {
            rect: Rect::from_min_size(pos2(0.0, 0.0), vec2(params.width, params.height)),
            rounding: 0.0,
            fill: theme.bg,
            stroke: None,
        });

        let visible = visible_tracks(params.tracks);
        self.draw_lanes(&mut out, params, &visible);
        self.draw_events(&mut out, params, &visible);
        self.draw_connections(&mut out, params);
        self.draw_axis(&mut out, params);
        self.draw_today_marker(&mut out, params);
        out
    }

    /// First hit in reverse draw order, so the type-priority sort makes
    /// later-drawn (higher priority) events win on overlap.
    pub fn hit_test(&self, x: f32, y: f32) -> Option<&str> {
        let p = pos2(x, y);
        self.event_rects
            .iter()
            .rev()
            .find(|er| er.rect.contains(p))
            .map(|er| er.event_id.as_str())
    }

    /// First cached connection with a sampled segment within 6px.
    pub fn hit_test_connection(&self, x: f32, y: f32) -> Option<&str> {
        let p = pos2(x, y);
        for path in &self.connection_paths {
            for seg in path.points.windows(2) {
                if point_segment_distance(p, seg[0], seg[1]) <= CONNECTION_HIT_DISTANCE {
                    return Some(path.connection_id.as_str());
                }
            }
        }
        None
    }

    pub fn event_rects(&self) -> &[EventRect] {
        &self.event_rects
    }

    fn draw_lanes(&mut self, out: &mut Vec<Primitive>, params: &SceneParams<'_>, visible: &[&Track]) {
        for (i, _track) in visible.iter().enumerate() {
            let y = i as f32 * TRACK_HEIGHT + params.pan_y as f32;
            if i % 2 == 1 {
                out.push(Primitive::Rect {
                    rect: Rect::from_min_size(pos2(0.0, y), vec2(params.width, TRACK_HEIGHT)),
                    rounding: 0.0,
                    fill: params.theme.track_alt,
                    stroke: None,
                });
            }
            out.push(Primitive::Line {
                from: pos2(0.0, y + TRACK_HEIGHT),
                to: pos2(params.width, y + TRACK_HEIGHT),
                stroke: StrokeSpec {
                    width: 0.5,
                    color: params.theme.grid,
                },
            });
        }
    }

    fn draw_events(&mut self, out: &mut Vec<Primitive>, params: &SceneParams<'_>, visible: &[&Track]) {
        let lane_index: HashMap<&str, usize> = visible
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.as_str(), i))
            .collect();

        let mut sorted: Vec<&TimelineEvent> = params.events.iter().collect();
        sorted.sort_by_key(|e| e.event_type.draw_priority());

        for event in sorted {
            // Missing or hidden track: skip silently.
            let Some(&lane) = lane_index.get(event.track_id.as_str()) else {
                continue;
            };
            let track = visible[lane];

            let dimmed = params
                .highlighted_event_ids
                .map(|set| !set.contains(&event.id))
                .unwrap_or(false);

            let x = timestamp_to_pixel(
                parse_date_to_timestamp(&event.start_date),
                params.zoom,
                params.pan_x,
            ) as f32;
            let track_y = lane as f32 * TRACK_HEIGHT + params.pan_y as f32;
            let center_y = track_y + TRACK_HEIGHT / 2.0;
            let base_color = color_or(
                event.color.as_deref(),
                color_or(Some(track.color.as_str()), params.theme.accent),
            );
            let color = if dimmed { dim(base_color) } else { base_color };
            let selected = params.selected_event_id == Some(event.id.as_str());

            if params.zoom < LOD_DOT_ZOOM {
                self.draw_dot(out, event, x, center_y, color);
                continue;
            }
            if params.zoom < LOD_FULL_ZOOM {
                self.draw_dot_with_label(out, params, event, x, center_y, color, dimmed);
                continue;
            }

            match event.event_type {
                EventType::Era => self.draw_era(out, params, event, x, track_y, color),
                EventType::Range => {
                    self.draw_range(out, params, event, x, center_y, color, selected)
                }
                EventType::Milestone => {
                    self.draw_milestone(out, params, event, x, center_y, color, selected, dimmed)
                }
                EventType::Point => {
                    self.draw_point(out, params, event, x, center_y, color, selected, dimmed)
                }
            }
        }
    }

    fn draw_dot(
        &mut self,
        out: &mut Vec<Primitive>,
        event: &TimelineEvent,
        x: f32,
        center_y: f32,
        color: Color32,
    ) {
        let radius = 3.0;
        out.push(Primitive::Circle {
            center: pos2(x, center_y),
            radius,
            fill: color,
            stroke: None,
        });
        self.event_rects.push(EventRect {
            event_id: event.id.clone(),
            rect: Rect::from_center_size(pos2(x, center_y), vec2(radius * 2.0, radius * 2.0)),
        });
    }

    fn draw_dot_with_label(
        &mut self,
        out: &mut Vec<Primitive>,
        params: &SceneParams<'_>,
        event: &TimelineEvent,
        x: f32,
        center_y: f32,
        color: Color32,
        dimmed: bool,
    ) {
        let radius = 3.0;
        let label = truncate(&event.title, LOD_LABEL_MAX_CHARS);
        let label_color = if dimmed {
            dim(params.theme.text_secondary)
        } else {
            params.theme.text_secondary
        };
        out.push(Primitive::Circle {
            center: pos2(x, center_y),
            radius,
            fill: color,
            stroke: None,
        });
        out.push(Primitive::Text {
            pos: pos2(x + radius + 4.0, center_y),
            text: label.clone(),
            size: 10.0,
            color: label_color,
            align: TextAlign::LeftCenter,
            strong: false,
        });
        let width = radius * 2.0 + approx_text_width(&label, 10.0) + 8.0;
        self.event_rects.push(EventRect {
            event_id: event.id.clone(),
            rect: Rect::from_min_size(
                pos2(x - radius, center_y - radius),
                vec2(width, radius * 2.0),
            ),
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_point(
        &mut self,
        out: &mut Vec<Primitive>,
        params: &SceneParams<'_>,
        event: &TimelineEvent,
        x: f32,
        center_y: f32,
        color: Color32,
        selected: bool,
        dimmed: bool,
    ) {
        let radius = 5.0 + event.clamped_importance() as f32;

        if selected {
            out.push(Primitive::Circle {
                center: pos2(x, center_y),
                radius: radius + 3.0,
                fill: Color32::TRANSPARENT,
                stroke: Some(StrokeSpec {
                    width: 2.0,
                    color: params.theme.accent,
                }),
            });
        }

        out.push(Primitive::Circle {
            center: pos2(x, center_y),
            radius,
            fill: color,
            stroke: None,
        });

        let text_color = if dimmed {
            dim(params.theme.text)
        } else {
            params.theme.text
        };
        out.push(Primitive::Text {
            pos: pos2(x + radius + 4.0, center_y),
            text: event.title.clone(),
            size: 11.0,
            color: text_color,
            align: TextAlign::LeftCenter,
            strong: selected,
        });

        self.event_rects.push(EventRect {
            event_id: event.id.clone(),
            rect: Rect::from_min_size(
                pos2(x - radius, center_y - radius),
                vec2(
                    radius * 2.0 + approx_text_width(&event.title, 11.0) + 8.0,
                    radius * 2.0,
                ),
            ),
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_range(
        &mut self,
        out: &mut Vec<Primitive>,
        params: &SceneParams<'_>,
        event: &TimelineEvent,
        start_x: f32,
        center_y: f32,
        color: Color32,
        selected: bool,
    ) {
        let end_x = match &event.end_date {
            Some(end) => {
                timestamp_to_pixel(parse_date_to_timestamp(end), params.zoom, params.pan_x) as f32
            }
            None => start_x + 50.0,
        };
        let bar_width = (end_x - start_x).max(4.0);
        let bar_height = 20.0 + event.clamped_importance() as f32 * 2.0;
        let y = center_y - bar_height / 2.0;
        let rect = Rect::from_min_size(pos2(start_x, y), vec2(bar_width, bar_height));

        if selected {
            out.push(Primitive::Rect {
                rect: rect.expand(2.0),
                rounding: 5.0,
                fill: Color32::TRANSPARENT,
                stroke: Some(StrokeSpec {
                    width: 2.0,
                    color: params.theme.accent,
                }),
            });
        }

        out.push(Primitive::Rect {
            rect,
            rounding: 4.0,
            fill: color,
            stroke: None,
        });

        let max_text_width = bar_width - 8.0;
        if max_text_width > 0.0 {
            let max_chars = (max_text_width / (10.0 * 0.6)).floor() as usize;
            let title = truncate(&event.title, max_chars);
            if !title.is_empty() {
                out.push(Primitive::Text {
                    pos: pos2(start_x + bar_width / 2.0, center_y),
                    text: title,
                    size: 10.0,
                    color: contrast_text(color),
                    align: TextAlign::Center,
                    strong: true,
                });
            }
        }

        self.event_rects.push(EventRect {
            event_id: event.id.clone(),
            rect,
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_milestone(
        &mut self,
        out: &mut Vec<Primitive>,
        params: &SceneParams<'_>,
        event: &TimelineEvent,
        x: f32,
        center_y: f32,
        color: Color32,
        selected: bool,
        dimmed: bool,
    ) {
        let size = 8.0 + event.clamped_importance() as f32;

        if selected {
            out.push(Primitive::Polyline {
                points: closed(diamond(x, center_y, size + 3.0)),
                stroke: StrokeSpec {
                    width: 2.0,
                    color: params.theme.accent,
                },
            });
        }

        out.push(Primitive::Polygon {
            points: diamond(x, center_y, size),
            fill: color,
        });

        let text_color = if dimmed {
            dim(params.theme.text)
        } else {
            params.theme.text
        };
        out.push(Primitive::Text {
            pos: pos2(x + size + 4.0, center_y),
            text: event.title.clone(),
            size: 11.0,
            color: text_color,
            align: TextAlign::LeftCenter,
            strong: true,
        });

        self.event_rects.push(EventRect {
            event_id: event.id.clone(),
            rect: Rect::from_min_size(
                pos2(x - size, center_y - size),
                vec2(
                    size * 2.0 + approx_text_width(&event.title, 11.0) + 8.0,
                    size * 2.0,
                ),
            ),
        });
    }

    fn draw_era(
        &mut self,
        out: &mut Vec<Primitive>,
        params: &SceneParams<'_>,
        event: &TimelineEvent,
        start_x: f32,
        track_y: f32,
        color: Color32,
    ) {
        let end_x = match &event.end_date {
            Some(end) => {
                timestamp_to_pixel(parse_date_to_timestamp(end), params.zoom, params.pan_x) as f32
            }
            None => start_x + 100.0,
        };
        let width = (end_x - start_x).max(4.0);
        let rect = Rect::from_min_size(pos2(start_x, track_y), vec2(width, TRACK_HEIGHT));

        out.push(Primitive::Rect {
            rect,
            rounding: 0.0,
            fill: with_alpha(color, 0x22),
            stroke: Some(StrokeSpec {
                width: 1.0,
                color: with_alpha(color, 0x44),
            }),
        });
        out.push(Primitive::Text {
            pos: pos2(start_x + width / 2.0, track_y + 12.0),
            text: event.title.clone(),
            size: 10.0,
            color: with_alpha(color, 0x88),
            align: TextAlign::Center,
            strong: false,
        });

        self.event_rects.push(EventRect {
            event_id: event.id.clone(),
            rect,
        });
    }

    fn draw_connections(&mut self, out: &mut Vec<Primitive>, params: &SceneParams<'_>) {
        let rect_by_id: HashMap<&str, Rect> = self
            .event_rects
            .iter()
            .map(|er| (er.event_id.as_str(), er.rect))
            .collect();

        for connection in params.connections {
            // Both endpoints must have been drawn this frame.
            let (Some(&source), Some(&target)) = (
                rect_by_id.get(connection.source_event_id.as_str()),
                rect_by_id.get(connection.target_event_id.as_str()),
            ) else {
                continue;
            };

            let (start, end) = facing_edges(source, target);
            let span = (end.x - start.x).abs().max(1.0);
            let bend = (span / 2.0).clamp(30.0, 120.0) * (end.x - start.x).signum();
            let c1 = pos2(start.x + bend, start.y);
            let c2 = pos2(end.x - bend, end.y);

            let points: Vec<Pos2> = (0..CONNECTION_SAMPLES)
                .map(|i| {
                    let t = i as f32 / (CONNECTION_SAMPLES - 1) as f32;
                    cubic_bezier_point(start, c1, c2, end, t)
                })
                .collect();

            let selected = params.selected_connection_id == Some(connection.id.as_str());
            let color = color_or(
                connection.color.as_deref(),
                connection_default_color(connection.connection_type, params.theme),
            );
            let stroke = StrokeSpec {
                width: if selected { 2.5 } else { 1.5 },
                color,
            };

            match dash_pattern(connection.connection_type) {
                Some((dash_lengths, gap_lengths)) => out.push(Primitive::DashedPolyline {
                    points: points.clone(),
                    stroke,
                    dash_lengths,
                    gap_lengths,
                }),
                None => out.push(Primitive::Polyline {
                    points: points.clone(),
                    stroke,
                }),
            }

            // Arrowhead along the curve's terminal tangent.
            let tangent = end - c2;
            let len = tangent.length();
            if len > f32::EPSILON {
                let dir = tangent / len;
                let ortho = vec2(-dir.y, dir.x);
                out.push(Primitive::Polygon {
                    points: vec![
                        end,
                        end - dir * 8.0 + ortho * 4.0,
                        end - dir * 8.0 - ortho * 4.0,
                    ],
                    fill: color,
                });
            }

            if let Some(label) = connection.label.as_deref().filter(|l| !l.is_empty()) {
                let mid = cubic_bezier_point(start, c1, c2, end, 0.5);
                out.push(Primitive::Text {
                    pos: pos2(mid.x, mid.y - 6.0),
                    text: label.to_string(),
                    size: 9.0,
                    color: params.theme.text_secondary,
                    align: TextAlign::Center,
                    strong: false,
                });
            }

            self.connection_paths.push(ConnectionPath {
                connection_id: connection.id.clone(),
                points,
            });
        }
    }

    fn draw_axis(&mut self, out: &mut Vec<Primitive>, params: &SceneParams<'_>) {
        let axis_top = params.height - AXIS_HEIGHT;

        out.push(Primitive::Rect {
            rect: Rect::from_min_size(pos2(0.0, axis_top), vec2(params.width, AXIS_HEIGHT)),
            rounding: 0.0,
            fill: params.theme.bg,
            stroke: None,
        });
        out.push(Primitive::Line {
            from: pos2(0.0, axis_top),
            to: pos2(params.width, axis_top),
            stroke: StrokeSpec {
                width: 1.0,
                color: params.theme.grid,
            },
        });

        for label in generate_axis_labels(params.width as f64, params.zoom, params.pan_x) {
            let x = label.x as f32;
            if x < -AXIS_LABEL_CULL_MARGIN || x > params.width + AXIS_LABEL_CULL_MARGIN {
                continue;
            }
            out.push(Primitive::Line {
                from: pos2(x, axis_top),
                to: pos2(x, axis_top + 6.0),
                stroke: StrokeSpec {
                    width: 1.0,
                    color: params.theme.grid,
                },
            });
            out.push(Primitive::Text {
                pos: pos2(x, axis_top + 22.0),
                text: label.text,
                size: 10.0,
                color: params.theme.text_muted,
                align: TextAlign::Center,
                strong: false,
            });
        }
    }

    fn draw_today_marker(&mut self, out: &mut Vec<Primitive>, params: &SceneParams<'_>) {
        let x = timestamp_to_pixel(params.now_ms, params.zoom, params.pan_x) as f32;
        let axis_top = params.height - AXIS_HEIGHT;
        out.push(Primitive::DashedPolyline {
            points: vec![pos2(x, 0.0), pos2(x, axis_top)],
            stroke: StrokeSpec {
                width: 1.0,
                color: params.theme.accent,
            },
            dash_lengths: vec![4.0],
            gap_lengths: vec![4.0],
        });
        out.push(Primitive::Text {
            pos: pos2(x + 4.0, 12.0),
            text: "Today".to_string(),
            size: 10.0,
            color: params.theme.accent,
            align: TextAlign::LeftCenter,
            strong: false,
        });
    }
}

/// Visible tracks in lane order.
pub fn visible_tracks(tracks: &[Track]) -> Vec<&Track> {
    let mut visible: Vec<&Track> = tracks.iter().filter(|t| t.visible).collect();
    visible.sort_by_key(|t| t.sort_order);
    visible
}

/// Map a vertical pixel (pan already removed) to the containing visible
/// track.
pub fn track_at_y(y: f32, tracks: &[Track]) -> Option<&str> {
    if y < 0.0 {
        return None;
    }
    let lane = (y / TRACK_HEIGHT).floor() as usize;
    visible_tracks(tracks).get(lane).map(|t| t.id.as_str())
}

fn dim(color: Color32) -> Color32 {
    with_alpha(color, (color.a() as f32 * 0.2) as u8)
}

fn connection_default_color(kind: ConnectionType, theme: CanvasTheme) -> Color32 {
    match kind {
        ConnectionType::Caused => theme.accent,
        ConnectionType::Preceded => theme.text_secondary,
        ConnectionType::Related | ConnectionType::Influenced => theme.text_muted,
    }
}

/// Dash/gap runs per connection type; `None` draws solid.
fn dash_pattern(kind: ConnectionType) -> Option<(Vec<f32>, Vec<f32>)> {
    match kind {
        ConnectionType::Caused => None,
        ConnectionType::Related => Some((vec![8.0], vec![4.0])),
        ConnectionType::Preceded => Some((vec![3.0], vec![3.0])),
        ConnectionType::Influenced => Some((vec![8.0, 2.0], vec![3.0, 3.0])),
    }
}

/// Start/end anchors on the facing edges of the endpoint rects.
fn facing_edges(source: Rect, target: Rect) -> (Pos2, Pos2) {
    if target.center().x >= source.center().x {
        (
            pos2(source.right(), source.center().y),
            pos2(target.left(), target.center().y),
        )
    } else {
        (
            pos2(source.left(), source.center().y),
            pos2(target.right(), target.center().y),
        )
    }
}

fn cubic_bezier_point(p0: Pos2, c1: Pos2, c2: Pos2, p1: Pos2, t: f32) -> Pos2 {
    let u = 1.0 - t;
    let w0 = u * u * u;
    let w1 = 3.0 * u * u * t;
    let w2 = 3.0 * u * t * t;
    let w3 = t * t * t;
    pos2(
        w0 * p0.x + w1 * c1.x + w2 * c2.x + w3 * p1.x,
        w0 * p0.y + w1 * c1.y + w2 * c2.y + w3 * p1.y,
    )
}

fn point_segment_distance(p: Pos2, a: Pos2, b: Pos2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq <= f32::EPSILON {
        return (p - a).length();
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    (p - (a + ab * t)).length()
}

fn diamond(x: f32, y: f32, size: f32) -> Vec<Pos2> {
    vec![
        pos2(x, y - size),
        pos2(x + size, y),
        pos2(x, y + size),
        pos2(x - size, y),
    ]
}

fn closed(mut points: Vec<Pos2>) -> Vec<Pos2> {
    if let Some(first) = points.first().copied() {
        points.push(first);
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Connection, ConnectionType, EventType, TimelineEvent, Track};

    fn track(id: &str, order: i32, visible: bool) -> Track {
        Track {
            id: id.into(),
            timeline_id: "t1".into(),
            name: id.to_uppercase(),
            color: "#3b82f6".into(),
            sort_order: order,
            visible,
        }
    }

    fn event(id: &str, track: &str, kind: EventType, start: &str, end: Option<&str>) -> TimelineEvent {
        TimelineEvent {
            id: id.into(),
            timeline_id: "t1".into(),
            track_id: track.into(),
            title: format!("Event {id}"),
            description: String::new(),
            start_date: start.into(),
            end_date: end.map(str::to_string),
            event_type: kind,
            importance: 3,
            color: None,
            tags: String::new(),
        }
    }

    fn connection(id: &str, source: &str, target: &str, kind: ConnectionType) -> Connection {
        Connection {
            id: id.into(),
            timeline_id: "t1".into(),
            source_event_id: source.into(),
            target_event_id: target.into(),
            connection_type: kind,
            label: Some("why".into()),
            color: None,
        }
    }

    struct Fixture {
        tracks: Vec<Track>,
        events: Vec<TimelineEvent>,
        connections: Vec<Connection>,
    }

    fn fixture() -> Fixture {
        Fixture {
            tracks: vec![
                track("alpha", 0, true),
                track("beta", 1, true),
                track("ghost", 2, false),
            ],
            events: vec![
                event("e-point", "alpha", EventType::Point, "2024-03-01", None),
                event(
                    "e-range",
                    "beta",
                    EventType::Range,
                    "2024-01-01",
                    Some("2024-09-01"),
                ),
                event("e-mile", "alpha", EventType::Milestone, "2024-03-01", None),
                event(
                    "e-era",
                    "alpha",
                    EventType::Era,
                    "2023-01-01",
                    Some("2025-01-01"),
                ),
                event("e-hidden", "ghost", EventType::Point, "2024-03-01", None),
            ],
            connections: vec![connection(
                "c1",
                "e-point",
                "e-range",
                ConnectionType::Caused,
            )],
        }
    }

    fn params<'a>(fx: &'a Fixture, zoom: f64) -> SceneParams<'a> {
        // Pan chosen so early-2024 dates land inside a 1000px viewport.
        let pan_x = -timestamp_to_pixel(parse_date_to_timestamp("2024-02-01"), zoom, 0.0) + 400.0;
        SceneParams {
            width: 1000.0,
            height: 400.0,
            zoom,
            pan_x,
            pan_y: 0.0,
            tracks: &fx.tracks,
            events: &fx.events,
            connections: &fx.connections,
            selected_event_id: None,
            selected_connection_id: None,
            highlighted_event_ids: None,
            now_ms: parse_date_to_timestamp("2024-02-01"),
            theme: CanvasTheme::dark(),
        }
    }

    #[test]
    fn milestone_wins_hit_test_over_underlying_era() {
        let fx = fixture();
        let mut engine = SceneEngine::default();
        engine.build(&params(&fx, 1.0));

        let mile_rect = engine
            .event_rects()
            .iter()
            .find(|er| er.event_id == "e-mile")
            .map(|er| er.rect)
            .expect("milestone rect cached");
        // The era spans the whole lane, so this point is inside both.
        let hit = engine.hit_test(mile_rect.center().x, mile_rect.center().y);
        assert_eq!(hit, Some("e-mile"));
    }

    #[test]
    fn hit_test_misses_empty_space() {
        let fx = fixture();
        let mut engine = SceneEngine::default();
        engine.build(&params(&fx, 1.0));
        assert_eq!(engine.hit_test(-500.0, 350.0), None);
    }

    #[test]
    fn hidden_track_events_are_skipped() {
        let fx = fixture();
        let mut engine = SceneEngine::default();
        engine.build(&params(&fx, 1.0));
        assert!(engine
            .event_rects()
            .iter()
            .all(|er| er.event_id != "e-hidden"));
    }

    #[test]
    fn rect_cache_reflects_only_latest_build() {
        let fx = fixture();
        let mut engine = SceneEngine::default();
        engine.build(&params(&fx, 1.0));
        let first_count = engine.event_rects().len();
        assert!(first_count > 0);

        let empty = Fixture {
            tracks: fx.tracks.clone(),
            events: Vec::new(),
            connections: Vec::new(),
        };
        engine.build(&params(&empty, 1.0));
        assert!(engine.event_rects().is_empty());
        assert!(engine.hit_test(400.0, 30.0).is_none());
    }

    #[test]
    fn connection_polyline_is_cached_and_hit_testable() {
        let fx = fixture();
        let mut engine = SceneEngine::default();
        engine.build(&params(&fx, 1.0));

        let path = engine
            .connection_paths
            .iter()
            .find(|p| p.connection_id == "c1")
            .expect("connection path cached");
        assert_eq!(path.points.len(), CONNECTION_SAMPLES);

        let mid = path.points[CONNECTION_SAMPLES / 2];
        assert_eq!(engine.hit_test_connection(mid.x, mid.y + 3.0), Some("c1"));
        assert_eq!(engine.hit_test_connection(mid.x, mid.y + 40.0), None);
    }

    #[test]
    fn connection_with_missing_endpoint_is_not_drawn() {
        let mut fx = fixture();
        fx.connections = vec![connection(
            "c-dangling",
            "e-point",
            "no-such-event",
            ConnectionType::Related,
        )];
        let mut engine = SceneEngine::default();
        engine.build(&params(&fx, 1.0));
        assert!(engine.connection_paths.is_empty());
    }

    #[test]
    fn low_zoom_collapses_everything_to_dots() {
        let mut fx = fixture();
        fx.connections.clear();
        let mut engine = SceneEngine::default();
        let p = params(&fx, 0.01);
        let primitives = engine.build(&p);

        let circles = primitives
            .iter()
            .filter(|p| matches!(p, Primitive::Circle { radius, .. } if *radius == 3.0))
            .count();
        // Four events on visible tracks, each a plain dot.
        assert_eq!(circles, 4);
        assert!(!primitives
            .iter()
            .any(|p| matches!(p, Primitive::Polygon { .. })));
    }

    #[test]
    fn mid_zoom_adds_truncated_labels() {
        let mut fx = fixture();
        fx.events = vec![{
            let mut e = event("e-long", "alpha", EventType::Point, "2024-03-01", None);
            e.title = "An extremely long event title".into();
            e
        }];
        let mut engine = SceneEngine::default();
        let primitives = engine.build(&params(&fx, 0.1));

        let label = primitives
            .iter()
            .find_map(|p| match p {
                Primitive::Text { text, .. } if text.contains('\u{2026}') => Some(text.clone()),
                _ => None,
            })
            .expect("truncated label present");
        assert!(label.chars().count() <= 15);
    }

    #[test]
    fn era_band_is_translucent_composition_of_validated_color() {
        let fx = fixture();
        let mut engine = SceneEngine::default();
        let primitives = engine.build(&params(&fx, 1.0));

        assert!(primitives.iter().any(|p| matches!(
            p,
            Primitive::Rect { fill, .. } if fill.a() == 0x22
        )));
    }

    #[test]
    fn malformed_event_color_falls_back_to_track_color() {
        let mut fx = fixture();
        fx.events = vec![{
            let mut e = event("e-bad", "alpha", EventType::Point, "2024-03-01", None);
            e.color = Some("#notacolor".into());
            e
        }];
        let mut engine = SceneEngine::default();
        let primitives = engine.build(&params(&fx, 1.0));

        let track_color = Color32::from_rgb(0x3b, 0x82, 0xf6);
        assert!(primitives.iter().any(|p| matches!(
            p,
            Primitive::Circle { fill, .. } if *fill == track_color
        )));
    }

    #[test]
    fn range_title_uses_contrast_text() {
        let mut fx = fixture();
        fx.events = vec![{
            let mut e = event(
                "e-light",
                "alpha",
                EventType::Range,
                "2024-01-01",
                Some("2024-12-01"),
            );
            e.color = Some("#ffffff".into());
            e
        }];
        let mut engine = SceneEngine::default();
        let primitives = engine.build(&params(&fx, 1.0));

        assert!(primitives.iter().any(|p| matches!(
            p,
            Primitive::Text { color, align: TextAlign::Center, .. } if *color == Color32::BLACK
        )));
    }

    #[test]
    fn highlight_set_dims_everything_outside_it() {
        let mut fx = fixture();
        fx.connections.clear();
        let mut engine = SceneEngine::default();
        let highlighted: HashSet<String> = ["e-point".to_string()].into_iter().collect();
        let mut p = params(&fx, 1.0);
        p.highlighted_event_ids = Some(&highlighted);
        let primitives = engine.build(&p);

        // The milestone is outside the set; its diamond must be faded.
        assert!(primitives.iter().any(|prim| matches!(
            prim,
            Primitive::Polygon { fill, .. } if fill.a() < 0xff
        )));
    }

    #[test]
    fn axis_labels_are_culled_to_viewport_margin() {
        let fx = fixture();
        let mut engine = SceneEngine::default();
        let p = params(&fx, 1.0);
        let primitives = engine.build(&p);

        let axis_top = p.height - AXIS_HEIGHT;
        for prim in &primitives {
            if let Primitive::Text { pos, .. } = prim {
                if pos.y > axis_top {
                    assert!(pos.x >= -AXIS_LABEL_CULL_MARGIN);
                    assert!(pos.x <= p.width + AXIS_LABEL_CULL_MARGIN);
                }
            }
        }
    }

    #[test]
    fn today_marker_lands_on_injected_instant() {
        let fx = fixture();
        let mut engine = SceneEngine::default();
        let p = params(&fx, 1.0);
        let primitives = engine.build(&p);

        let expected_x = timestamp_to_pixel(p.now_ms, p.zoom, p.pan_x) as f32;
        let marker = primitives.iter().find_map(|prim| match prim {
            Primitive::DashedPolyline { points, .. } if points.len() == 2 => Some(points[0].x),
            _ => None,
        });
        assert_eq!(marker, Some(expected_x));
    }

    #[test]
    fn track_at_y_maps_lanes_and_rejects_outside() {
        let fx = fixture();
        assert_eq!(track_at_y(30.0, &fx.tracks), Some("alpha"));
        assert_eq!(track_at_y(90.0, &fx.tracks), Some("beta"));
        // Third lane would be the hidden track; only two lanes exist.
        assert_eq!(track_at_y(150.0, &fx.tracks), None);
        assert_eq!(track_at_y(-5.0, &fx.tracks), None);
    }

    #[test]
    fn point_segment_distance_basics() {
        let d = point_segment_distance(pos2(5.0, 3.0), pos2(0.0, 0.0), pos2(10.0, 0.0));
        assert!((d - 3.0).abs() < 1e-6);
        let d2 = point_segment_distance(pos2(-4.0, 0.0), pos2(0.0, 0.0), pos2(10.0, 0.0));
        assert!((d2 - 4.0).abs() < 1e-6);
    }
}
