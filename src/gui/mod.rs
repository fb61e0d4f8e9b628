//! eframe host for the timeline canvas.
//!
//! Owns the viewport, history and dispatcher explicitly and passes them
//! into the per-frame scheduler and interaction handlers; nothing here is
//! global. The scene is rebuilt only on dirty or animating frames and the
//! cached primitives are repainted otherwise.
mod paint;

use crate::canvas::math::{fit_all_events, format_date, now_ms, pixel_to_timestamp};
use crate::canvas::scene::{track_at_y, Primitive, SceneEngine, SceneParams};
use crate::canvas::viewport::Viewport;
use crate::history::{History, HistoryEntry};
use crate::model::{Connection, TimelineEvent, Track};
use crate::settings::Settings;
use crate::store::dispatch::{Completion, StoreDispatcher};
use crate::store::{StoreReply, StoreRequest, TimelineStore};
use crate::theme::{CanvasTheme, ThemePreference};
use chrono::{TimeZone, Utc};
use eframe::egui::{self, Pos2, Rect, Sense, Vec2};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

const DRAG_THRESHOLD: f32 = 5.0;
const STATUS_SECONDS: f32 = 3.0;

/// What an in-flight store generation was for, so its completion can be
/// routed: snapshot refreshes replace local lists, mutations record
/// history, replays resolve the pessimistic stack swap.
#[derive(Debug, Clone)]
enum PendingKind {
    RefreshEvents,
    RefreshTracks,
    RefreshConnections,
    CreateEvent,
    UpdateEvent { before: TimelineEvent },
    DeleteEvent { before: TimelineEvent },
    Replay,
}

#[derive(Debug, Clone)]
struct DragState {
    event_id: String,
    press_pos: Pos2,
    original: TimelineEvent,
    active: bool,
}

pub struct TimelineApp {
    timeline_id: String,
    viewport: Viewport,
    history: History,
    engine: SceneEngine,
    dispatcher: StoreDispatcher,
    pending: HashMap<u64, PendingKind>,
    tracks: Vec<Track>,
    events: Vec<TimelineEvent>,
    connections: Vec<Connection>,
    selected_event_id: Option<String>,
    selected_connection_id: Option<String>,
    highlighted_event_ids: Option<HashSet<String>>,
    drag: Option<DragState>,
    theme_preference: ThemePreference,
    primitives: Vec<Primitive>,
    status: Option<String>,
    status_time: Option<Instant>,
    fitted_once: bool,
}

impl TimelineApp {
    pub fn new(settings: Settings, store: Box<dyn TimelineStore>, timeline_id: &str) -> Self {
        let mut app = Self {
            timeline_id: timeline_id.to_string(),
            viewport: Viewport::default(),
            history: History::new(settings.history_depth),
            engine: SceneEngine::default(),
            dispatcher: StoreDispatcher::spawn(store),
            pending: HashMap::new(),
            tracks: Vec::new(),
            events: Vec::new(),
            connections: Vec::new(),
            selected_event_id: None,
            selected_connection_id: None,
            highlighted_event_ids: None,
            drag: None,
            theme_preference: settings.theme,
            primitives: Vec::new(),
            status: None,
            status_time: None,
            fitted_once: false,
        };
        app.refresh_all();
        app
    }

    fn submit(&mut self, request: StoreRequest, kind: PendingKind) -> u64 {
        let generation = self.dispatcher.submit(request);
        self.pending.insert(generation, kind);
        generation
    }

    fn refresh_all(&mut self) {
        let timeline = self.timeline_id.clone();
        self.submit(
            StoreRequest::ListTracks(timeline.clone()),
            PendingKind::RefreshTracks,
        );
        self.submit(
            StoreRequest::ListEvents(timeline.clone()),
            PendingKind::RefreshEvents,
        );
        self.submit(
            StoreRequest::ListConnections(timeline),
            PendingKind::RefreshConnections,
        );
    }

    fn refresh_events(&mut self) {
        let timeline = self.timeline_id.clone();
        self.submit(
            StoreRequest::ListEvents(timeline),
            PendingKind::RefreshEvents,
        );
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some(message.into());
        self.status_time = Some(Instant::now());
    }

    fn process_completions(&mut self) {
        for completion in self.dispatcher.poll() {
            let Some(kind) = self.pending.remove(&completion.generation) else {
                tracing::debug!(
                    "completion {} ({}) has no pending slot",
                    completion.generation,
                    completion.label
                );
                continue;
            };
            self.handle_completion(kind, completion);
        }
    }

    fn handle_completion(&mut self, kind: PendingKind, completion: Completion) {
        let generation = completion.generation;
        let result = match completion.result {
            Ok(reply) => reply,
            Err(message) => {
                if matches!(kind, PendingKind::Replay) {
                    self.history.complete(generation, false);
                }
                tracing::warn!("{} failed: {message}", completion.label);
                self.set_status(format!("{} failed: {message}", completion.label));
                return;
            }
        };

        match (kind, result) {
            (PendingKind::RefreshEvents, StoreReply::Events(events)) => {
                self.events = events;
                self.viewport.mark_dirty();
            }
            (PendingKind::RefreshTracks, StoreReply::Tracks(tracks)) => {
                self.tracks = tracks;
                self.viewport.mark_dirty();
            }
            (PendingKind::RefreshConnections, StoreReply::Connections(connections)) => {
                self.connections = connections;
                self.viewport.mark_dirty();
            }
            (PendingKind::CreateEvent, StoreReply::Event(event)) => {
                self.selected_event_id = Some(event.id.clone());
                self.history.push(HistoryEntry::EventCreated { after: event });
                self.refresh_events();
            }
            (PendingKind::UpdateEvent { before }, StoreReply::Event(event)) => {
                self.history.push(HistoryEntry::EventUpdated {
                    before,
                    after: event,
                });
                self.refresh_events();
            }
            (PendingKind::DeleteEvent { before }, StoreReply::Done) => {
                self.history.push(HistoryEntry::EventDeleted { before });
                self.refresh_events();
            }
            (PendingKind::Replay, _) => {
                self.history.complete(generation, true);
                self.refresh_all();
            }
            (kind, reply) => {
                tracing::warn!("mismatched store reply {reply:?} for {kind:?}");
            }
        }
    }

    fn request_undo(&mut self) {
        if let Some(request) = self.history.begin_undo() {
            let generation = self.submit(request, PendingKind::Replay);
            self.history.submitted(generation);
            self.set_status("Undone");
        }
    }

    fn request_redo(&mut self) {
        if let Some(request) = self.history.begin_redo() {
            let generation = self.submit(request, PendingKind::Replay);
            self.history.submitted(generation);
            self.set_status("Redone");
        }
    }

    fn fit_all(&mut self) {
        if self.viewport.width() <= 0.0 {
            return;
        }
        let fit = fit_all_events(&self.events, self.viewport.width());
        self.viewport.set_zoom(fit.zoom);
        self.viewport.set_pan(fit.pan_offset_x, 0.0);
    }

    fn delete_selected_event(&mut self) {
        let Some(id) = self.selected_event_id.clone() else {
            return;
        };
        let Some(before) = self.events.iter().find(|e| e.id == id).cloned() else {
            return;
        };
        self.selected_event_id = None;
        self.submit(
            StoreRequest::DeleteEvent(id),
            PendingKind::DeleteEvent { before },
        );
        self.viewport.mark_dirty();
    }

    /// Quick-create a point event at the clicked canvas position.
    fn create_event_at(&mut self, local: Pos2) {
        let pan = self.viewport.pan_offset();
        let Some(track_id) = track_at_y(local.y - pan.y as f32, &self.tracks) else {
            return;
        };
        let date = self.date_at_pixel(local.x);
        let event = TimelineEvent {
            id: String::new(),
            timeline_id: self.timeline_id.clone(),
            track_id: track_id.to_string(),
            title: "New event".to_string(),
            description: String::new(),
            start_date: date,
            end_date: None,
            event_type: Default::default(),
            importance: 3,
            color: None,
            tags: String::new(),
        };
        self.submit(StoreRequest::CreateEvent(event), PendingKind::CreateEvent);
    }

    /// Day-precision date under a canvas-local x pixel.
    fn date_at_pixel(&self, x: f32) -> String {
        let ts = pixel_to_timestamp(
            x as f64,
            self.viewport.zoom_level(),
            self.viewport.pan_offset().x,
        );
        match Utc.timestamp_millis_opt(ts).single() {
            Some(dt) => dt.format("%Y-%m-%d").to_string(),
            None => String::new(),
        }
    }

    fn handle_wheel(&mut self, ctx: &egui::Context, canvas: Rect) {
        let scroll = ctx.input(|i| i.raw_scroll_delta);
        if scroll == Vec2::ZERO {
            return;
        }
        if scroll.x.abs() > scroll.y.abs() {
            self.viewport.pan(scroll.x as f64, 0.0);
            return;
        }
        let anchor_x = ctx
            .input(|i| i.pointer.hover_pos())
            .map(|p| (p.x - canvas.min.x) as f64)
            .unwrap_or(self.viewport.width() / 2.0);
        self.viewport.zoom_at_point(scroll.y as f64, anchor_x);
    }

    fn handle_pointer(&mut self, response: &egui::Response, canvas: Rect) {
        let to_local = |pos: Pos2| pos - canvas.min.to_vec2();

        if response.drag_started() {
            if let Some(pos) = response.interact_pointer_pos() {
                let local = to_local(pos);
                let hit = self
                    .engine
                    .hit_test(local.x, local.y)
                    .map(str::to_string);
                self.drag = hit
                    .and_then(|id| self.events.iter().find(|e| e.id == id).cloned())
                    .map(|original| DragState {
                        event_id: original.id.clone(),
                        press_pos: local,
                        original,
                        active: false,
                    });
            }
        }

        if response.dragged() {
            match response.interact_pointer_pos() {
                Some(pos) if self.drag.is_some() => {
                    let local = to_local(pos);
                    let date = self.date_at_pixel(local.x);
                    let pan_y = self.viewport.pan_offset().y as f32;
                    let new_track =
                        track_at_y(local.y - pan_y, &self.tracks).map(str::to_string);

                    let mut moved = None;
                    if let Some(drag) = self.drag.as_mut() {
                        if !drag.active && (local - drag.press_pos).length() > DRAG_THRESHOLD {
                            drag.active = true;
                        }
                        if drag.active {
                            moved = Some(drag.event_id.clone());
                        }
                    }
                    if let Some(event) =
                        moved.and_then(|id| self.events.iter_mut().find(|e| e.id == id))
                    {
                        event.start_date = date;
                        if let Some(track_id) = new_track {
                            event.track_id = track_id;
                        }
                        self.viewport.mark_dirty();
                    }
                }
                _ => {
                    let delta = response.drag_delta();
                    self.viewport.pan(delta.x as f64, delta.y as f64);
                }
            }
        }

        if response.drag_stopped() {
            if let Some(drag) = self.drag.take() {
                if drag.active {
                    if let Some(updated) =
                        self.events.iter().find(|e| e.id == drag.event_id).cloned()
                    {
                        if updated != drag.original {
                            self.set_status(format!(
                                "Moved to {}",
                                format_date(&updated.start_date)
                            ));
                            self.submit(
                                StoreRequest::UpdateEvent(updated),
                                PendingKind::UpdateEvent {
                                    before: drag.original,
                                },
                            );
                        }
                    }
                }
            }
        }

        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let local = to_local(pos);
                // Events win over connections on overlap.
                let event_hit = self
                    .engine
                    .hit_test(local.x, local.y)
                    .map(str::to_string);
                let connection_hit = if event_hit.is_none() {
                    self.engine
                        .hit_test_connection(local.x, local.y)
                        .map(str::to_string)
                } else {
                    None
                };
                self.selected_event_id = event_hit;
                self.selected_connection_id = connection_hit;
                self.viewport.mark_dirty();
            }
        }

        if response.double_clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let local = to_local(pos);
                if self.engine.hit_test(local.x, local.y).is_none() {
                    self.create_event_at(local);
                }
            }
        }
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        let (undo, redo, fit, zoom_in, zoom_out, delete, escape) = ctx.input(|i| {
            let cmd = i.modifiers.command;
            (
                cmd && !i.modifiers.shift && i.key_pressed(egui::Key::Z),
                cmd && i.modifiers.shift && i.key_pressed(egui::Key::Z),
                cmd && i.key_pressed(egui::Key::Num0),
                cmd && (i.key_pressed(egui::Key::Equals) || i.key_pressed(egui::Key::Plus)),
                cmd && i.key_pressed(egui::Key::Minus),
                i.key_pressed(egui::Key::Delete) || i.key_pressed(egui::Key::Backspace),
                i.key_pressed(egui::Key::Escape),
            )
        });

        if undo {
            self.request_undo();
        }
        if redo {
            self.request_redo();
        }
        if fit {
            self.fit_all();
        }
        if zoom_in {
            let center = self.viewport.width() / 2.0;
            self.viewport.zoom_at_point(1.0, center);
        }
        if zoom_out {
            let center = self.viewport.width() / 2.0;
            self.viewport.zoom_at_point(-1.0, center);
        }
        if delete {
            self.delete_selected_event();
        }
        if escape {
            self.selected_event_id = None;
            self.selected_connection_id = None;
            self.viewport.mark_dirty();
        }
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui
                .add_enabled(self.history.can_undo(), egui::Button::new("Undo"))
                .clicked()
            {
                self.request_undo();
            }
            if ui
                .add_enabled(self.history.can_redo(), egui::Button::new("Redo"))
                .clicked()
            {
                self.request_redo();
            }
            ui.separator();
            if ui.button("Fit all").clicked() {
                self.fit_all();
            }
            ui.label(format!("zoom {:.3}", self.viewport.zoom_level()));
            ui.separator();
            let mut dark = self.theme_preference == ThemePreference::Dark;
            if ui.toggle_value(&mut dark, "Dark").changed() {
                self.theme_preference = if dark {
                    ThemePreference::Dark
                } else {
                    ThemePreference::Light
                };
                self.viewport.mark_dirty();
            }
            if let Some(status) = &self.status {
                ui.separator();
                ui.label(status.clone());
            }
        });
    }

    fn canvas(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let desired = ui.available_size();
        let (canvas, response) = ui.allocate_exact_size(desired, Sense::click_and_drag());

        if (self.viewport.width() - canvas.width() as f64).abs() > 0.5
            || (self.viewport.height() - canvas.height() as f64).abs() > 0.5
        {
            self.viewport
                .set_viewport(canvas.width() as f64, canvas.height() as f64);
        }

        if !self.fitted_once && !self.events.is_empty() && self.viewport.width() > 0.0 {
            self.fitted_once = true;
            self.fit_all();
        }

        if response.hovered() {
            self.handle_wheel(ctx, canvas);
        }
        self.handle_pointer(&response, canvas);

        // Per-frame scheduler: animate, then rebuild only when needed.
        let animating = self.viewport.is_animating() && self.viewport.animate_zoom();
        if self.viewport.is_dirty() || animating {
            let params = SceneParams {
                width: canvas.width(),
                height: canvas.height(),
                zoom: self.viewport.zoom_level(),
                pan_x: self.viewport.pan_offset().x,
                pan_y: self.viewport.pan_offset().y,
                tracks: &self.tracks,
                events: &self.events,
                connections: &self.connections,
                selected_event_id: self.selected_event_id.as_deref(),
                selected_connection_id: self.selected_connection_id.as_deref(),
                highlighted_event_ids: self.highlighted_event_ids.as_ref(),
                now_ms: now_ms(),
                theme: CanvasTheme::resolve(self.theme_preference),
            };
            self.primitives = self.engine.build(&params);
            if !self.viewport.is_animating() {
                self.viewport.mark_clean();
            }
        }

        let painter = ui.painter_at(canvas);
        paint::paint_primitives(&painter, canvas.min.to_vec2(), &self.primitives);

        if self.viewport.is_animating() || !self.pending.is_empty() {
            ctx.request_repaint();
        }
    }
}

impl eframe::App for TimelineApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_completions();

        if let (Some(t), Some(_)) = (self.status_time, self.status.as_ref()) {
            if t.elapsed().as_secs_f32() >= STATUS_SECONDS {
                self.status = None;
                self.status_time = None;
            }
        }

        self.handle_keys(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            self.toolbar(ui);
        });
        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                self.canvas(ui, ctx);
            });
    }
}
