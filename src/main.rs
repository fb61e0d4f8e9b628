use chronolens::gui::TimelineApp;
use chronolens::logging;
use chronolens::model::{
    Connection, ConnectionType, EventType, TimelineEvent, Track, TRACK_COLORS,
};
use chronolens::settings::Settings;
use chronolens::store::{MemoryStore, TimelineStore};

use eframe::egui;

const DEMO_TIMELINE: &str = "computing";

fn main() -> anyhow::Result<()> {
    let settings_path = Settings::default_path();
    let settings = Settings::load(&settings_path)?;

    let log_dir = settings_path.parent().map(|p| p.join("logs"));
    let _log_guard = match &log_dir {
        Some(dir) if std::fs::create_dir_all(dir).is_ok() => {
            Some(logging::init_with_file(settings.debug_logging, dir))
        }
        _ => {
            logging::init(settings.debug_logging);
            None
        }
    };

    let store = demo_store()?;

    let window = settings.window_size.unwrap_or((1100, 640));
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([window.0 as f32, window.1 as f32])
            .with_min_inner_size([640.0, 400.0]),
        ..Default::default()
    };

    let app_settings = settings.clone();
    if let Err(err) = eframe::run_native(
        "chronolens",
        native_options,
        Box::new(move |_cc| {
            Box::new(TimelineApp::new(
                app_settings,
                Box::new(store),
                DEMO_TIMELINE,
            ))
        }),
    ) {
        tracing::error!("gui terminated: {err}");
    }
    Ok(())
}

fn track(id: &str, name: &str, order: i32) -> Track {
    Track {
        id: id.into(),
        timeline_id: DEMO_TIMELINE.into(),
        name: name.into(),
        color: TRACK_COLORS[order as usize % TRACK_COLORS.len()].into(),
        sort_order: order,
        visible: true,
    }
}

fn event(
    id: &str,
    track_id: &str,
    title: &str,
    start: &str,
    end: Option<&str>,
    kind: EventType,
    importance: u8,
) -> TimelineEvent {
    TimelineEvent {
        id: id.into(),
        timeline_id: DEMO_TIMELINE.into(),
        track_id: track_id.into(),
        title: title.into(),
        description: String::new(),
        start_date: start.into(),
        end_date: end.map(str::to_string),
        event_type: kind,
        importance,
        color: None,
        tags: String::new(),
    }
}

fn connection(id: &str, source: &str, target: &str, kind: ConnectionType, label: &str) -> Connection {
    Connection {
        id: id.into(),
        timeline_id: DEMO_TIMELINE.into(),
        source_event_id: source.into(),
        target_event_id: target.into(),
        connection_type: kind,
        label: Some(label.into()),
        color: None,
    }
}

/// A small history-of-computing timeline so the canvas has something to
/// show on first launch.
fn demo_store() -> anyhow::Result<MemoryStore> {
    let mut store = MemoryStore::new();

    store.create_track(track("hw", "Hardware", 0))?;
    store.create_track(track("sw", "Software", 1))?;
    store.create_track(track("net", "Networks", 2))?;

    let events = [
        event(
            "mainframes",
            "hw",
            "Mainframe era",
            "1952",
            Some("1975"),
            EventType::Era,
            2,
        ),
        event(
            "eniac",
            "hw",
            "ENIAC unveiled",
            "1946-02-14",
            None,
            EventType::Milestone,
            5,
        ),
        event(
            "transistor",
            "hw",
            "Point-contact transistor",
            "1947-12-16",
            None,
            EventType::Point,
            4,
        ),
        event(
            "altair",
            "hw",
            "Altair 8800",
            "1975-01",
            None,
            EventType::Point,
            3,
        ),
        event(
            "ibm-pc",
            "hw",
            "IBM PC",
            "1981-08-12",
            None,
            EventType::Milestone,
            4,
        ),
        event(
            "unix",
            "sw",
            "UNIX at Bell Labs",
            "1969",
            None,
            EventType::Point,
            4,
        ),
        event(
            "c-lang",
            "sw",
            "C language",
            "1972",
            None,
            EventType::Point,
            4,
        ),
        event(
            "linux",
            "sw",
            "Linux announced",
            "1991-08-25",
            None,
            EventType::Milestone,
            5,
        ),
        event(
            "home-computing",
            "sw",
            "Home computing",
            "1977",
            Some("1995"),
            EventType::Range,
            3,
        ),
        event(
            "arpanet",
            "net",
            "First ARPANET link",
            "1969-10-29",
            None,
            EventType::Milestone,
            5,
        ),
        event(
            "tcp-ip",
            "net",
            "ARPANET adopts TCP/IP",
            "1983-01-01",
            None,
            EventType::Point,
            4,
        ),
        event(
            "www",
            "net",
            "WWW proposal",
            "1989-03",
            None,
            EventType::Point,
            5,
        ),
    ];
    for ev in events {
        store.create_event(ev)?;
    }

    store.create_connection(connection(
        "c1",
        "unix",
        "linux",
        ConnectionType::Influenced,
        "design lineage",
    ))?;
    store.create_connection(connection(
        "c2",
        "c-lang",
        "unix",
        ConnectionType::Related,
        "rewritten in C",
    ))?;
    store.create_connection(connection(
        "c3",
        "arpanet",
        "tcp-ip",
        ConnectionType::Preceded,
        "",
    ))?;
    store.create_connection(connection(
        "c4",
        "transistor",
        "altair",
        ConnectionType::Caused,
        "microprocessors",
    ))?;

    Ok(store)
}
