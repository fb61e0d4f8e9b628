use chronolens::canvas::math::parse_date_to_timestamp;
use chronolens::canvas::scene::{SceneEngine, SceneParams};
use chronolens::model::{EventType, TimelineEvent, Track};
use chronolens::theme::CanvasTheme;
use criterion::{criterion_group, criterion_main, Criterion};

fn bench_scene_build(c: &mut Criterion) {
    let tracks: Vec<Track> = (0..8)
        .map(|i| Track {
            id: format!("track-{i}"),
            timeline_id: "bench".into(),
            name: format!("Track {i}"),
            color: "#3b82f6".into(),
            sort_order: i,
            visible: true,
        })
        .collect();

    let events: Vec<TimelineEvent> = (0..2_000)
        .map(|i| TimelineEvent {
            id: format!("event-{i}"),
            timeline_id: "bench".into(),
            track_id: format!("track-{}", i % 8),
            title: format!("Event number {i}"),
            description: String::new(),
            start_date: format!("{}-{:02}-01", 1950 + (i % 70), 1 + (i % 12)),
            end_date: None,
            event_type: match i % 4 {
                0 => EventType::Point,
                1 => EventType::Range,
                2 => EventType::Milestone,
                _ => EventType::Era,
            },
            importance: (i % 5) as u8 + 1,
            color: None,
            tags: String::new(),
        })
        .collect();

    let params = SceneParams {
        width: 1600.0,
        height: 900.0,
        zoom: 1.0,
        pan_x: 0.0,
        pan_y: 0.0,
        tracks: &tracks,
        events: &events,
        connections: &[],
        selected_event_id: None,
        selected_connection_id: None,
        highlighted_event_ids: None,
        now_ms: parse_date_to_timestamp("2000-01-01"),
        theme: CanvasTheme::dark(),
    };

    let mut engine = SceneEngine::default();
    c.bench_function("scene_build_2k_events", |b| {
        b.iter(|| engine.build(&params))
    });
}

criterion_group!(benches, bench_scene_build);
criterion_main!(benches);
