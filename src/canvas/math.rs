//! Canvas coordinate math: bidirectional date<->pixel transforms and the
//! time-axis label machinery.
//!
//! Coordinate system:
//! - the Unix epoch (1970-01-01T00:00:00Z) maps to pixel 0,
//! - scale is `BASE_PIXELS_PER_DAY * zoom`,
//! - `pan_offset_x` shifts the whole view in pixel space.
use crate::model::TimelineEvent;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

pub const MS_PER_DAY: f64 = 86_400_000.0;
/// At zoom 1, one day is half a pixel.
pub const BASE_PIXELS_PER_DAY: f64 = 0.5;
/// Minimum horizontal spacing between axis labels.
pub const MIN_LABEL_SPACING: f64 = 80.0;

static YEAR_ONLY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,4}$").unwrap());
static YEAR_MONTH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}$").unwrap());

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn utc_ymd_hms(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Option<i64> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let dt = date.and_hms_opt(hour, min, sec)?;
    Some(Utc.from_utc_datetime(&dt).timestamp_millis())
}

/// Parse a flexible-precision date string to a UTC timestamp in
/// milliseconds. Year-only input resolves to July 1 of that year and
/// year-month input to the 15th, so imprecise events land mid-span rather
/// than at a boundary. Unparseable or empty input resolves to the current
/// time; this function never fails.
pub fn parse_date_to_timestamp(date: &str) -> i64 {
    let trimmed = date.trim();
    if trimmed.is_empty() {
        return now_ms();
    }

    if YEAR_ONLY_RE.is_match(trimmed) {
        if let Some(ts) = trimmed
            .parse::<i32>()
            .ok()
            .and_then(|year| utc_ymd_hms(year, 7, 1, 0, 0, 0))
        {
            return ts;
        }
        return now_ms();
    }

    if YEAR_MONTH_RE.is_match(trimmed) {
        let (year, month) = trimmed.split_at(4);
        let parsed = year
            .parse::<i32>()
            .ok()
            .zip(month[1..].parse::<u32>().ok())
            .and_then(|(y, m)| utc_ymd_hms(y, m, 15, 0, 0, 0));
        if let Some(ts) = parsed {
            return ts;
        }
        return now_ms();
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return dt.timestamp_millis();
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Utc.from_utc_datetime(&dt).timestamp_millis();
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Utc.from_utc_datetime(&dt).timestamp_millis();
        }
    }

    now_ms()
}

pub fn timestamp_to_pixel(ts_ms: i64, zoom: f64, pan_offset_x: f64) -> f64 {
    let days_since_epoch = ts_ms as f64 / MS_PER_DAY;
    days_since_epoch * BASE_PIXELS_PER_DAY * zoom + pan_offset_x
}

pub fn date_to_pixel(date: &str, zoom: f64, pan_offset_x: f64) -> f64 {
    timestamp_to_pixel(parse_date_to_timestamp(date), zoom, pan_offset_x)
}

pub fn pixel_to_timestamp(px: f64, zoom: f64, pan_offset_x: f64) -> i64 {
    let days_since_epoch = (px - pan_offset_x) / (BASE_PIXELS_PER_DAY * zoom);
    (days_since_epoch * MS_PER_DAY).round() as i64
}

pub fn pixel_to_date(px: f64, zoom: f64, pan_offset_x: f64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(pixel_to_timestamp(px, zoom, pan_offset_x))
        .single()
        .unwrap_or_else(Utc::now)
}

/// Timestamp range covered by the viewport, in milliseconds.
pub fn visible_range_ms(viewport_width: f64, zoom: f64, pan_offset_x: f64) -> (i64, i64) {
    (
        pixel_to_timestamp(0.0, zoom, pan_offset_x),
        pixel_to_timestamp(viewport_width, zoom, pan_offset_x),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelTier {
    Century,
    Decade,
    Year,
    Month,
    Day,
    Hour,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierConfig {
    pub tier: LabelTier,
    pub days_per_unit: f64,
}

/// Ordered coarsest to finest.
pub const TIERS: [TierConfig; 6] = [
    TierConfig {
        tier: LabelTier::Century,
        days_per_unit: 36_525.0,
    },
    TierConfig {
        tier: LabelTier::Decade,
        days_per_unit: 3_652.5,
    },
    TierConfig {
        tier: LabelTier::Year,
        days_per_unit: 365.25,
    },
    TierConfig {
        tier: LabelTier::Month,
        days_per_unit: 30.44,
    },
    TierConfig {
        tier: LabelTier::Day,
        days_per_unit: 1.0,
    },
    TierConfig {
        tier: LabelTier::Hour,
        days_per_unit: 1.0 / 24.0,
    },
];

/// Finest tier whose units are at least `MIN_LABEL_SPACING` pixels apart at
/// this zoom, falling back to centuries when even those are too dense.
pub fn select_label_tier(zoom: f64) -> TierConfig {
    for config in TIERS.iter().rev() {
        let px_per_unit = config.days_per_unit * BASE_PIXELS_PER_DAY * zoom;
        if px_per_unit >= MIN_LABEL_SPACING {
            return *config;
        }
    }
    TIERS[0]
}

const MONTH_ABBREV: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn format_tier_label(tier: LabelTier, dt: DateTime<Utc>) -> String {
    match tier {
        LabelTier::Century => format!("{}s", dt.year().div_euclid(100) * 100),
        LabelTier::Decade => format!("{}s", dt.year().div_euclid(10) * 10),
        LabelTier::Year => format!("{}", dt.year()),
        LabelTier::Month => format!(
            "{} {}",
            MONTH_ABBREV[dt.month0() as usize],
            dt.year()
        ),
        LabelTier::Day => format!("{}/{}", dt.month(), dt.day()),
        LabelTier::Hour => format!("{:02}:{:02}", dt.hour(), dt.minute()),
    }
}

/// Floor `ts` to the calendar boundary of the tier.
fn align_to_tier(tier: LabelTier, ts_ms: i64) -> Option<DateTime<Utc>> {
    let dt = Utc.timestamp_millis_opt(ts_ms).single()?;
    let aligned = match tier {
        LabelTier::Century => NaiveDate::from_ymd_opt(dt.year().div_euclid(100) * 100, 1, 1)?
            .and_hms_opt(0, 0, 0)?,
        LabelTier::Decade => {
            NaiveDate::from_ymd_opt(dt.year().div_euclid(10) * 10, 1, 1)?.and_hms_opt(0, 0, 0)?
        }
        LabelTier::Year => NaiveDate::from_ymd_opt(dt.year(), 1, 1)?.and_hms_opt(0, 0, 0)?,
        LabelTier::Month => {
            NaiveDate::from_ymd_opt(dt.year(), dt.month(), 1)?.and_hms_opt(0, 0, 0)?
        }
        LabelTier::Day => dt.date_naive().and_hms_opt(0, 0, 0)?,
        LabelTier::Hour => dt.date_naive().and_hms_opt(dt.hour(), 0, 0)?,
    };
    Some(Utc.from_utc_datetime(&aligned))
}

/// Advance one tier unit along the calendar.
fn step_tier(tier: LabelTier, dt: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let stepped = match tier {
        LabelTier::Century => NaiveDate::from_ymd_opt(dt.year() + 100, 1, 1)?.and_hms_opt(0, 0, 0)?,
        LabelTier::Decade => NaiveDate::from_ymd_opt(dt.year() + 10, 1, 1)?.and_hms_opt(0, 0, 0)?,
        LabelTier::Year => NaiveDate::from_ymd_opt(dt.year() + 1, 1, 1)?.and_hms_opt(0, 0, 0)?,
        LabelTier::Month => {
            let (year, month) = if dt.month() == 12 {
                (dt.year() + 1, 1)
            } else {
                (dt.year(), dt.month() + 1)
            };
            NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)?
        }
        LabelTier::Day => return Some(dt + chrono::Duration::days(1)),
        LabelTier::Hour => return Some(dt + chrono::Duration::hours(1)),
    };
    Some(Utc.from_utc_datetime(&stepped))
}

#[derive(Debug, Clone, PartialEq)]
pub struct AxisLabel {
    pub x: f64,
    pub text: String,
}

/// Labels are capped defensively; tier selection already guarantees
/// `MIN_LABEL_SPACING` so a real viewport never comes close.
const MAX_AXIS_LABELS: usize = 512;

/// Walk calendar-aligned ticks of the selected tier across the visible
/// range (with a one-unit margin on each side) and return pixel positions
/// plus formatted labels.
pub fn generate_axis_labels(viewport_width: f64, zoom: f64, pan_offset_x: f64) -> Vec<AxisLabel> {
    let tier = select_label_tier(zoom);
    let (start_ms, end_ms) = visible_range_ms(viewport_width, zoom, pan_offset_x);
    let margin = (tier.days_per_unit * MS_PER_DAY) as i64;
    let range_start = start_ms.saturating_sub(margin);
    let range_end = end_ms.saturating_add(margin);

    let mut labels = Vec::new();
    let Some(mut current) = align_to_tier(tier.tier, start_ms) else {
        return labels;
    };

    while current.timestamp_millis() < range_end && labels.len() < MAX_AXIS_LABELS {
        if current.timestamp_millis() >= range_start {
            labels.push(AxisLabel {
                x: timestamp_to_pixel(current.timestamp_millis(), zoom, pan_offset_x),
                text: format_tier_label(tier.tier, current),
            });
        }
        match step_tier(tier.tier, current) {
            Some(next) => current = next,
            None => break,
        }
    }
    labels
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitResult {
    pub zoom: f64,
    pub pan_offset_x: f64,
}

/// Zoom and pan that fit every event in the viewport with 10% padding,
/// centering the span midpoint. Empty input keeps zoom 1 and centers the
/// epoch.
pub fn fit_all_events(events: &[TimelineEvent], viewport_width: f64) -> FitResult {
    if events.is_empty() {
        return FitResult {
            zoom: 1.0,
            pan_offset_x: viewport_width / 2.0,
        };
    }

    let mut min_ts = i64::MAX;
    let mut max_ts = i64::MIN;
    for event in events {
        let start = parse_date_to_timestamp(&event.start_date);
        min_ts = min_ts.min(start);
        max_ts = max_ts.max(match &event.end_date {
            Some(end) => parse_date_to_timestamp(end),
            None => start,
        });
    }

    let mut range = (max_ts - min_ts) as f64;
    if range <= 0.0 {
        range = MS_PER_DAY * 365.0;
    }
    let padded_days = range * 1.1 / MS_PER_DAY;

    let zoom = viewport_width / (padded_days * BASE_PIXELS_PER_DAY);
    let center_days = (min_ts as f64 + max_ts as f64) / 2.0 / MS_PER_DAY;
    let pan_offset_x = viewport_width / 2.0 - center_days * BASE_PIXELS_PER_DAY * zoom;

    FitResult { zoom, pan_offset_x }
}

/// Humanize a flexible-precision date for labels and status lines.
pub fn format_date(date: &str) -> String {
    let trimmed = date.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if YEAR_ONLY_RE.is_match(trimmed) {
        return trimmed.to_string();
    }
    if YEAR_MONTH_RE.is_match(trimmed) {
        let ts = parse_date_to_timestamp(trimmed);
        if let Some(dt) = Utc.timestamp_millis_opt(ts).single() {
            return format!("{} {}", MONTH_ABBREV[dt.month0() as usize], dt.year());
        }
        return trimmed.to_string();
    }

    let has_time = trimmed.contains('T') || trimmed.contains(' ');
    let ts = parse_date_to_timestamp(trimmed);
    match Utc.timestamp_millis_opt(ts).single() {
        Some(dt) if has_time => format!(
            "{} {}, {} {:02}:{:02}",
            MONTH_ABBREV[dt.month0() as usize],
            dt.day(),
            dt.year(),
            dt.hour(),
            dt.minute()
        ),
        Some(dt) => format!(
            "{} {}, {}",
            MONTH_ABBREV[dt.month0() as usize],
            dt.day(),
            dt.year()
        ),
        None => trimmed.to_string(),
    }
}

/// Ellipsize to at most `max_chars` characters.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('\u{2026}');
    out
}
