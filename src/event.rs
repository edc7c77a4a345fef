//! Inbound event records.
//!
//! Broker messages on the events topic carry a JSON document whose `data`
//! object describes one upstream event (a repository push, an encyclopedia
//! edit, a weather change). [`decode_event`] turns that document into an
//! [`EventRecord`] for the rendering and audio collaborators.
//!
//! Every field is optional. Missing or mistyped fields fall back to their
//! defaults instead of rejecting the message; only a payload that is not JSON
//! or has no `data` object is an error.
//!
//! # Example
//!
//! ```
//! use windchime_esp32::event::{decode_event, DataSource};
//!
//! let record = decode_event(br#"{"data":{"source":"wiki","description_title":"X"}}"#, 1024)
//!     .unwrap();
//! assert_eq!(record.source, DataSource::Encyclopedia);
//! assert_eq!(record.intensity, 60);
//! assert_eq!(record.style.radius, 50);
//! ```

use serde_json::{Map, Value};
use std::fmt;

/// Byte limit of the title and body fields.
pub const MAX_DESCRIPTION_LEN: usize = 127;

/// Byte limit of the time field.
pub const MAX_TIME_LEN: usize = 31;

/// Byte limit of each auxiliary field.
pub const MAX_AUX_LEN: usize = 63;

/// Lowest and highest derived intensity.
pub const MIN_INTENSITY: i32 = 10;
pub const MAX_INTENSITY: i32 = 100;

const BASE_INTENSITY: i32 = 50;

/// Upstream feed an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSource {
    Repo,
    Encyclopedia,
    Weather,
}

impl DataSource {
    /// Map a wire source tag to a feed.
    ///
    /// Exact names are matched first (`github`, `wiki`, `wikipedia`,
    /// `weather`, `wind`), then substrings (`git`, `wiki`, `weather`/`wind`).
    /// Matching ignores case. Anything else is a repository event.
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.to_ascii_lowercase();
        match tag.as_str() {
            "github" => return Self::Repo,
            "wiki" | "wikipedia" => return Self::Encyclopedia,
            "weather" | "wind" => return Self::Weather,
            _ => {}
        }

        if tag.contains("git") {
            Self::Repo
        } else if tag.contains("wiki") {
            Self::Encyclopedia
        } else if tag.contains("weather") || tag.contains("wind") {
            Self::Weather
        } else {
            Self::Repo
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Repo => "Repo",
            Self::Encyclopedia => "Encyclopedia",
            Self::Weather => "Weather",
        }
    }

    /// Fixed intensity contribution of the feed.
    pub fn intensity_bonus(&self) -> i32 {
        match self {
            Self::Repo => 20,
            Self::Encyclopedia => 10,
            Self::Weather => 30,
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visual style of the circle drawn for an event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleStyle {
    pub x: i32,
    pub y: i32,
    pub radius: i32,
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Default for CircleStyle {
    fn default() -> Self {
        Self {
            x: 200,
            y: 200,
            radius: 50,
            r: 255,
            g: 255,
            b: 255,
            a: 1.0,
        }
    }
}

/// One decoded event, handed to the event handler and then dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub source: DataSource,
    pub title: String,
    pub body: String,
    pub time: String,
    pub aux1: String,
    pub aux2: String,
    /// Derived, in `MIN_INTENSITY..=MAX_INTENSITY`.
    pub intensity: i32,
    pub style: CircleStyle,
}

/// Intensity of an event: baseline, +1 per 10 bytes of title and body, plus
/// the feed bonus, clamped to `[MIN_INTENSITY, MAX_INTENSITY]`.
pub fn derive_intensity(source: DataSource, title: &str, body: &str) -> i32 {
    let length_bucket = i32::try_from((title.len() + body.len()) / 10).unwrap_or(i32::MAX);
    BASE_INTENSITY
        .saturating_add(length_bucket)
        .saturating_add(source.intensity_bonus())
        .clamp(MIN_INTENSITY, MAX_INTENSITY)
}

/// Decode one inbound message.
///
/// `max_len` is the largest payload accepted, normally the broker buffer size.
pub fn decode_event(payload: &[u8], max_len: usize) -> Result<EventRecord, DecodeError> {
    if payload.len() > max_len {
        return Err(DecodeError::TooLarge {
            len: payload.len(),
            max: max_len,
        });
    }

    let text = std::str::from_utf8(payload).map_err(DecodeError::Utf8)?;
    let document: Value = serde_json::from_str(text)?;
    let data = document
        .get("data")
        .and_then(Value::as_object)
        .ok_or(DecodeError::MissingData)?;

    let source = DataSource::from_tag(str_field(data, "source").unwrap_or("unknown"));
    let title = bounded(data, "description_title", MAX_DESCRIPTION_LEN);
    let body = bounded(data, "description_msg", MAX_DESCRIPTION_LEN);
    let intensity = derive_intensity(source, &title, &body);

    Ok(EventRecord {
        source,
        time: bounded(data, "time", MAX_TIME_LEN),
        aux1: bounded(data, "data1", MAX_AUX_LEN),
        aux2: bounded(data, "data2", MAX_AUX_LEN),
        title,
        body,
        intensity,
        style: decode_style(data.get("style")),
    })
}

fn decode_style(style: Option<&Value>) -> CircleStyle {
    let defaults = CircleStyle::default();
    let Some(style) = style.and_then(Value::as_object) else {
        return defaults;
    };
    let color = style.get("color").and_then(Value::as_object);
    let channel = |name: &str, default: u8| {
        color
            .and_then(|c| c.get(name))
            .and_then(Value::as_i64)
            .map(|v| v.clamp(0, 255) as u8)
            .unwrap_or(default)
    };

    CircleStyle {
        x: int_field(style, "x_coord").unwrap_or(defaults.x),
        y: int_field(style, "y_coord").unwrap_or(defaults.y),
        radius: int_field(style, "radius").unwrap_or(defaults.radius),
        r: channel("r", defaults.r),
        g: channel("g", defaults.g),
        b: channel("b", defaults.b),
        a: color
            .and_then(|c| c.get("a"))
            .and_then(Value::as_f64)
            .map(|a| a as f32)
            .unwrap_or(defaults.a),
    }
}

fn str_field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Value::as_str)
}

fn int_field(object: &Map<String, Value>, key: &str) -> Option<i32> {
    object
        .get(key)
        .and_then(Value::as_i64)
        .and_then(|v| i32::try_from(v).ok())
}

fn bounded(object: &Map<String, Value>, key: &str, max: usize) -> String {
    truncate(str_field(object, key).unwrap_or(""), max).to_string()
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char.
fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Reasons an inbound message is dropped.
#[derive(Debug)]
pub enum DecodeError {
    /// Payload is not UTF-8.
    Utf8(std::str::Utf8Error),
    /// Payload exceeds the receive buffer.
    TooLarge { len: usize, max: usize },
    /// Payload is not a JSON document.
    Json(serde_json::Error),
    /// Document has no `data` object.
    MissingData,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utf8(e) => write!(f, "payload is not UTF-8: {}", e),
            Self::TooLarge { len, max } => {
                write!(f, "payload too large: {} bytes (max {})", len, max)
            }
            Self::Json(e) => write!(f, "JSON parsing failed: {}", e),
            Self::MissingData => write!(f, "no 'data' field in message"),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Utf8(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}
