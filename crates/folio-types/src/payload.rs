//! Kind-specific block payloads.
//!
//! [`Payload`] is a sum type with one variant per [`BlockKind`]; matching on it
//! is exhaustive, so adding a kind is a compile error everywhere that cares.
//! On the wire (the `data` column) each payload is a camelCase JSON object.
//!
//! Decoding is lenient: numeric fields accept numbers or numeric strings and
//! anything else becomes "unset", which the accessor methods turn into the
//! documented fallback. A malformed width never rejects a whole page.
//!
//! Keys a payload struct does not know are kept in its `extra` map and written
//! back on save, so an older editor never strips newer fields.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::EnumString;

use crate::block::BlockKind;

/// Errors decoding or encoding a payload.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// The JSON did not have the shape of the kind's payload.
    #[error("invalid {kind} payload: {source}")]
    Invalid {
        kind: BlockKind,
        #[source]
        source: serde_json::Error,
    },

    /// Encoding the payload to JSON failed.
    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ── Shared pieces ───────────────────────────────────────────────────────────

/// Entrance animation attached to any block.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Animation {
    #[serde(default, deserialize_with = "lenient::animation_type")]
    pub animation_type: AnimationType,
    #[serde(default, deserialize_with = "lenient::opt_u32", skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u32>,
    #[serde(default, deserialize_with = "lenient::opt_u32", skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u32>,
    /// Keys this version does not model. They are written back unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Animation {
    pub const DEFAULT_DURATION_MS: u32 = 600;

    pub fn duration_ms(&self) -> u32 {
        self.duration_ms.unwrap_or(Self::DEFAULT_DURATION_MS)
    }

    pub fn delay_ms(&self) -> u32 {
        self.delay_ms.unwrap_or(0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive, serialize_all = "snake_case")]
pub enum AnimationType {
    #[default]
    None,
    FadeIn,
    SlideUp,
    SlideLeft,
    SlideRight,
    ZoomIn,
}

/// Horizontal alignment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum Align {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum ButtonVariant {
    #[default]
    Primary,
    Secondary,
    Outline,
}

// ── Per-kind payloads ───────────────────────────────────────────────────────

/// Title and subtitle share a shape.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HeadingPayload {
    pub text: String,
    #[serde(deserialize_with = "lenient::align")]
    pub align: Align,
    #[serde(deserialize_with = "lenient::opt_f32", skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
    #[serde(deserialize_with = "lenient::opt_f32", skip_serializing_if = "Option::is_none")]
    pub margin_top: Option<f32>,
    #[serde(deserialize_with = "lenient::opt_f32", skip_serializing_if = "Option::is_none")]
    pub margin_bottom: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation: Option<Animation>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParagraphPayload {
    pub html: String,
    #[serde(deserialize_with = "lenient::opt_f32", skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
    #[serde(deserialize_with = "lenient::opt_f32", skip_serializing_if = "Option::is_none")]
    pub margin_top: Option<f32>,
    #[serde(deserialize_with = "lenient::opt_f32", skip_serializing_if = "Option::is_none")]
    pub margin_bottom: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation: Option<Animation>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImagePayload {
    /// Blob-store path of the image.
    pub path: String,
    pub alt: String,
    /// Width as a percentage of the container.
    #[serde(deserialize_with = "lenient::opt_f32", skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    #[serde(deserialize_with = "lenient::align")]
    pub align: Align,
    #[serde(deserialize_with = "lenient::boolean")]
    pub border: bool,
    #[serde(deserialize_with = "lenient::opt_f32", skip_serializing_if = "Option::is_none")]
    pub border_radius: Option<f32>,
    #[serde(deserialize_with = "lenient::opt_f32", skip_serializing_if = "Option::is_none")]
    pub margin_top: Option<f32>,
    #[serde(deserialize_with = "lenient::opt_f32", skip_serializing_if = "Option::is_none")]
    pub margin_bottom: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation: Option<Animation>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ImagePayload {
    pub const DEFAULT_WIDTH: f32 = 100.0;

    /// Width percentage, clamped to `0..=100`.
    pub fn width(&self) -> f32 {
        self.width
            .filter(|w| w.is_finite())
            .unwrap_or(Self::DEFAULT_WIDTH)
            .clamp(0.0, 100.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MediaRef {
    pub path: String,
    pub alt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GalleryPayload {
    pub images: Vec<MediaRef>,
    #[serde(deserialize_with = "lenient::opt_u32", skip_serializing_if = "Option::is_none")]
    pub columns: Option<u32>,
    #[serde(deserialize_with = "lenient::opt_f32", skip_serializing_if = "Option::is_none")]
    pub gap: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation: Option<Animation>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GalleryPayload {
    pub const DEFAULT_COLUMNS: u32 = 3;

    pub fn columns(&self) -> u32 {
        self.columns.filter(|c| *c > 0).unwrap_or(Self::DEFAULT_COLUMNS)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoPayload {
    pub url: String,
    #[serde(deserialize_with = "lenient::boolean")]
    pub autoplay: bool,
    #[serde(rename = "loop", deserialize_with = "lenient::boolean")]
    pub looped: bool,
    #[serde(deserialize_with = "lenient::boolean")]
    pub muted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation: Option<Animation>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ButtonPayload {
    pub label: String,
    pub href: String,
    #[serde(deserialize_with = "lenient::button_variant")]
    pub variant: ButtonVariant,
    #[serde(deserialize_with = "lenient::align")]
    pub align: Align,
    #[serde(deserialize_with = "lenient::boolean")]
    pub open_in_new_tab: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation: Option<Animation>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SlideshowPayload {
    pub slides: Vec<MediaRef>,
    #[serde(deserialize_with = "lenient::opt_u32", skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation: Option<Animation>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SlideshowPayload {
    pub const DEFAULT_INTERVAL_MS: u32 = 5000;

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms.filter(|i| *i > 0).unwrap_or(Self::DEFAULT_INTERVAL_MS)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DateLabelPayload {
    pub text: String,
    #[serde(deserialize_with = "lenient::align")]
    pub align: Align,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation: Option<Animation>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Card {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CardGridPayload {
    pub cards: Vec<Card>,
    #[serde(deserialize_with = "lenient::opt_u32", skip_serializing_if = "Option::is_none")]
    pub columns: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation: Option<Animation>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CardGridPayload {
    pub const DEFAULT_COLUMNS: u32 = 3;

    pub fn columns(&self) -> u32 {
        self.columns.filter(|c| *c > 0).unwrap_or(Self::DEFAULT_COLUMNS)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColumnsPayload {
    /// Fraction of the width given to the left slot.
    #[serde(deserialize_with = "lenient::opt_f32", skip_serializing_if = "Option::is_none")]
    pub ratio: Option<f32>,
    #[serde(deserialize_with = "lenient::opt_f32", skip_serializing_if = "Option::is_none")]
    pub gap: Option<f32>,
    #[serde(deserialize_with = "lenient::boolean")]
    pub stack_on_mobile: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation: Option<Animation>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ColumnsPayload {
    pub const DEFAULT_RATIO: f32 = 0.5;
    pub const DEFAULT_GAP: f32 = 24.0;

    /// Left-slot fraction, kept strictly inside `(0, 1)`.
    pub fn ratio(&self) -> f32 {
        self.ratio
            .filter(|r| r.is_finite() && *r > 0.0 && *r < 1.0)
            .unwrap_or(Self::DEFAULT_RATIO)
    }

    pub fn gap(&self) -> f32 {
        self.gap.filter(|g| g.is_finite() && *g >= 0.0).unwrap_or(Self::DEFAULT_GAP)
    }
}

// ── The sum type ────────────────────────────────────────────────────────────

/// Kind-tagged block content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    Title(HeadingPayload),
    Subtitle(HeadingPayload),
    Paragraph(ParagraphPayload),
    Image(ImagePayload),
    Gallery(GalleryPayload),
    Video(VideoPayload),
    Button(ButtonPayload),
    Slideshow(SlideshowPayload),
    DateLabel(DateLabelPayload),
    CardGrid(CardGridPayload),
    Columns(ColumnsPayload),
}

impl Payload {
    /// The kind this payload belongs to.
    pub fn kind(&self) -> BlockKind {
        match self {
            Payload::Title(_) => BlockKind::Title,
            Payload::Subtitle(_) => BlockKind::Subtitle,
            Payload::Paragraph(_) => BlockKind::Paragraph,
            Payload::Image(_) => BlockKind::Image,
            Payload::Gallery(_) => BlockKind::Gallery,
            Payload::Video(_) => BlockKind::Video,
            Payload::Button(_) => BlockKind::Button,
            Payload::Slideshow(_) => BlockKind::Slideshow,
            Payload::DateLabel(_) => BlockKind::DateLabel,
            Payload::CardGrid(_) => BlockKind::CardGrid,
            Payload::Columns(_) => BlockKind::Columns,
        }
    }

    /// Canonical payload for a freshly created block.
    pub fn default_for(kind: BlockKind) -> Self {
        match kind {
            BlockKind::Title => Payload::Title(HeadingPayload {
                text: "New title".into(),
                ..Default::default()
            }),
            BlockKind::Subtitle => Payload::Subtitle(HeadingPayload {
                text: "New subtitle".into(),
                ..Default::default()
            }),
            BlockKind::Paragraph => Payload::Paragraph(ParagraphPayload {
                html: "Write something…".into(),
                ..Default::default()
            }),
            BlockKind::Image => Payload::Image(ImagePayload {
                width: Some(ImagePayload::DEFAULT_WIDTH),
                ..Default::default()
            }),
            BlockKind::Gallery => Payload::Gallery(GalleryPayload {
                columns: Some(GalleryPayload::DEFAULT_COLUMNS),
                ..Default::default()
            }),
            BlockKind::Video => Payload::Video(VideoPayload {
                muted: true,
                ..Default::default()
            }),
            BlockKind::Button => Payload::Button(ButtonPayload {
                label: "Click me".into(),
                href: "#".into(),
                ..Default::default()
            }),
            BlockKind::Slideshow => Payload::Slideshow(SlideshowPayload {
                interval_ms: Some(SlideshowPayload::DEFAULT_INTERVAL_MS),
                ..Default::default()
            }),
            BlockKind::DateLabel => Payload::DateLabel(DateLabelPayload {
                text: "2024 — Present".into(),
                ..Default::default()
            }),
            BlockKind::CardGrid => Payload::CardGrid(CardGridPayload {
                columns: Some(CardGridPayload::DEFAULT_COLUMNS),
                ..Default::default()
            }),
            BlockKind::Columns => Payload::Columns(ColumnsPayload {
                ratio: Some(ColumnsPayload::DEFAULT_RATIO),
                gap: Some(ColumnsPayload::DEFAULT_GAP),
                stack_on_mobile: true,
                ..Default::default()
            }),
        }
    }

    /// Decode a stored `(block_type, data)` pair.
    ///
    /// `null` data decodes as the all-defaults payload of the kind.
    pub fn from_parts(kind: BlockKind, data: serde_json::Value) -> Result<Self, PayloadError> {
        let data = if data.is_null() {
            serde_json::Value::Object(Default::default())
        } else {
            data
        };
        let invalid = |source| PayloadError::Invalid { kind, source };

        Ok(match kind {
            BlockKind::Title => Payload::Title(serde_json::from_value(data).map_err(invalid)?),
            BlockKind::Subtitle => {
                Payload::Subtitle(serde_json::from_value(data).map_err(invalid)?)
            }
            BlockKind::Paragraph => {
                Payload::Paragraph(serde_json::from_value(data).map_err(invalid)?)
            }
            BlockKind::Image => Payload::Image(serde_json::from_value(data).map_err(invalid)?),
            BlockKind::Gallery => Payload::Gallery(serde_json::from_value(data).map_err(invalid)?),
            BlockKind::Video => Payload::Video(serde_json::from_value(data).map_err(invalid)?),
            BlockKind::Button => Payload::Button(serde_json::from_value(data).map_err(invalid)?),
            BlockKind::Slideshow => {
                Payload::Slideshow(serde_json::from_value(data).map_err(invalid)?)
            }
            BlockKind::DateLabel => {
                Payload::DateLabel(serde_json::from_value(data).map_err(invalid)?)
            }
            BlockKind::CardGrid => {
                Payload::CardGrid(serde_json::from_value(data).map_err(invalid)?)
            }
            BlockKind::Columns => Payload::Columns(serde_json::from_value(data).map_err(invalid)?),
        })
    }

    /// Encode the payload body for the `data` column.
    pub fn to_data(&self) -> Result<serde_json::Value, PayloadError> {
        let value = match self {
            Payload::Title(p) | Payload::Subtitle(p) => serde_json::to_value(p)?,
            Payload::Paragraph(p) => serde_json::to_value(p)?,
            Payload::Image(p) => serde_json::to_value(p)?,
            Payload::Gallery(p) => serde_json::to_value(p)?,
            Payload::Video(p) => serde_json::to_value(p)?,
            Payload::Button(p) => serde_json::to_value(p)?,
            Payload::Slideshow(p) => serde_json::to_value(p)?,
            Payload::DateLabel(p) => serde_json::to_value(p)?,
            Payload::CardGrid(p) => serde_json::to_value(p)?,
            Payload::Columns(p) => serde_json::to_value(p)?,
        };
        Ok(value)
    }

    /// The entrance animation, if one is set.
    pub fn animation(&self) -> Option<&Animation> {
        match self {
            Payload::Title(p) | Payload::Subtitle(p) => p.animation.as_ref(),
            Payload::Paragraph(p) => p.animation.as_ref(),
            Payload::Image(p) => p.animation.as_ref(),
            Payload::Gallery(p) => p.animation.as_ref(),
            Payload::Video(p) => p.animation.as_ref(),
            Payload::Button(p) => p.animation.as_ref(),
            Payload::Slideshow(p) => p.animation.as_ref(),
            Payload::DateLabel(p) => p.animation.as_ref(),
            Payload::CardGrid(p) => p.animation.as_ref(),
            Payload::Columns(p) => p.animation.as_ref(),
        }
    }

    /// Short human-readable summary, for outlines and logs.
    pub fn summary(&self) -> String {
        match self {
            Payload::Title(p) | Payload::Subtitle(p) => p.text.clone(),
            Payload::Paragraph(p) => p.html.clone(),
            Payload::Image(p) => p.path.clone(),
            Payload::Gallery(p) => format!("{} images", p.images.len()),
            Payload::Video(p) => p.url.clone(),
            Payload::Button(p) => format!("{} → {}", p.label, p.href),
            Payload::Slideshow(p) => format!("{} slides", p.slides.len()),
            Payload::DateLabel(p) => p.text.clone(),
            Payload::CardGrid(p) => format!("{} cards", p.cards.len()),
            Payload::Columns(p) => format!("ratio {:.2}", p.ratio()),
        }
    }
}

// ── Lenient field decoders ──────────────────────────────────────────────────

mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::{Align, AnimationType, ButtonVariant, FromStr};

    fn number(v: &Value) -> Option<f64> {
        match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().trim_end_matches("px").trim_end_matches('%').parse().ok(),
            _ => None,
        }
    }

    pub fn opt_f32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f32>, D::Error> {
        let v = Value::deserialize(d)?;
        Ok(number(&v).map(|n| n as f32).filter(|n| n.is_finite()))
    }

    pub fn opt_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        let v = Value::deserialize(d)?;
        Ok(number(&v)
            .filter(|n| n.is_finite() && *n >= 0.0 && *n <= u32::MAX as f64)
            .map(|n| n.round() as u32))
    }

    pub fn boolean<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        let v = Value::deserialize(d)?;
        Ok(match v {
            Value::Bool(b) => b,
            Value::String(s) => s.eq_ignore_ascii_case("true"),
            Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
            _ => false,
        })
    }

    fn enum_or_default<'de, D, T>(d: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: FromStr + Default,
    {
        let v = Value::deserialize(d)?;
        Ok(v.as_str().and_then(|s| T::from_str(s).ok()).unwrap_or_default())
    }

    pub fn align<'de, D: Deserializer<'de>>(d: D) -> Result<Align, D::Error> {
        enum_or_default(d)
    }

    pub fn animation_type<'de, D: Deserializer<'de>>(d: D) -> Result<AnimationType, D::Error> {
        enum_or_default(d)
    }

    pub fn button_variant<'de, D: Deserializer<'de>>(d: D) -> Result<ButtonVariant, D::Error> {
        enum_or_default(d)
    }
}

// ============================================================================
// Tests
// ============================================================================
