// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ids::*;

const UNSET_STATES: [&str; 2] = ["NULL", "UNDEF"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WidgetKind {
    Switch,
    Slider,
    Segmented,
    Rollershutter,
    Setpoint,
    Frame,
    Image,
    Chart,
    Mapview,
    Colorpicker,
    Generic,
}

impl WidgetKind {
    pub const ALL: [Self; 11] = [
        Self::Switch,
        Self::Slider,
        Self::Segmented,
        Self::Rollershutter,
        Self::Setpoint,
        Self::Frame,
        Self::Image,
        Self::Chart,
        Self::Mapview,
        Self::Colorpicker,
        Self::Generic,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Switch => "switch",
            Self::Slider => "slider",
            Self::Segmented => "segmented",
            Self::Rollershutter => "rollershutter",
            Self::Setpoint => "setpoint",
            Self::Frame => "frame",
            Self::Image => "image",
            Self::Chart => "chart",
            Self::Mapview => "mapview",
            Self::Colorpicker => "colorpicker",
            Self::Generic => "generic",
        }
    }

    /// Resolves the row kind from the server's widget type. A `Switch` bound to
    /// a rollershutter item becomes a rollershutter, a `Switch` with mappings
    /// becomes a segmented control. Unknown types resolve to `Generic`.
    pub fn derive(widget_type: &str, item: Option<&Item>, has_mappings: bool) -> Self {
        match widget_type {
            "Frame" => Self::Frame,
            "Switch" => {
                if item.is_some_and(|item| item.is_of_type_or_group_type(ItemType::Rollershutter)) {
                    Self::Rollershutter
                } else if has_mappings {
                    Self::Segmented
                } else {
                    Self::Switch
                }
            }
            "Selection" => Self::Segmented,
            "Slider" => Self::Slider,
            "Setpoint" => Self::Setpoint,
            "Image" => Self::Image,
            "Chart" => Self::Chart,
            "Mapview" => Self::Mapview,
            "Colorpicker" => Self::Colorpicker,
            other => {
                tracing::debug!(widget_type = other, "rendering unrecognised widget type as generic");
                Self::Generic
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ItemType {
    #[default]
    None,
    Switch,
    Rollershutter,
    Dimmer,
    Number,
    Color,
    Contact,
    DateTime,
    Group,
    Image,
    Location,
    Player,
    String,
    Call,
}

impl ItemType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Switch => "Switch",
            Self::Rollershutter => "Rollershutter",
            Self::Dimmer => "Dimmer",
            Self::Number => "Number",
            Self::Color => "Color",
            Self::Contact => "Contact",
            Self::DateTime => "DateTime",
            Self::Group => "Group",
            Self::Image => "Image",
            Self::Location => "Location",
            Self::Player => "Player",
            Self::String => "String",
            Self::Call => "Call",
        }
    }

    /// Dimensioned types such as `Number:Temperature` collapse to their base
    /// type. Anything unknown is `None`.
    pub fn parse(value: &str) -> Self {
        let base = value.split(':').next().unwrap_or_default();
        match base {
            "Switch" => Self::Switch,
            "Rollershutter" => Self::Rollershutter,
            "Dimmer" => Self::Dimmer,
            "Number" => Self::Number,
            "Color" => Self::Color,
            "Contact" => Self::Contact,
            "DateTime" => Self::DateTime,
            "Group" => Self::Group,
            "Image" => Self::Image,
            "Location" => Self::Location,
            "Player" => Self::Player,
            "String" => Self::String,
            "Call" => Self::Call,
            _ => Self::None,
        }
    }
}

impl Serialize for ItemType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ItemType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub name: ItemName,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    #[serde(default)]
    pub group_type: Option<ItemType>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

impl Item {
    pub fn new(name: impl Into<ItemName>, item_type: ItemType, state: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            item_type,
            group_type: None,
            state: state.into(),
            label: None,
            link: None,
        }
    }

    pub fn is_of_type_or_group_type(&self, item_type: ItemType) -> bool {
        self.item_type == item_type || self.group_type == Some(item_type)
    }

    /// The state, or `None` when the server reports it as `NULL`/`UNDEF`.
    pub fn state_value(&self) -> Option<&str> {
        let state = self.state.trim();
        if state.is_empty() || UNSET_STATES.contains(&state) {
            None
        } else {
            Some(state)
        }
    }

    pub fn embedded_image(&self) -> Option<EmbeddedImage> {
        EmbeddedImage::parse(self.state_value()?)
    }

    pub fn location(&self) -> Option<Coordinates> {
        let mut parts = self.state_value()?.split(',').map(str::trim);
        let latitude = parts.next()?.parse().ok()?;
        let longitude = parts.next()?.parse().ok()?;
        Some(Coordinates {
            latitude,
            longitude,
        })
    }

    pub fn hsb(&self) -> Option<Hsb> {
        let parts = self
            .state_value()?
            .split(',')
            .map(|part| part.trim().parse::<f64>().ok())
            .collect::<Option<Vec<f64>>>()?;
        let [hue, saturation, brightness] = parts.as_slice() else {
            return None;
        };
        Some(Hsb {
            hue: *hue,
            saturation: *saturation,
            brightness: *brightness,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub media_type: String,
    pub payload_bytes: usize,
}

impl EmbeddedImage {
    /// Parses a `data:<media type>;base64,<payload>` URI.
    pub fn parse(value: &str) -> Option<Self> {
        let rest = value.strip_prefix("data:")?;
        let (header, payload) = rest.split_once(',')?;
        let media_type = header.strip_suffix(";base64")?;
        if media_type.is_empty() {
            return None;
        }
        let payload = payload.trim();
        let padding = payload.chars().rev().take_while(|ch| *ch == '=').count();
        Some(Self {
            media_type: media_type.to_owned(),
            payload_bytes: (payload.len() / 4 * 3).saturating_sub(padding),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsb {
    pub hue: f64,
    pub saturation: f64,
    pub brightness: f64,
}

impl Hsb {
    pub fn to_rgb(self) -> (u8, u8, u8) {
        let hue = self.hue.rem_euclid(360.0) / 60.0;
        let saturation = (self.saturation / 100.0).clamp(0.0, 1.0);
        let value = (self.brightness / 100.0).clamp(0.0, 1.0);

        let chroma = value * saturation;
        let x = chroma * (1.0 - (hue % 2.0 - 1.0).abs());
        let (r, g, b) = match hue as u8 {
            0 => (chroma, x, 0.0),
            1 => (x, chroma, 0.0),
            2 => (0.0, chroma, x),
            3 => (0.0, x, chroma),
            4 => (x, 0.0, chroma),
            _ => (chroma, 0.0, x),
        };
        let m = value - chroma;
        let channel = |c: f64| ((c + m) * 255.0).round() as u8;
        (channel(r), channel(g), channel(b))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    pub command: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedPage {
    pub id: PageId,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    pub widget_id: WidgetId,
    #[serde(rename = "type")]
    pub widget_type: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub item: Option<Item>,
    #[serde(default)]
    pub mappings: Vec<Mapping>,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub legend: Option<bool>,
    #[serde(default)]
    pub force_as_item: Option<bool>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub step: Option<f64>,
    #[serde(default)]
    pub linked_page: Option<LinkedPage>,
    #[serde(default)]
    pub widgets: Vec<Widget>,
}

impl Widget {
    pub fn new(widget_id: impl Into<WidgetId>, widget_type: &str, label: &str) -> Self {
        Self {
            widget_id: widget_id.into(),
            widget_type: widget_type.to_owned(),
            label: label.to_owned(),
            icon: None,
            item: None,
            mappings: Vec::new(),
            period: None,
            service: None,
            legend: None,
            force_as_item: None,
            url: None,
            min_value: None,
            max_value: None,
            step: None,
            linked_page: None,
            widgets: Vec::new(),
        }
    }

    pub fn kind(&self) -> WidgetKind {
        WidgetKind::derive(
            &self.widget_type,
            self.item.as_ref(),
            !self.mappings.is_empty(),
        )
    }

    /// Label without the `[formatted value]` suffix openHAB appends.
    pub fn label_text(&self) -> &str {
        match self.split_label() {
            Some((text, _)) => text,
            None => self.label.trim(),
        }
    }

    /// The formatted value inside the label brackets, if present.
    pub fn label_value(&self) -> Option<&str> {
        self.split_label().map(|(_, value)| value)
    }

    fn split_label(&self) -> Option<(&str, &str)> {
        let trimmed = self.label.trim();
        let body = trimmed.strip_suffix(']')?;
        let open = body.rfind('[')?;
        Some((body[..open].trim(), body[open + 1..].trim()))
    }

    /// Value shown next to the label: the label's formatted value, falling
    /// back to the raw item state.
    pub fn display_value(&self) -> Option<&str> {
        self.label_value()
            .filter(|value| !value.is_empty())
            .or_else(|| self.item.as_ref().and_then(Item::state_value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub leaf: bool,
    #[serde(default)]
    pub widgets: Vec<Widget>,
}

impl Page {
    /// Frames are followed by their children so the page reads as one list.
    pub fn flattened_widgets(&self) -> Vec<Widget> {
        let mut out = Vec::new();
        flatten_into(&self.widgets, &mut out);
        out
    }
}

fn flatten_into(widgets: &[Widget], out: &mut Vec<Widget>) {
    for widget in widgets {
        let children = widget.widgets.clone();
        let mut flat = widget.clone();
        flat.widgets.clear();
        out.push(flat);
        flatten_into(&children, out);
    }
}
