// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use habwatch_app::{RowView, Widget, format_number, parse_quantity, slider_bounds};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

const SLIDER_CELLS: usize = 10;
const SELECTED_MARK: &str = "▸ ";
const UNSELECTED_MARK: &str = "  ";

/// Plain-text lines for one row. The first line always carries the label.
pub(crate) fn row_text(widget: &Widget, row: &RowView) -> Vec<String> {
    let value = widget.display_value();
    match row {
        RowView::Frame => {
            let label = widget.label_text();
            if label.is_empty() {
                vec!["──────".to_owned()]
            } else {
                vec![format!("── {label} ──")]
            }
        }
        RowView::Switch => {
            let state = widget.item.as_ref().and_then(|item| item.state_value());
            let toggle = match state {
                Some("ON") => "[ ON ]",
                Some("OFF") => "[ OFF ]",
                _ => "[ -- ]",
            };
            vec![labelled(widget, toggle)]
        }
        RowView::Slider => vec![labelled(widget, &slider_bar(widget))],
        RowView::Segmented => {
            let state = widget.item.as_ref().and_then(|item| item.state_value());
            let segments = widget
                .mappings
                .iter()
                .map(|mapping| {
                    if Some(mapping.command.as_str()) == state {
                        format!("[{}]", mapping.label)
                    } else {
                        mapping.label.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join(" | ");
            let segments = if segments.is_empty() {
                value.unwrap_or("-").to_owned()
            } else {
                format!("‹ {segments} ›")
            };
            vec![labelled(widget, &segments)]
        }
        RowView::Rollershutter => vec![
            with_icon(widget, labelled(widget, value.unwrap_or(""))),
            "    [▲ u]    [■ s]    [▼ d]".to_owned(),
        ],
        RowView::Setpoint => vec![labelled(
            widget,
            &format!("− {} +", value.unwrap_or("-")),
        )],
        RowView::ImageRaw => {
            let detail = match widget.item.as_ref().and_then(|item| item.embedded_image()) {
                Some(image) => format!(
                    "[{}, {} embedded]",
                    image.media_type,
                    format_size(image.payload_bytes)
                ),
                None => "[embedded image unavailable]".to_owned(),
            };
            vec![labelled(widget, &detail)]
        }
        RowView::Image { url } => {
            let label = if widget.label_text().is_empty() {
                "image"
            } else {
                widget.label_text()
            };
            let source = match url {
                Some(url) => format!("    ⇗ {url}"),
                None => "    (no image source)".to_owned(),
            };
            vec![label.to_owned(), source]
        }
        RowView::Map => {
            let location = match widget.item.as_ref().and_then(|item| item.location()) {
                Some(coordinates) => format!(
                    "⌖ {:.4}, {:.4}",
                    coordinates.latitude, coordinates.longitude
                ),
                None => "⌖ no location".to_owned(),
            };
            vec![labelled(widget, &location)]
        }
        RowView::ColorPicker => {
            let color = match widget.item.as_ref().and_then(|item| item.hsb()) {
                Some(hsb) => format!(
                    "hsb({}, {}%, {}%)",
                    format_number(hsb.hue),
                    format_number(hsb.saturation),
                    format_number(hsb.brightness)
                ),
                None => "--".to_owned(),
            };
            vec![labelled(widget, &color)]
        }
        RowView::Generic => {
            let mut suffix = value.unwrap_or("").to_owned();
            if widget.linked_page.is_some() {
                suffix.push_str(" ›");
            }
            vec![with_icon(widget, labelled(widget, suffix.trim()))]
        }
    }
}

/// Styled lines for one row, with the selection marker and colour swatch.
pub(crate) fn row_lines(widget: &Widget, row: &RowView, selected: bool) -> Vec<Line<'static>> {
    let base = if matches!(row, RowView::Frame) {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else if selected {
        Style::default()
            .fg(Color::White)
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    };

    let swatch = match row {
        RowView::ColorPicker => widget
            .item
            .as_ref()
            .and_then(|item| item.hsb())
            .map(|hsb| hsb.to_rgb()),
        _ => None,
    };

    row_text(widget, row)
        .into_iter()
        .enumerate()
        .map(|(index, text)| {
            let mark = if selected && index == 0 {
                SELECTED_MARK
            } else {
                UNSELECTED_MARK
            };
            let mut spans = vec![Span::styled(format!("{mark}{text}"), base)];
            if index == 0
                && let Some((r, g, b)) = swatch
            {
                spans.push(Span::raw(" "));
                spans.push(Span::styled("   ", Style::default().bg(Color::Rgb(r, g, b))));
            }
            Line::from(spans)
        })
        .collect()
}

/// Prefixes the server icon name, the terminal stand-in for the icon image.
fn with_icon(widget: &Widget, text: String) -> String {
    match widget.icon.as_deref().map(str::trim) {
        Some(icon) if !icon.is_empty() => format!("[{icon}] {text}"),
        _ => text,
    }
}

fn labelled(widget: &Widget, suffix: &str) -> String {
    let label = widget.label_text();
    match (label.is_empty(), suffix.is_empty()) {
        (_, true) => label.to_owned(),
        (true, false) => suffix.to_owned(),
        (false, false) => format!("{label}  {suffix}"),
    }
}

fn slider_bar(widget: &Widget) -> String {
    let (min, max) = slider_bounds(widget);
    let state = widget.item.as_ref().and_then(|item| item.state_value());
    let current = match state {
        Some("ON") => Some(max),
        Some("OFF") => Some(min),
        Some(raw) => parse_quantity(raw).map(|(value, _)| value),
        None => None,
    };
    let Some(current) = current else {
        return format!("{} -", "─".repeat(SLIDER_CELLS));
    };

    let span = (max - min).max(f64::EPSILON);
    let ratio = ((current - min) / span).clamp(0.0, 1.0);
    let filled = (ratio * SLIDER_CELLS as f64).round() as usize;
    format!(
        "{}{} {}",
        "█".repeat(filled),
        "─".repeat(SLIDER_CELLS - filled),
        format_number(current)
    )
}

fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else {
        format!("{:.1} KiB", bytes as f64 / 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{format_size, row_lines, row_text};
    use habwatch_app::{Item, ItemType, LinkedPage, Mapping, PageId, RowView, Widget};
    use ratatui::style::Color;

    fn widget(widget_type: &str, label: &str, item: Option<Item>) -> Widget {
        let mut widget = Widget::new("w", widget_type, label);
        widget.item = item;
        widget
    }

    #[test]
    fn frame_renders_as_header() {
        let frame = widget("Frame", "Living room", None);
        assert_eq!(row_text(&frame, &RowView::Frame), vec!["── Living room ──"]);
    }

    #[test]
    fn switch_shows_toggle_state() {
        let on = widget(
            "Switch",
            "Ceiling light",
            Some(Item::new("Light", ItemType::Switch, "ON")),
        );
        assert_eq!(row_text(&on, &RowView::Switch), vec!["Ceiling light  [ ON ]"]);

        let unset = widget(
            "Switch",
            "Ceiling light",
            Some(Item::new("Light", ItemType::Switch, "NULL")),
        );
        assert_eq!(row_text(&unset, &RowView::Switch), vec!["Ceiling light  [ -- ]"]);
    }

    #[test]
    fn rollershutter_shows_three_buttons() {
        let shutter = widget(
            "Switch",
            "Blinds [40 %]",
            Some(Item::new("Blinds", ItemType::Rollershutter, "40")),
        );
        assert_eq!(
            row_text(&shutter, &RowView::Rollershutter),
            vec!["Blinds  40 %", "    [▲ u]    [■ s]    [▼ d]"]
        );
    }

    #[test]
    fn icon_name_leads_the_label_region() {
        let mut shutter = widget(
            "Switch",
            "Blinds [40 %]",
            Some(Item::new("Blinds", ItemType::Rollershutter, "40")),
        );
        shutter.icon = Some("rollershutter".to_owned());
        assert_eq!(
            row_text(&shutter, &RowView::Rollershutter)[0],
            "[rollershutter] Blinds  40 %"
        );

        let mut text = widget(
            "Text",
            "Outside [12 °C]",
            Some(Item::new("Temp", ItemType::Number, "12 °C")),
        );
        text.icon = Some("temperature".to_owned());
        assert_eq!(
            row_text(&text, &RowView::Generic),
            vec!["[temperature] Outside  12 °C"]
        );

        text.icon = Some(" ".to_owned());
        assert_eq!(row_text(&text, &RowView::Generic), vec!["Outside  12 °C"]);
    }

    #[test]
    fn slider_draws_proportional_bar() {
        let dimmer = widget(
            "Slider",
            "Dimmer [60 %]",
            Some(Item::new("Dimmer", ItemType::Dimmer, "60")),
        );
        assert_eq!(
            row_text(&dimmer, &RowView::Slider),
            vec!["Dimmer  ██████──── 60"]
        );
    }

    #[test]
    fn segmented_marks_active_mapping() {
        let mut scene = widget(
            "Switch",
            "Scene",
            Some(Item::new("Scene", ItemType::Number, "1")),
        );
        scene.mappings = vec![
            Mapping {
                command: "0".to_owned(),
                label: "Off".to_owned(),
            },
            Mapping {
                command: "1".to_owned(),
                label: "Relax".to_owned(),
            },
        ];
        assert_eq!(
            row_text(&scene, &RowView::Segmented),
            vec!["Scene  ‹ Off | [Relax] ›"]
        );
    }

    #[test]
    fn image_rows_describe_their_source() {
        let raw = widget(
            "Image",
            "Doorbell",
            Some(Item::new(
                "Snapshot",
                ItemType::Image,
                "data:image/jpeg;base64,AAAAAAAA",
            )),
        );
        assert_eq!(
            row_text(&raw, &RowView::ImageRaw),
            vec!["Doorbell  [image/jpeg, 6 B embedded]"]
        );

        let remote = widget("Image", "", None);
        assert_eq!(
            row_text(&remote, &RowView::Image { url: None }),
            vec!["image", "    (no image source)"]
        );
    }

    #[test]
    fn map_and_generic_rows_show_values() {
        let car = widget(
            "Mapview",
            "Car",
            Some(Item::new("Car", ItemType::Location, "52.52,13.405")),
        );
        assert_eq!(row_text(&car, &RowView::Map), vec!["Car  ⌖ 52.5200, 13.4050"]);

        let mut weather = widget("Text", "Weather [Cloudy]", None);
        weather.linked_page = Some(LinkedPage {
            id: PageId::new("0200"),
            title: "Weather".to_owned(),
        });
        assert_eq!(row_text(&weather, &RowView::Generic), vec!["Weather  Cloudy ›"]);

        let bare = widget("Text", "Just a label", None);
        assert_eq!(row_text(&bare, &RowView::Generic), vec!["Just a label"]);
    }

    #[test]
    fn colorpicker_line_carries_swatch() {
        let lamp = widget(
            "Colorpicker",
            "Lamp",
            Some(Item::new("Lamp", ItemType::Color, "0,100,100")),
        );
        let lines = row_lines(&lamp, &RowView::ColorPicker, true);
        assert_eq!(lines.len(), 1);
        let spans = &lines[0].spans;
        assert_eq!(spans[0].content, "▸ Lamp  hsb(0, 100%, 100%)");
        assert_eq!(spans[2].style.bg, Some(Color::Rgb(255, 0, 0)));
    }

    #[test]
    fn sizes_format_in_bytes_and_kib() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KiB");
    }
}
