// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use url::Url;

use crate::{
    ChartRequest, ChartTheme, ItemType, Settings, Widget, WidgetKind, resolve_widget_url,
};

/// The row selected for one widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowView {
    Switch,
    Slider,
    Segmented,
    Rollershutter,
    Setpoint,
    Frame,
    /// Image carried in the linked item's state as a data URI.
    ImageRaw,
    /// Image fetched from a URL; charts render through this row too.
    Image { url: Option<Url> },
    Map,
    ColorPicker,
    Generic,
}

pub fn row_for(widget: &Widget, settings: &Settings) -> RowView {
    match widget.kind() {
        WidgetKind::Switch => RowView::Switch,
        WidgetKind::Slider => RowView::Slider,
        WidgetKind::Segmented => RowView::Segmented,
        WidgetKind::Rollershutter => RowView::Rollershutter,
        WidgetKind::Setpoint => RowView::Setpoint,
        WidgetKind::Frame => RowView::Frame,
        WidgetKind::Image => {
            if widget.item.is_some() {
                RowView::ImageRaw
            } else {
                RowView::Image {
                    url: widget
                        .url
                        .as_deref()
                        .and_then(|raw| resolve_widget_url(settings.root_url(), raw)),
                }
            }
        }
        WidgetKind::Chart => {
            let url = match chart_request(widget).url(settings.root_url()) {
                Ok(url) => Some(url),
                Err(error) => {
                    tracing::warn!(widget = %widget.widget_id, "chart url: {error:#}");
                    None
                }
            };
            RowView::Image { url }
        }
        WidgetKind::Mapview => RowView::Map,
        WidgetKind::Colorpicker => RowView::ColorPicker,
        WidgetKind::Generic => RowView::Generic,
    }
}

pub fn rows_for(widgets: &[Widget], settings: &Settings) -> Vec<RowView> {
    widgets
        .iter()
        .map(|widget| row_for(widget, settings))
        .collect()
}

pub fn chart_request(widget: &Widget) -> ChartRequest {
    ChartRequest {
        period: widget.period.clone(),
        item_type: widget
            .item
            .as_ref()
            .map_or(ItemType::None, |item| item.item_type),
        service: widget.service.clone(),
        name: widget.item.as_ref().map(|item| item.name.clone()),
        legend: widget.legend,
        theme: ChartTheme::Dark,
        force_as_item: widget.force_as_item.unwrap_or(false),
    }
}
