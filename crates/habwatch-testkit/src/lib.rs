// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use habwatch_app::{
    Item, ItemName, ItemType, LinkedPage, Mapping, Page, PageId, Widget, format_number,
    parse_quantity,
};
use std::collections::BTreeMap;

pub const DEMO_SITEMAP: &str = "demo";
pub const WEATHER_PAGE: &str = "0200";

const SNAPSHOT_PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// In-memory sitemap that behaves like a small openHAB server: pages can be
/// fetched and commands update every widget bound to the commanded item.
#[derive(Debug, Clone)]
pub struct FixtureSitemap {
    name: String,
    pages: BTreeMap<PageId, Page>,
}

impl FixtureSitemap {
    pub fn demo() -> Self {
        let mut pages = BTreeMap::new();
        pages.insert(PageId::new(DEMO_SITEMAP), home_page());
        pages.insert(PageId::new(WEATHER_PAGE), weather_page());
        Self {
            name: DEMO_SITEMAP.to_owned(),
            pages,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn page(&self, id: &PageId) -> Option<&Page> {
        self.pages.get(id)
    }

    pub fn item_state(&self, name: &str) -> Option<String> {
        self.pages
            .values()
            .flat_map(Page::flattened_widgets)
            .filter_map(|widget| widget.item)
            .find(|item| item.name.as_str() == name)
            .map(|item| item.state)
    }

    pub fn apply_command(&mut self, item: &ItemName, command: &str) -> Result<()> {
        let mut matched = false;
        for page in self.pages.values_mut() {
            matched |= apply_to_widgets(&mut page.widgets, item, command);
        }
        if !matched {
            bail!("item {item} is not part of sitemap {}", self.name);
        }
        Ok(())
    }
}

fn apply_to_widgets(widgets: &mut [Widget], name: &ItemName, command: &str) -> bool {
    let mut matched = false;
    for widget in widgets {
        if let Some(item) = widget.item.as_mut()
            && &item.name == name
        {
            item.state = next_state(item, command);
            widget.label = relabel(&widget.label, &item.state);
            matched = true;
        }
        matched |= apply_to_widgets(&mut widget.widgets, name, command);
    }
    matched
}

fn next_state(item: &Item, command: &str) -> String {
    match (item.item_type, command) {
        (ItemType::Rollershutter, "UP") => "0".to_owned(),
        (ItemType::Rollershutter, "DOWN") => "100".to_owned(),
        (ItemType::Rollershutter, "STOP") => item.state.clone(),
        (ItemType::Color, "ON" | "OFF" | "INCREASE" | "DECREASE") => {
            let hsb = item.hsb();
            let (hue, saturation, brightness) = hsb.map_or((0.0, 0.0, 0.0), |hsb| {
                (hsb.hue, hsb.saturation, hsb.brightness)
            });
            let brightness = match command {
                "ON" => 100.0,
                "OFF" => 0.0,
                "INCREASE" => (brightness + 10.0).min(100.0),
                _ => (brightness - 10.0).max(0.0),
            };
            format!(
                "{},{},{}",
                format_number(hue),
                format_number(saturation),
                format_number(brightness)
            )
        }
        _ => command.to_owned(),
    }
}

/// Rewrites the bracketed value of a label after a state change, keeping the
/// unit the label showed.
fn relabel(label: &str, state: &str) -> String {
    let Some(open) = label.rfind('[') else {
        return label.to_owned();
    };
    let head = label[..open].trim_end();
    let value = match parse_quantity(state) {
        Some((value, unit)) => {
            let number = format_number(value);
            let shown_unit = label[open..]
                .trim_end_matches(']')
                .split_once(' ')
                .map(|(_, unit)| unit.to_owned());
            match (unit, shown_unit) {
                (Some(unit), _) => format!("{number} {unit}"),
                (None, Some(shown)) => format!("{number} {shown}"),
                (None, None) => number,
            }
        }
        None => state.to_owned(),
    };
    format!("{head} [{value}]")
}

pub fn page_json(page: &Page) -> Result<String> {
    serde_json::to_string(page).with_context(|| format!("encode page {}", page.id))
}

pub fn item_widget(id: &str, widget_type: &str, label: &str, item: Item) -> Widget {
    let mut widget = Widget::new(id, widget_type, label);
    widget.item = Some(item);
    widget
}

pub fn frame(id: &str, label: &str, children: Vec<Widget>) -> Widget {
    let mut widget = Widget::new(id, "Frame", label);
    widget.widgets = children;
    widget
}

fn home_page() -> Page {
    let mut dimmer = item_widget(
        "0001",
        "Slider",
        "Dimmer [60 %]",
        Item::new("Living_Dimmer", ItemType::Dimmer, "60"),
    );
    dimmer.step = Some(10.0);

    let mut scene = item_widget(
        "0002",
        "Switch",
        "Scene",
        Item::new("Living_Scene", ItemType::Number, "1"),
    );
    scene.mappings = [("0", "Off"), ("1", "Relax"), ("2", "Movie")]
        .into_iter()
        .map(|(command, label)| Mapping {
            command: command.to_owned(),
            label: label.to_owned(),
        })
        .collect();

    let mut setpoint = item_widget(
        "0004",
        "Setpoint",
        "Target temperature [21.5 °C]",
        Item::new("Living_Target", ItemType::Number, "21.5 °C"),
    );
    setpoint.min_value = Some(15.0);
    setpoint.max_value = Some(28.0);
    setpoint.step = Some(0.5);

    let living = frame(
        "00",
        "Living room",
        vec![
            item_widget(
                "0000",
                "Switch",
                "Ceiling light",
                Item::new("Living_Light", ItemType::Switch, "ON"),
            ),
            dimmer,
            scene,
            item_widget(
                "0003",
                "Switch",
                "Blinds [40 %]",
                Item::new("Living_Blinds", ItemType::Rollershutter, "40"),
            ),
            setpoint,
            item_widget(
                "0005",
                "Colorpicker",
                "Lamp color",
                Item::new("Living_Color", ItemType::Color, "30,80,70"),
            ),
        ],
    );

    let mut webcam = Widget::new("0100", "Image", "Driveway");
    webcam.url = Some("/static/webcam.jpg".to_owned());

    let mut chart = item_widget(
        "0102",
        "Chart",
        "Power usage",
        Item::new("Power_Usage", ItemType::Number, "412 W"),
    );
    chart.period = Some("D".to_owned());
    chart.service = Some("rrd4j".to_owned());
    chart.legend = Some(true);

    let mut weather = item_widget(
        "0104",
        "Text",
        "Weather [Cloudy]",
        Item::new("Weather_Condition", ItemType::String, "Cloudy"),
    );
    weather.linked_page = Some(LinkedPage {
        id: PageId::new(WEATHER_PAGE),
        title: "Weather".to_owned(),
    });

    let outside = frame(
        "01",
        "Outside",
        vec![
            webcam,
            item_widget(
                "0101",
                "Image",
                "Doorbell snapshot",
                Item::new("Doorbell_Snapshot", ItemType::Image, SNAPSHOT_PNG),
            ),
            chart,
            item_widget(
                "0103",
                "Mapview",
                "Car",
                Item::new("Car_Location", ItemType::Location, "52.5200,13.4050,34"),
            ),
            weather,
        ],
    );

    Page {
        id: PageId::new(DEMO_SITEMAP),
        title: "Demo House".to_owned(),
        leaf: false,
        widgets: vec![living, outside],
    }
}

fn weather_page() -> Page {
    Page {
        id: PageId::new(WEATHER_PAGE),
        title: "Weather".to_owned(),
        leaf: true,
        widgets: vec![
            item_widget(
                "020000",
                "Text",
                "Temperature outside [12.3 °C]",
                Item::new("Outside_Temperature", ItemType::Number, "12.3 °C"),
            ),
            item_widget(
                "020001",
                "Text",
                "Wind [7 km/h]",
                Item::new("Outside_Wind", ItemType::Number, "7 km/h"),
            ),
            Widget::new("020002", "Webview", "Forecast"),
        ],
    }
}
