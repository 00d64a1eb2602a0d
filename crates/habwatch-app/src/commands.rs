// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{ItemName, Widget, WidgetKind};

pub const COMMAND_UP: &str = "UP";
pub const COMMAND_STOP: &str = "STOP";
pub const COMMAND_DOWN: &str = "DOWN";
pub const COMMAND_ON: &str = "ON";
pub const COMMAND_OFF: &str = "OFF";
pub const COMMAND_INCREASE: &str = "INCREASE";
pub const COMMAND_DECREASE: &str = "DECREASE";

const SLIDER_MIN: f64 = 0.0;
const SLIDER_MAX: f64 = 100.0;
const DEFAULT_STEP: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub item: ItemName,
    pub command: String,
}

/// Outbound command channel. Sends are fire-and-forget.
pub trait CommandSink {
    fn send_command(&mut self, request: CommandRequest);
}

/// A gesture on a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
    Activate,
    Increase,
    Decrease,
    Up,
    Stop,
    Down,
}

impl Widget {
    /// Sends `command` to the linked item. Widgets without an item have
    /// nothing to command and send nothing.
    pub fn send_command(&self, sink: &mut dyn CommandSink, command: &str) -> bool {
        let Some(item) = &self.item else {
            tracing::debug!(widget = %self.widget_id, command, "widget has no item; command dropped");
            return false;
        };
        sink.send_command(CommandRequest {
            item: item.name.clone(),
            command: command.to_owned(),
        });
        true
    }
}

/// Translates a gesture on `widget`'s row into a command string, or `None`
/// when the row has no affordance for that gesture.
pub fn command_for(widget: &Widget, action: RowAction) -> Option<String> {
    let item = widget.item.as_ref()?;
    let state = item.state_value();

    match (widget.kind(), action) {
        (WidgetKind::Rollershutter, RowAction::Up) => Some(COMMAND_UP.to_owned()),
        (WidgetKind::Rollershutter, RowAction::Stop) => Some(COMMAND_STOP.to_owned()),
        (WidgetKind::Rollershutter, RowAction::Down) => Some(COMMAND_DOWN.to_owned()),
        (WidgetKind::Switch, RowAction::Activate) => {
            let next = if state == Some(COMMAND_ON) {
                COMMAND_OFF
            } else {
                COMMAND_ON
            };
            Some(next.to_owned())
        }
        (WidgetKind::Slider, RowAction::Increase) => Some(step_slider(widget, state, 1.0)),
        (WidgetKind::Slider, RowAction::Decrease) => Some(step_slider(widget, state, -1.0)),
        (WidgetKind::Setpoint, RowAction::Increase) => step_setpoint(widget, state, 1.0),
        (WidgetKind::Setpoint, RowAction::Decrease) => step_setpoint(widget, state, -1.0),
        (WidgetKind::Segmented, RowAction::Increase | RowAction::Activate) => {
            cycle_mapping(widget, state, 1)
        }
        (WidgetKind::Segmented, RowAction::Decrease) => cycle_mapping(widget, state, -1),
        (WidgetKind::Colorpicker, RowAction::Activate) => {
            let lit = item.hsb().is_some_and(|hsb| hsb.brightness > 0.0);
            Some(if lit { COMMAND_OFF } else { COMMAND_ON }.to_owned())
        }
        (WidgetKind::Colorpicker, RowAction::Increase) => Some(COMMAND_INCREASE.to_owned()),
        (WidgetKind::Colorpicker, RowAction::Decrease) => Some(COMMAND_DECREASE.to_owned()),
        _ => None,
    }
}

/// Resolves the gesture and, when it maps to a command, sends it.
pub fn press(widget: &Widget, action: RowAction, sink: &mut dyn CommandSink) -> bool {
    match command_for(widget, action) {
        Some(command) => widget.send_command(sink, &command),
        None => false,
    }
}

/// Splits a state such as `21.5 °C` into its number and unit.
pub fn parse_quantity(state: &str) -> Option<(f64, Option<&str>)> {
    let state = state.trim();
    let (number, unit) = match state.split_once(' ') {
        Some((number, unit)) => (number, Some(unit.trim()).filter(|unit| !unit.is_empty())),
        None => (state, None),
    };
    let value = number.parse::<f64>().ok()?;
    Some((value, unit))
}

pub fn format_number(value: f64) -> String {
    if (value - value.round()).abs() < 1e-9 {
        return format!("{}", value.round() as i64);
    }
    let fixed = format!("{value:.2}");
    fixed.trim_end_matches('0').trim_end_matches('.').to_owned()
}

/// Slider range with `min <= max`, whatever order the server sent.
pub fn slider_bounds(widget: &Widget) -> (f64, f64) {
    let min = widget.min_value.unwrap_or(SLIDER_MIN);
    let max = widget.max_value.unwrap_or(SLIDER_MAX);
    if min <= max { (min, max) } else { (max, min) }
}

fn step_slider(widget: &Widget, state: Option<&str>, direction: f64) -> String {
    let (min, max) = slider_bounds(widget);
    let current = match state {
        Some(COMMAND_ON) => max,
        Some(COMMAND_OFF) | None => min,
        Some(raw) => parse_quantity(raw).map_or(min, |(value, _)| value),
    };
    let step = widget.step.filter(|step| *step > 0.0).unwrap_or(DEFAULT_STEP);
    format_number((current + direction * step).clamp(min, max))
}

fn step_setpoint(widget: &Widget, state: Option<&str>, direction: f64) -> Option<String> {
    let (current, unit) = state.and_then(parse_quantity).unwrap_or((0.0, None));
    let step = widget.step.filter(|step| *step > 0.0).unwrap_or(DEFAULT_STEP);
    let mut next = current + direction * step;
    if let Some(min) = widget.min_value {
        next = next.max(min);
    }
    if let Some(max) = widget.max_value {
        next = next.min(max);
    }
    let number = format_number(next);
    Some(match unit {
        Some(unit) => format!("{number} {unit}"),
        None => number,
    })
}

fn cycle_mapping(widget: &Widget, state: Option<&str>, delta: isize) -> Option<String> {
    let mappings = &widget.mappings;
    if mappings.is_empty() {
        return None;
    }
    let len = mappings.len() as isize;
    let next = match mappings
        .iter()
        .position(|mapping| Some(mapping.command.as_str()) == state)
    {
        Some(current) => (current as isize + delta).rem_euclid(len),
        None if delta > 0 => 0,
        None => len - 1,
    };
    Some(mappings[next as usize].command.clone())
}
