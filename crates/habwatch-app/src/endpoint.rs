// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use url::Url;

use crate::{ItemName, ItemType, PageId};

const DEFAULT_CHART_PERIOD: &str = "D";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartTheme {
    Light,
    Dark,
}

impl ChartTheme {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "bright",
            Self::Dark => "dark",
        }
    }
}

/// Parameters for the server's `/chart` image servlet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartRequest {
    pub period: Option<String>,
    pub item_type: ItemType,
    pub service: Option<String>,
    pub name: Option<ItemName>,
    pub legend: Option<bool>,
    pub theme: ChartTheme,
    pub force_as_item: bool,
}

impl ChartRequest {
    pub fn url(&self, root: &Url) -> Result<Url> {
        let mut url = with_path(root, &["chart"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair(
                "period",
                self.period
                    .as_deref()
                    .filter(|period| !period.is_empty())
                    .unwrap_or(DEFAULT_CHART_PERIOD),
            );
            if let Some(name) = &self.name {
                let key = if self.item_type == ItemType::Group && !self.force_as_item {
                    "groups"
                } else {
                    "items"
                };
                query.append_pair(key, name.as_str());
            }
            if let Some(service) = self.service.as_deref().filter(|s| !s.is_empty()) {
                query.append_pair("service", service);
            }
            if let Some(legend) = self.legend {
                query.append_pair("legend", if legend { "true" } else { "false" });
            }
            query.append_pair("theme", self.theme.as_str());
            if self.force_as_item {
                query.append_pair("forceasitem", "true");
            }
        }
        Ok(url)
    }
}

pub fn sitemap_page_url(root: &Url, sitemap: &str, page: &PageId) -> Result<Url> {
    with_path(root, &["rest", "sitemaps", sitemap, page.as_str()])
}

pub fn item_url(root: &Url, item: &ItemName) -> Result<Url> {
    with_path(root, &["rest", "items", item.as_str()])
}

pub fn rest_root_url(root: &Url) -> Result<Url> {
    with_path(root, &["rest", ""])
}

/// Resolves a widget-supplied URL, which may be absolute or server-relative.
pub fn resolve_widget_url(root: &Url, raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let mut base = root.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(raw).ok()
}

fn with_path(root: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = root.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|()| anyhow!("{root} cannot be used as a base URL"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
