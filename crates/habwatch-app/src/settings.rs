// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use url::Url;

/// Read-only connection settings shared by every row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    root_url: Url,
}

impl Settings {
    pub fn new(root_url: &str) -> Result<Self> {
        let trimmed = root_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("server root URL must not be empty");
        }
        let root_url =
            Url::parse(trimmed).with_context(|| format!("parse server root URL {trimmed:?}"))?;
        if root_url.cannot_be_a_base() {
            bail!("server root URL {trimmed:?} must be an http(s) URL");
        }
        if !matches!(root_url.scheme(), "http" | "https") {
            bail!(
                "server root URL {trimmed:?} uses scheme {:?}; expected http or https",
                root_url.scheme()
            );
        }
        Ok(Self { root_url })
    }

    pub fn root_url(&self) -> &Url {
        &self.root_url
    }

    pub fn host(&self) -> &str {
        self.root_url.host_str().unwrap_or_default()
    }
}
