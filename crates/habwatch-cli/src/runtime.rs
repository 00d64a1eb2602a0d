// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use habwatch_app::{CommandRequest, Page, PageId, Settings};
use habwatch_client::Client;
use habwatch_testkit::FixtureSitemap;
use habwatch_tui::{AppRuntime, InternalEvent};
use std::sync::mpsc::Sender;
use std::thread;

const DEMO_ROOT_URL: &str = "http://localhost:8080";

/// Runtime backed by a live openHAB server.
pub struct ClientRuntime {
    client: Client,
}

impl ClientRuntime {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl AppRuntime for ClientRuntime {
    fn settings(&self) -> &Settings {
        self.client.settings()
    }

    fn load_page(&mut self, page: &PageId) -> Result<Page> {
        self.client.load_page(page)
    }

    fn send_command(&mut self, request: &CommandRequest) -> Result<()> {
        self.client.send_command(&request.item, &request.command)
    }

    fn spawn_command(&mut self, request: CommandRequest, tx: Sender<InternalEvent>) -> Result<()> {
        let client = self.client.clone();
        thread::Builder::new()
            .name("habwatch-command".to_owned())
            .spawn(move || {
                let event = match client.send_command(&request.item, &request.command) {
                    Ok(()) => InternalEvent::CommandSent { request },
                    Err(error) => InternalEvent::CommandFailed {
                        request,
                        error: format!("{error:#}"),
                    },
                };
                let _ = tx.send(event);
            })
            .context("spawn command thread")?;
        Ok(())
    }
}

/// Runtime that serves the bundled demo sitemap from memory.
pub struct DemoRuntime {
    settings: Settings,
    sitemap: FixtureSitemap,
}

impl DemoRuntime {
    pub fn new() -> Result<Self> {
        Ok(Self {
            settings: Settings::new(DEMO_ROOT_URL)?,
            sitemap: FixtureSitemap::demo(),
        })
    }

    pub fn sitemap_name(&self) -> &str {
        self.sitemap.name()
    }
}

impl AppRuntime for DemoRuntime {
    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn load_page(&mut self, page: &PageId) -> Result<Page> {
        self.sitemap
            .page(page)
            .cloned()
            .ok_or_else(|| anyhow!("page {page} is not part of the demo sitemap"))
    }

    fn send_command(&mut self, request: &CommandRequest) -> Result<()> {
        tracing::debug!(item = %request.item, command = %request.command, "demo command");
        self.sitemap.apply_command(&request.item, &request.command)
    }
}

#[cfg(test)]
mod tests {
    use super::{ClientRuntime, DemoRuntime};
    use anyhow::Result;
    use habwatch_app::{CertificatePolicy, CommandRequest, ItemName, PageId, Settings};
    use habwatch_client::Client;
    use habwatch_testkit::{DEMO_SITEMAP, WEATHER_PAGE};
    use habwatch_tui::{AppRuntime, InternalEvent};
    use std::sync::mpsc;
    use std::time::Duration;

    fn request(item: &str, command: &str) -> CommandRequest {
        CommandRequest {
            item: ItemName::new(item),
            command: command.to_owned(),
        }
    }

    #[test]
    fn demo_runtime_serves_fixture_pages() -> Result<()> {
        let mut runtime = DemoRuntime::new()?;
        assert_eq!(runtime.sitemap_name(), DEMO_SITEMAP);
        let home = runtime.load_page(&PageId::new(DEMO_SITEMAP))?;
        assert_eq!(home.title, "Demo House");
        let weather = runtime.load_page(&PageId::new(WEATHER_PAGE))?;
        assert!(weather.leaf);

        let error = runtime
            .load_page(&PageId::new("9999"))
            .expect_err("unknown page should fail");
        assert!(error.to_string().contains("9999"));
        Ok(())
    }

    #[test]
    fn demo_commands_change_the_next_page_load() -> Result<()> {
        let mut runtime = DemoRuntime::new()?;
        let (tx, rx) = mpsc::channel();
        runtime.spawn_command(request("Living_Blinds", "DOWN"), tx)?;
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1))?,
            InternalEvent::CommandSent {
                request: request("Living_Blinds", "DOWN"),
            }
        );

        let home = runtime.load_page(&PageId::new(DEMO_SITEMAP))?;
        let blinds = home
            .flattened_widgets()
            .into_iter()
            .filter_map(|widget| widget.item)
            .find(|item| item.name == ItemName::new("Living_Blinds"))
            .map(|item| item.state);
        assert_eq!(blinds.as_deref(), Some("100"));
        Ok(())
    }

    #[test]
    fn demo_command_for_unknown_item_reports_failure() -> Result<()> {
        let mut runtime = DemoRuntime::new()?;
        let (tx, rx) = mpsc::channel();
        runtime.spawn_command(request("Garage_Door", "ON"), tx)?;
        match rx.recv_timeout(Duration::from_secs(1))? {
            InternalEvent::CommandFailed { error, .. } => {
                assert!(error.contains("not part of sitemap demo"));
            }
            other => panic!("unexpected event {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn client_runtime_reports_failed_send_from_worker_thread() -> Result<()> {
        let client = Client::new(
            Settings::new("http://127.0.0.1:1")?,
            DEMO_SITEMAP,
            Duration::from_millis(200),
            CertificatePolicy::new(),
        )?;
        let mut runtime = ClientRuntime::new(client);
        assert_eq!(runtime.settings().root_url().as_str(), "http://127.0.0.1:1/");

        let (tx, rx) = mpsc::channel();
        runtime.spawn_command(request("Living_Light", "ON"), tx)?;
        match rx.recv_timeout(Duration::from_secs(5))? {
            InternalEvent::CommandFailed { request, error } => {
                assert_eq!(request.command, "ON");
                assert!(error.contains("[server].root_url"), "got {error}");
            }
            other => panic!("unexpected event {other:?}"),
        }
        Ok(())
    }
}
