// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result, anyhow};
use config::Config;
use habwatch_app::{AppState, CertificatePolicy};
use habwatch_client::Client;
use runtime::{ClientRuntime, DemoRuntime};
use std::env;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `habwatch --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;
    let log_path = init_logging(&config)?;
    tracing::info!(log = %log_path.display(), config = %options.config_path.display(), "starting");

    if options.demo {
        let mut runtime = DemoRuntime::new()?;
        if options.check_only {
            return Ok(());
        }
        let mut state = AppState::new(runtime.sitemap_name());
        return habwatch_tui::run_app(&mut state, &mut runtime, CertificatePolicy::new());
    }

    let sitemap = options
        .sitemap
        .clone()
        .unwrap_or_else(|| config.sitemap().to_owned());
    let certificates = CertificatePolicy::with_trust_file(&config.trust_file_path()?)?;
    let client = Client::new(
        config.settings()?,
        &sitemap,
        config.timeout()?,
        certificates.clone(),
    )
    .with_context(|| {
        format!(
            "invalid [server] config in {}; fix root_url/sitemap/timeout values",
            options.config_path.display()
        )
    })?
    .with_credentials(config.credentials());

    if options.check_only {
        client.ping()?;
        println!("{} is reachable", client.settings().root_url());
        return Ok(());
    }

    let mut state = AppState::new(&sitemap);
    if let Some(title) = config.title() {
        state.title = title.to_owned();
    }
    let mut runtime = ClientRuntime::new(client);
    habwatch_tui::run_app(&mut state, &mut runtime, certificates)
}

/// Logs go to a file because the terminal belongs to the UI.
fn init_logging(config: &Config) -> Result<PathBuf> {
    let path = config.log_path()?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|error| anyhow!("initialize logging: {error}"))?;
    Ok(path)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    sitemap: Option<String>,
    print_config_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        sitemap: None,
        print_config_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--sitemap" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--sitemap requires a sitemap name"))?;
                let name = value.as_ref().trim();
                if name.is_empty() {
                    return Err(anyhow!("--sitemap requires a sitemap name"));
                }
                options.sitemap = Some(name.to_owned());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("habwatch: terminal client for openHAB sitemaps");
    println!("  --config <path>          Use a specific config path");
    println!("  --sitemap <name>         Open this sitemap instead of [server].sitemap");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a config template");
    println!("  --demo                   Browse a built-in demo sitemap, no server needed");
    println!("  --check                  Validate config and check the server is reachable");
    println!("  --help                   Show this help");
}
