// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod pinning;

pub use pinning::fingerprint;

use anyhow::{Context, Result, anyhow, bail};
use habwatch_app::{
    CertificatePolicy, ItemName, Page, PageId, Settings, UntrustedCertificate, item_url,
    rest_root_url, sitemap_page_url,
};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use std::error::Error as StdError;
use std::time::Duration;
use url::Url;

const CERTIFICATE_MARKERS: [&str; 4] = [
    "certificate",
    "UnknownIssuer",
    "NotValidForName",
    "self signed",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Blocking REST client for one openHAB sitemap.
#[derive(Debug, Clone)]
pub struct Client {
    settings: Settings,
    sitemap: String,
    timeout: Duration,
    credentials: Option<Credentials>,
    certificates: CertificatePolicy,
    strict: HttpClient,
    pinned: HttpClient,
}

impl Client {
    pub fn new(
        settings: Settings,
        sitemap: &str,
        timeout: Duration,
        certificates: CertificatePolicy,
    ) -> Result<Self> {
        let sitemap = sitemap.trim().to_owned();
        if sitemap.is_empty() {
            bail!("server.sitemap must not be empty");
        }

        let strict = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;
        let pinned = HttpClient::builder()
            .timeout(timeout)
            .use_preconfigured_tls(pinning::pinned_tls_config(certificates.clone())?)
            .build()
            .context("build HTTP client for trusted hosts")?;

        Ok(Self {
            settings,
            sitemap,
            timeout,
            credentials: None,
            certificates,
            strict,
            pinned,
        })
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn sitemap(&self) -> &str {
        &self.sitemap
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn certificates(&self) -> &CertificatePolicy {
        &self.certificates
    }

    pub fn ping(&self) -> Result<()> {
        let url = rest_root_url(self.settings.root_url())?;
        let response = self
            .get(url)
            .send()
            .map_err(|error| self.connection_error(error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        Ok(())
    }

    pub fn load_page(&self, page: &PageId) -> Result<Page> {
        let url = sitemap_page_url(self.settings.root_url(), &self.sitemap, page)?;
        tracing::debug!(%url, "loading sitemap page");
        let response = self
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .map_err(|error| self.page_load_error(error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        response
            .json::<Page>()
            .with_context(|| format!("decode page {page} of sitemap {}", self.sitemap))
    }

    pub fn send_command(&self, item: &ItemName, command: &str) -> Result<()> {
        let url = item_url(self.settings.root_url(), item)?;
        tracing::debug!(%item, command, "sending command");
        let response = self
            .authorize(self.http().post(url))
            .header(CONTENT_TYPE, "text/plain")
            .body(command.to_owned())
            .send()
            .map_err(|error| self.connection_error(error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body))
                .with_context(|| format!("send {command:?} to {item}"));
        }
        Ok(())
    }

    fn get(&self, url: Url) -> RequestBuilder {
        self.authorize(self.http().get(url))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(credentials) => {
                request.basic_auth(&credentials.username, Some(&credentials.password))
            }
            None => request,
        }
    }

    fn http(&self) -> &HttpClient {
        if self.certificates.is_trusted(self.settings.host()) {
            &self.pinned
        } else {
            &self.strict
        }
    }

    /// Like `connection_error`, but a certificate failure also leaves the
    /// host pending so the UI can ask about it. Only page loads prompt.
    fn page_load_error(&self, error: reqwest::Error) -> anyhow::Error {
        let error = self.connection_error(error);
        let Some(untrusted) = error.downcast_ref::<UntrustedCertificate>() else {
            return error;
        };
        let host = untrusted.host.clone();
        let detail = untrusted.detail.clone();
        self.observe_certificate();
        self.certificates.mark_pending(&host);
        match self.certificates.observed_fingerprint(&host) {
            Some(fingerprint) => anyhow::Error::new(UntrustedCertificate {
                host,
                detail: format!("{detail}; SHA-256 {fingerprint}"),
            }),
            None => error,
        }
    }

    /// Handshakes through the pinning client so its verifier records the
    /// fingerprint the server presents. The handshake is rejected before
    /// any request is sent unless the certificate is already pinned.
    fn observe_certificate(&self) {
        let Ok(url) = rest_root_url(self.settings.root_url()) else {
            return;
        };
        if let Err(error) = self.pinned.head(url).send() {
            tracing::debug!("certificate observation handshake: {error}");
        }
    }

    fn connection_error(&self, error: reqwest::Error) -> anyhow::Error {
        let timed_out = error.is_timeout();
        self.classify_failure(&error, timed_out)
    }

    fn classify_failure(
        &self,
        error: &(dyn StdError + 'static),
        timed_out: bool,
    ) -> anyhow::Error {
        if let Some(detail) = certificate_failure(error) {
            return anyhow::Error::new(UntrustedCertificate {
                host: self.settings.host().to_owned(),
                detail,
            });
        }
        if timed_out {
            return anyhow!(
                "{} did not answer within {:?} -- check [server].timeout",
                self.settings.root_url(),
                self.timeout
            );
        }
        anyhow!(
            "cannot reach {} -- check [server].root_url and that openHAB is running ({})",
            self.settings.root_url(),
            error
        )
    }
}

/// Walks the error chain looking for a TLS certificate verification failure.
fn certificate_failure(error: &(dyn StdError + 'static)) -> Option<String> {
    let mut source: Option<&(dyn StdError + 'static)> = Some(error);
    while let Some(current) = source {
        let message = current.to_string();
        if CERTIFICATE_MARKERS
            .iter()
            .any(|marker| message.contains(marker))
        {
            return Some(message);
        }
        source = current.source();
    }
    None
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(error) = parsed.error
        && let Some(message) = error.message
        && !message.is_empty()
    {
        return anyhow!("server error ({}): {}", status.as_u16(), message);
    }

    if status == StatusCode::UNAUTHORIZED {
        return anyhow!(
            "server error (401): authentication required -- set [server].username and password"
        );
    }

    if !body.is_empty() && body.len() < 100 && !body.contains('{') && !body.contains('<') {
        return anyhow!("server error ({}): {}", status.as_u16(), body.trim());
    }

    anyhow!("server returned {}", status.as_u16())
}
