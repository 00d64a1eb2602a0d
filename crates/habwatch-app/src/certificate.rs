// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertificateDecision {
    Deny,
    PermitOnce,
    PermitAlways,
}

impl CertificateDecision {
    pub const ALL: [Self; 3] = [Self::Deny, Self::PermitOnce, Self::PermitAlways];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deny => "deny",
            Self::PermitOnce => "permitOnce",
            Self::PermitAlways => "permitAlways",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Deny => "abort",
            Self::PermitOnce => "once",
            Self::PermitAlways => "always",
        }
    }

    pub const fn permits(self) -> bool {
        !matches!(self, Self::Deny)
    }
}

/// Raised by the HTTP adapter when a server presents a certificate that
/// fails verification and the user has not trusted the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UntrustedCertificate {
    pub host: String,
    pub detail: String,
}

impl fmt::Display for UntrustedCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "the certificate presented by {} could not be verified ({})",
            self.host, self.detail
        )
    }
}

impl std::error::Error for UntrustedCertificate {}

/// Host to certificate fingerprint.
type Pins = BTreeMap<String, String>;

#[derive(Debug, Default, Serialize, Deserialize)]
struct TrustFile {
    #[serde(default)]
    trusted_hosts: Pins,
}

#[derive(Debug, Default)]
struct PolicyState {
    pending_host: Option<String>,
    last_decision: Option<CertificateDecision>,
    observed: Pins,
    session_pins: Pins,
    persistent_pins: Pins,
    trust_file: Option<PathBuf>,
}

/// Shared holder for certificate decisions. The UI records the user's
/// answer; the HTTP adapter reports the fingerprints servers present and
/// asks which one a host is pinned to.
///
/// Trust is per certificate, not per host: permitting a host pins the
/// fingerprint last observed for it, and a different certificate from the
/// same host has to be permitted again.
#[derive(Debug, Clone, Default)]
pub struct CertificatePolicy {
    inner: Arc<Mutex<PolicyState>>,
}

impl CertificatePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads persisted pins from `path`; a missing file starts empty.
    pub fn with_trust_file(path: &Path) -> Result<Self> {
        let persistent_pins = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("read trust file {}", path.display()))?;
            let parsed: TrustFile = serde_json::from_str(&raw)
                .with_context(|| format!("parse trust file {}", path.display()))?;
            parsed.trusted_hosts
        } else {
            Pins::new()
        };

        Ok(Self {
            inner: Arc::new(Mutex::new(PolicyState {
                persistent_pins,
                trust_file: Some(path.to_owned()),
                ..PolicyState::default()
            })),
        })
    }

    pub fn mark_pending(&self, host: &str) {
        self.lock().pending_host = Some(host.to_owned());
    }

    pub fn pending_host(&self) -> Option<String> {
        self.lock().pending_host.clone()
    }

    /// Remembers the fingerprint `host` presented during its last handshake.
    pub fn observe(&self, host: &str, fingerprint: &str) {
        self.lock()
            .observed
            .insert(host.to_owned(), fingerprint.to_owned());
    }

    pub fn observed_fingerprint(&self, host: &str) -> Option<String> {
        self.lock().observed.get(host).cloned()
    }

    /// Applies `decision` to the host awaiting an answer. Permitting pins
    /// the fingerprint observed for that host.
    pub fn record(&self, decision: CertificateDecision) -> Result<()> {
        let mut state = self.lock();
        state.last_decision = Some(decision);
        let Some(host) = state.pending_host.take() else {
            return Ok(());
        };
        if !decision.permits() {
            tracing::info!(%host, "certificate rejected");
            return Ok(());
        }
        let Some(fingerprint) = state.observed.get(&host).cloned() else {
            tracing::warn!(%host, "no certificate fingerprint observed; host stays untrusted");
            return Ok(());
        };

        if decision == CertificateDecision::PermitAlways {
            tracing::info!(%host, %fingerprint, "certificate pinned permanently");
            state.persistent_pins.insert(host.clone(), fingerprint.clone());
            if let Some(path) = &state.trust_file {
                write_trust_file(path, &state.persistent_pins)?;
            }
        } else {
            tracing::info!(%host, %fingerprint, "certificate pinned for this session");
        }
        state.session_pins.insert(host, fingerprint);
        Ok(())
    }

    pub fn last_decision(&self) -> Option<CertificateDecision> {
        self.lock().last_decision
    }

    /// Fingerprint the user accepted for `host`, if any.
    pub fn pinned_fingerprint(&self, host: &str) -> Option<String> {
        let state = self.lock();
        state
            .session_pins
            .get(host)
            .or_else(|| state.persistent_pins.get(host))
            .cloned()
    }

    pub fn is_trusted(&self, host: &str) -> bool {
        self.pinned_fingerprint(host).is_some()
    }

    /// Whether `fingerprint` is the certificate pinned for `host`.
    pub fn accepts(&self, host: &str, fingerprint: &str) -> bool {
        self.pinned_fingerprint(host).as_deref() == Some(fingerprint)
    }

    fn lock(&self) -> MutexGuard<'_, PolicyState> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn write_trust_file(path: &Path, pins: &Pins) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create trust directory {}", parent.display()))?;
    }
    let body = serde_json::to_string_pretty(&TrustFile {
        trusted_hosts: pins.clone(),
    })
    .context("encode trust file")?;
    fs::write(path, body).with_context(|| format!("write trust file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::{CertificateDecision, CertificatePolicy};
    use anyhow::Result;
    use std::fs;

    const HOST: &str = "home.example";
    const FIRST: &str = "AB:CD:01";
    const SECOND: &str = "AB:CD:02";

    fn prompted(policy: &CertificatePolicy, fingerprint: &str) {
        policy.observe(HOST, fingerprint);
        policy.mark_pending(HOST);
    }

    #[test]
    fn deny_leaves_host_untrusted() -> Result<()> {
        let policy = CertificatePolicy::new();
        prompted(&policy, FIRST);
        policy.record(CertificateDecision::Deny)?;
        assert!(!policy.is_trusted(HOST));
        assert_eq!(policy.last_decision(), Some(CertificateDecision::Deny));
        assert_eq!(policy.pending_host(), None);
        Ok(())
    }

    #[test]
    fn permit_once_trusts_for_the_session_only() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("trust.json");

        let policy = CertificatePolicy::with_trust_file(&path)?;
        prompted(&policy, FIRST);
        policy.record(CertificateDecision::PermitOnce)?;
        assert!(policy.is_trusted(HOST));
        assert!(!path.exists());

        let reloaded = CertificatePolicy::with_trust_file(&path)?;
        assert!(!reloaded.is_trusted(HOST));
        Ok(())
    }

    #[test]
    fn permit_always_persists_the_fingerprint() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("trust.json");

        let policy = CertificatePolicy::with_trust_file(&path)?;
        prompted(&policy, FIRST);
        policy.record(CertificateDecision::PermitAlways)?;

        let reloaded = CertificatePolicy::with_trust_file(&path)?;
        assert_eq!(reloaded.pinned_fingerprint(HOST).as_deref(), Some(FIRST));
        assert!(!reloaded.is_trusted("other.example"));

        let raw = fs::read_to_string(&path)?;
        let parsed: serde_json::Value = serde_json::from_str(&raw)?;
        assert_eq!(parsed["trusted_hosts"][HOST], FIRST);
        Ok(())
    }

    #[test]
    fn pin_accepts_only_the_permitted_certificate() -> Result<()> {
        let policy = CertificatePolicy::new();
        prompted(&policy, FIRST);
        policy.record(CertificateDecision::PermitOnce)?;
        assert!(policy.accepts(HOST, FIRST));
        assert!(!policy.accepts(HOST, SECOND));
        assert!(!policy.accepts("other.example", FIRST));

        policy.observe(HOST, SECOND);
        assert!(policy.accepts(HOST, FIRST));
        prompted(&policy, SECOND);
        policy.record(CertificateDecision::PermitOnce)?;
        assert!(policy.accepts(HOST, SECOND));
        assert!(!policy.accepts(HOST, FIRST));
        Ok(())
    }

    #[test]
    fn permit_without_observed_fingerprint_trusts_nothing() -> Result<()> {
        let policy = CertificatePolicy::new();
        policy.mark_pending(HOST);
        policy.record(CertificateDecision::PermitAlways)?;
        assert!(!policy.is_trusted(HOST));
        assert_eq!(policy.pending_host(), None);
        assert_eq!(policy.last_decision(), Some(CertificateDecision::PermitAlways));
        Ok(())
    }

    #[test]
    fn clones_share_decisions() -> Result<()> {
        let policy = CertificatePolicy::new();
        let adapter_view = policy.clone();
        prompted(&adapter_view, FIRST);
        policy.record(CertificateDecision::PermitOnce)?;
        assert!(adapter_view.is_trusted(HOST));
        assert_eq!(
            adapter_view.last_decision(),
            Some(CertificateDecision::PermitOnce)
        );
        Ok(())
    }

    #[test]
    fn decision_names_match_wire_values() {
        let names = CertificateDecision::ALL.map(CertificateDecision::as_str);
        assert_eq!(names, ["deny", "permitOnce", "permitAlways"]);
        assert!(!CertificateDecision::Deny.permits());
        assert!(CertificateDecision::PermitAlways.permits());
    }
}
