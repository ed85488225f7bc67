//! Certificate stores.
//!
//! A store is opened read-only for the duration of a single lookup. The
//! returned [`StoreSession`] releases the store when dropped, so every exit
//! path (including early returns and panics) closes it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use mint_core::credential::unix_now;
use mint_core::{CertificateError, ClientCredential};
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::warn;

/// A local, read-only source of client certificates.
pub trait CertificateStore: Send + Sync {
    /// Opens the store. The session must not outlive a single lookup.
    ///
    /// # Errors
    ///
    /// Returns [`CertificateError::Store`] if the store cannot be read.
    fn open(&self) -> Result<Box<dyn StoreSession + '_>, CertificateError>;
}

/// An open, read-only view of a store.
pub trait StoreSession {
    /// Certificates whose subject contains `needle` (case-insensitive) and
    /// that are currently inside their validity window.
    fn find_by_subject(&self, needle: &str) -> Vec<ClientCredential>;

    /// The certificate with the given thumbprint, regardless of validity.
    fn find_by_thumbprint(&self, thumbprint: &str) -> Option<ClientCredential>;
}

/// Snapshot of a store's contents taken when it was opened.
struct Snapshot<'a> {
    certificates: Vec<ClientCredential>,
    now: u64,
    open_sessions: Option<&'a AtomicUsize>,
}

impl StoreSession for Snapshot<'_> {
    fn find_by_subject(&self, needle: &str) -> Vec<ClientCredential> {
        let needle = needle.trim().to_lowercase();
        self.certificates
            .iter()
            .filter(|c| c.subject().to_lowercase().contains(&needle))
            .filter(|c| c.is_valid_at(self.now))
            .cloned()
            .collect()
    }

    fn find_by_thumbprint(&self, thumbprint: &str) -> Option<ClientCredential> {
        self.certificates
            .iter()
            .find(|c| c.thumbprint().eq_ignore_ascii_case(thumbprint.trim()))
            .cloned()
    }
}

impl Drop for Snapshot<'_> {
    fn drop(&mut self) {
        if let Some(open) = self.open_sessions {
            open.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryCertificateStore
// ---------------------------------------------------------------------------

/// In-process store. Tracks open sessions so callers can verify the store is
/// always released.
#[derive(Debug, Default)]
pub struct MemoryCertificateStore {
    certificates: RwLock<Vec<ClientCredential>>,
    open_sessions: AtomicUsize,
    total_opens: AtomicUsize,
    /// Fixed "now" in unix seconds; `None` uses the system clock.
    clock: Option<u64>,
}

impl MemoryCertificateStore {
    #[must_use]
    pub fn new(certificates: Vec<ClientCredential>) -> Self {
        Self {
            certificates: RwLock::new(certificates),
            ..Self::default()
        }
    }

    /// Evaluates validity windows against a fixed instant.
    #[must_use]
    pub fn with_clock(mut self, unix_secs: u64) -> Self {
        self.clock = Some(unix_secs);
        self
    }

    pub fn insert(&self, credential: ClientCredential) {
        self.certificates.write().push(credential);
    }

    /// Sessions currently open.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    /// Sessions opened since creation.
    #[must_use]
    pub fn total_opens(&self) -> usize {
        self.total_opens.load(Ordering::SeqCst)
    }
}

impl CertificateStore for MemoryCertificateStore {
    fn open(&self) -> Result<Box<dyn StoreSession + '_>, CertificateError> {
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        self.total_opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(Snapshot {
            certificates: self.certificates.read().clone(),
            now: self.clock.unwrap_or_else(unix_now),
            open_sessions: Some(&self.open_sessions),
        }))
    }
}

// ---------------------------------------------------------------------------
// DirectoryCertificateStore
// ---------------------------------------------------------------------------

/// Name of the manifest file describing a directory store.
pub const MANIFEST_FILE: &str = "store.json";

#[derive(Debug, Deserialize)]
struct Manifest {
    certificates: Vec<ManifestEntry>,
}

/// One certificate in a directory store. `file` is a PEM file, relative to
/// the store directory, holding the certificate chain and private key.
/// `thumbprint`, when present, pins the entry to that exact certificate.
#[derive(Debug, Deserialize)]
struct ManifestEntry {
    subject: String,
    not_before: u64,
    not_after: u64,
    file: PathBuf,
    #[serde(default)]
    thumbprint: Option<String>,
}

/// A directory of PEM files described by a `store.json` manifest.
///
/// ```json
/// { "certificates": [
///     { "subject": "CN=SPK_PARTNER_TEST, O=Contoso",
///       "not_before": 1700000000, "not_after": 1800000000,
///       "file": "partner.pem", "thumbprint": "9F86D0..." } ] }
/// ```
///
/// The subject and validity window are taken from the manifest as written;
/// the PEM is only decoded far enough to derive the thumbprint. Whoever
/// rotates a certificate file must update its manifest entry too. Listing
/// the `thumbprint` makes a stale entry detectable: if the file no longer
/// hashes to it, the entry is skipped.
///
/// Entries whose file is missing or unusable are skipped with a warning, so
/// one broken entry does not hide the rest of the store. The directory is
/// read afresh on every `open`; nothing is cached.
#[derive(Debug, Clone)]
pub struct DirectoryCertificateStore {
    dir: PathBuf,
}

impl DirectoryCertificateStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn load(&self) -> Result<Vec<ClientCredential>, CertificateError> {
        let manifest_path = self.dir.join(MANIFEST_FILE);
        let raw = fs::read(&manifest_path).map_err(|e| store_error(&manifest_path, &e))?;
        let manifest: Manifest =
            serde_json::from_slice(&raw).map_err(|e| store_error(&manifest_path, &e))?;

        Ok(manifest
            .certificates
            .into_iter()
            .filter_map(|entry| match self.load_entry(&entry) {
                Ok(credential) => Some(credential),
                Err(err) => {
                    warn!(
                        subject = %entry.subject,
                        file = %entry.file.display(),
                        error = %err,
                        "skipping certificate store entry"
                    );
                    None
                }
            })
            .collect())
    }

    fn load_entry(&self, entry: &ManifestEntry) -> Result<ClientCredential, CertificateError> {
        let path = self.dir.join(&entry.file);
        let pem = fs::read(&path).map_err(|e| store_error(&path, &e))?;
        let credential = ClientCredential::from_pem(
            entry.subject.clone(),
            entry.not_before,
            entry.not_after,
            pem,
        )?;
        match &entry.thumbprint {
            Some(expected) if !expected.trim().eq_ignore_ascii_case(credential.thumbprint()) => {
                Err(CertificateError::InvalidMaterial {
                    reason: format!(
                        "{} hashes to {}, manifest lists {}",
                        path.display(),
                        credential.thumbprint(),
                        expected.trim()
                    ),
                })
            }
            _ => Ok(credential),
        }
    }
}

impl CertificateStore for DirectoryCertificateStore {
    fn open(&self) -> Result<Box<dyn StoreSession + '_>, CertificateError> {
        Ok(Box::new(Snapshot {
            certificates: self.load()?,
            now: unix_now(),
            open_sessions: None,
        }))
    }
}

fn store_error(path: &Path, err: &dyn std::fmt::Display) -> CertificateError {
    CertificateError::Store {
        reason: format!("{}: {err}", path.display()),
    }
}
