//! Selects the client certificate to present for a configured subject.

use std::sync::Arc;

use mint_core::credential::cn_matches;
use mint_core::{CertificateError, ClientCredential};
use tracing::{debug, info};

use super::store::CertificateStore;

/// Resolves a subject string to exactly one currently valid certificate.
///
/// Selection rules:
/// 1. candidates are the valid certificates whose subject contains the
///    configured value;
/// 2. a single candidate is returned as-is;
/// 3. with several, only those whose `CN` equals the configured value
///    (case-insensitive) are kept, and the one with the latest `NotAfter`
///    wins.
///
/// The store is opened for each lookup and released before returning.
#[derive(Clone)]
pub struct CertificateResolver {
    store: Arc<dyn CertificateStore>,
}

impl CertificateResolver {
    #[must_use]
    pub fn new(store: Arc<dyn CertificateStore>) -> Self {
        Self { store }
    }

    /// # Errors
    ///
    /// - [`CertificateError::EmptySubject`] for a blank subject.
    /// - [`CertificateError::NotFound`] when no candidate survives selection.
    /// - [`CertificateError::Store`] when the store cannot be opened.
    pub fn resolve(&self, subject: &str) -> Result<ClientCredential, CertificateError> {
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(CertificateError::EmptySubject);
        }

        let candidates = {
            let session = self.store.open()?;
            session.find_by_subject(subject)
        };
        debug!(subject, candidates = candidates.len(), "certificate candidates");

        let chosen = select(candidates, subject).ok_or_else(|| CertificateError::NotFound {
            subject: subject.to_string(),
        })?;
        info!(
            subject = chosen.subject(),
            thumbprint = chosen.thumbprint(),
            "certificate selected"
        );
        Ok(chosen)
    }

    /// Re-locates a credential by thumbprint.
    ///
    /// # Errors
    ///
    /// Returns [`CertificateError::ThumbprintNotFound`] if the store no longer
    /// holds it.
    pub fn resolve_thumbprint(&self, thumbprint: &str) -> Result<ClientCredential, CertificateError> {
        let session = self.store.open()?;
        session
            .find_by_thumbprint(thumbprint)
            .ok_or_else(|| CertificateError::ThumbprintNotFound {
                thumbprint: thumbprint.to_string(),
            })
    }
}

impl std::fmt::Debug for CertificateResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateResolver").finish_non_exhaustive()
    }
}

fn select(candidates: Vec<ClientCredential>, subject: &str) -> Option<ClientCredential> {
    if candidates.len() <= 1 {
        return candidates.into_iter().next();
    }
    candidates
        .into_iter()
        .filter(|c| cn_matches(c.subject(), subject))
        .max_by_key(ClientCredential::not_after)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::cert::store::MemoryCertificateStore;

    const NOW: u64 = 1_000;

    fn cred(subject: &str, thumbprint: &str, not_after: u64) -> ClientCredential {
        ClientCredential::new(subject, thumbprint, 0, not_after, Vec::new())
    }

    fn resolver_over(certs: Vec<ClientCredential>) -> (CertificateResolver, Arc<MemoryCertificateStore>) {
        let store = Arc::new(MemoryCertificateStore::new(certs).with_clock(NOW));
        (CertificateResolver::new(store.clone()), store)
    }

    #[test]
    fn single_candidate_is_returned_without_cn_check() {
        let (resolver, _) = resolver_over(vec![cred("CN=SPK_PARTNER_TEST_2, O=Contoso", "01", 2_000)]);
        let found = resolver.resolve("SPK_PARTNER_TEST").unwrap();
        assert_eq!(found.thumbprint(), "01");
    }

    #[test]
    fn exact_cn_wins_among_several() {
        let (resolver, _) = resolver_over(vec![
            cred("CN=partner-old, O=Contoso", "01", 9_000),
            cred("CN=partner, O=Contoso", "02", 2_000),
        ]);
        assert_eq!(resolver.resolve("partner").unwrap().thumbprint(), "02");
    }

    #[test]
    fn latest_not_after_wins_among_exact_matches() {
        let (resolver, _) = resolver_over(vec![
            cred("CN=partner", "01", 2_000),
            cred("CN=Partner, O=Contoso", "02", 5_000),
            cred("CN=partner, OU=Billing", "03", 3_000),
        ]);
        assert_eq!(resolver.resolve("partner").unwrap().thumbprint(), "02");
    }

    #[test]
    fn several_candidates_without_exact_cn_is_not_found() {
        let (resolver, _) = resolver_over(vec![
            cred("CN=partner-a", "01", 2_000),
            cred("CN=partner-b", "02", 2_000),
        ]);
        assert_eq!(
            resolver.resolve("partner"),
            Err(CertificateError::NotFound {
                subject: "partner".to_string()
            })
        );
    }

    #[test]
    fn no_substring_match_is_not_found() {
        let (resolver, store) = resolver_over(vec![cred("CN=billing", "01", 2_000)]);
        assert_eq!(
            resolver.resolve("partner"),
            Err(CertificateError::NotFound {
                subject: "partner".to_string()
            })
        );
        assert_eq!(store.open_sessions(), 0);
    }

    #[test]
    fn expired_certificates_are_never_selected() {
        let (resolver, _) = resolver_over(vec![cred("CN=partner", "01", NOW - 1)]);
        assert!(matches!(resolver.resolve("partner"), Err(CertificateError::NotFound { .. })));
    }

    #[test]
    fn blank_subject_is_rejected_without_opening_store() {
        let (resolver, store) = resolver_over(vec![cred("CN=partner", "01", 2_000)]);
        assert_eq!(resolver.resolve("  "), Err(CertificateError::EmptySubject));
        assert_eq!(store.total_opens(), 0);
    }

    #[test]
    fn store_is_released_on_every_path() {
        let (resolver, store) = resolver_over(vec![
            cred("CN=partner", "01", 2_000),
            cred("CN=other", "02", 2_000),
        ]);
        resolver.resolve("partner").unwrap();
        resolver.resolve("missing").unwrap_err();
        resolver.resolve_thumbprint("02").unwrap();
        resolver.resolve_thumbprint("FF").unwrap_err();
        assert_eq!(store.total_opens(), 4);
        assert_eq!(store.open_sessions(), 0);
    }

    #[test]
    fn thumbprint_lookup() {
        let (resolver, _) = resolver_over(vec![cred("CN=partner", "abcdef", 2_000)]);
        assert_eq!(resolver.resolve_thumbprint("ABCDEF").unwrap().subject(), "CN=partner");
        assert_eq!(
            resolver.resolve_thumbprint("00"),
            Err(CertificateError::ThumbprintNotFound {
                thumbprint: "00".to_string()
            })
        );
    }

    proptest! {
        #[test]
        fn selected_certificate_has_latest_expiry_among_exact_matches(
            expiries in proptest::collection::vec(NOW..NOW * 10, 2..8),
        ) {
            let certs: Vec<_> = expiries
                .iter()
                .enumerate()
                .map(|(i, &na)| cred(&format!("CN=partner, SERIALNUMBER={i}"), &format!("{i:02}"), na))
                .collect();
            let (resolver, store) = resolver_over(certs);
            let chosen = resolver.resolve("partner").unwrap();
            prop_assert_eq!(chosen.not_after(), *expiries.iter().max().unwrap());
            prop_assert_eq!(store.open_sessions(), 0);
        }
    }
}
