//! Offline revocation sources built from data already inside the document.

use std::sync::Arc;

use bytes::Bytes;
use indexmap::IndexSet;

use super::crl::CrlResponse;
use super::identifier::RevocationIdentifier;
use super::ocsp::OcspResponse;
use super::selector::select_best;
use super::token::RevocationToken;
use crate::signatures::{CertificateToken, CryptoProvider};

/// Answers revocation queries for a certificate/issuer pair.
pub trait RevocationSource {
    /// The best token available for `cert`, if any applies.
    fn revocation_token(&self, cert: &CertificateToken, issuer: &CertificateToken) -> Option<RevocationToken>;
}

/// OCSP responses from `/DSS /OCSPs` and CMS revocation info.
pub struct OfflineOcspSource {
    responses: Vec<OcspResponse>,
    crypto: Arc<dyn CryptoProvider>,
}

impl OfflineOcspSource {
    /// Decode every blob; duplicates and undecodable blobs are dropped.
    pub fn new(blobs: impl IntoIterator<Item = Bytes>, crypto: Arc<dyn CryptoProvider>) -> Self {
        let responses = blobs
            .into_iter()
            .collect::<IndexSet<_>>()
            .into_iter()
            .filter_map(|blob| match OcspResponse::from_der(blob) {
                Ok(response) => Some(response),
                Err(e) => {
                    log::warn!("ignoring undecodable OCSP response: {}", e);
                    None
                },
            })
            .collect();
        Self { responses, crypto }
    }

    pub fn responses(&self) -> &[OcspResponse] {
        &self.responses
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

impl RevocationSource for OfflineOcspSource {
    fn revocation_token(&self, cert: &CertificateToken, issuer: &CertificateToken) -> Option<RevocationToken> {
        let id = RevocationIdentifier::for_certificate(cert, issuer, self.crypto.as_ref());
        select_best(&self.responses, &id)
    }
}

impl std::fmt::Debug for OfflineOcspSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineOcspSource")
            .field("responses", &self.responses.len())
            .finish()
    }
}

/// CRLs from `/DSS /CRLs` and CMS `crls`.
pub struct OfflineCrlSource {
    crls: Vec<CrlResponse>,
    crypto: Arc<dyn CryptoProvider>,
}

impl OfflineCrlSource {
    /// Decode every blob; duplicates and undecodable blobs are dropped.
    pub fn new(blobs: impl IntoIterator<Item = Bytes>, crypto: Arc<dyn CryptoProvider>) -> Self {
        let crls = blobs
            .into_iter()
            .collect::<IndexSet<_>>()
            .into_iter()
            .filter_map(|blob| match CrlResponse::from_der(blob) {
                Ok(crl) => Some(crl),
                Err(e) => {
                    log::warn!("ignoring undecodable CRL: {}", e);
                    None
                },
            })
            .collect();
        Self { crls, crypto }
    }

    pub fn crls(&self) -> &[CrlResponse] {
        &self.crls
    }

    pub fn len(&self) -> usize {
        self.crls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crls.is_empty()
    }
}

impl RevocationSource for OfflineCrlSource {
    fn revocation_token(&self, cert: &CertificateToken, issuer: &CertificateToken) -> Option<RevocationToken> {
        let id = RevocationIdentifier::for_certificate(cert, issuer, self.crypto.as_ref());
        select_best(&self.crls, &id)
    }
}

impl std::fmt::Debug for OfflineCrlSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineCrlSource").field("crls", &self.crls.len()).finish()
    }
}
