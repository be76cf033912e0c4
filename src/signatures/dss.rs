//! Document Security Store (`/Root /DSS`, ETSI EN 319 142-1 §5.4).

use bytes::Bytes;

use crate::document::PdfDocument;
use crate::error::Result;
use crate::object::{Dictionary, Object};

/// Validation material stored in one revision's `/DSS` dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DssDictionary {
    /// `/Certs` stream contents (DER certificates)
    pub certificates: Vec<Bytes>,
    /// `/OCSPs` stream contents (DER `OCSPResponse`s)
    pub ocsps: Vec<Bytes>,
    /// `/CRLs` stream contents (DER `CertificateList`s)
    pub crls: Vec<Bytes>,
    /// Keys of the `/VRI` dictionary (upper-case hex SHA-1 of signature values)
    pub vri_keys: Vec<String>,
}

impl DssDictionary {
    /// Read the `/DSS` entry of `catalog`, if there is one.
    ///
    /// Streams that cannot be decoded are skipped with a warning; a `/DSS`
    /// that is present but empty still yields `Some`.
    pub fn from_catalog(doc: &mut PdfDocument, catalog: &Dictionary) -> Result<Option<Self>> {
        let Some(Object::Dictionary(dss)) = doc.resolve_entry(catalog, "DSS") else {
            return Ok(None);
        };

        let mut vri_keys: Vec<String> = match doc.resolve_entry(&dss, "VRI") {
            Some(Object::Dictionary(vri)) => vri.keys().cloned().collect(),
            _ => Vec::new(),
        };
        vri_keys.sort();

        Ok(Some(Self {
            certificates: read_streams(doc, &dss, "Certs"),
            ocsps: read_streams(doc, &dss, "OCSPs"),
            crls: read_streams(doc, &dss, "CRLs"),
            vri_keys,
        }))
    }

    /// Nothing stored at all.
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty() && self.ocsps.is_empty() && self.crls.is_empty() && self.vri_keys.is_empty()
    }
}

fn read_streams(doc: &mut PdfDocument, dss: &Dictionary, key: &str) -> Vec<Bytes> {
    let Some(items) = doc.resolve_entry(dss, key) else {
        return Vec::new();
    };
    let Some(items) = items.as_array() else {
        log::warn!("/DSS /{} is not an array", key);
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match doc.stream_data(item) {
            Ok(data) => Some(Bytes::from(data)),
            Err(e) => {
                log::warn!("skipping unreadable /DSS /{} entry: {}", key, e);
                None
            },
        })
        .collect()
}
