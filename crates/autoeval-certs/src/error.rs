//! Certificate fixture errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CertError {
    #[error("invalid OID {oid:?}: {reason}")]
    InvalidOid { oid: String, reason: String },

    #[error("invalid extension property {property:?}: {reason}")]
    InvalidProperty { property: String, reason: String },

    #[error("unknown certificate #{0} in this chain")]
    UnknownCertificate(usize),

    #[error("rcgen error: {0}")]
    Rcgen(#[from] rcgen::RcgenError),

    #[error("x509 parsing error: {0}")]
    X509(String),

    #[error("PEM encoding/decoding failed: {0}")]
    Pem(#[from] pem::PemError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, CertError>;

impl From<x509_parser::nom::Err<x509_parser::error::X509Error>> for CertError {
    fn from(e: x509_parser::nom::Err<x509_parser::error::X509Error>) -> Self {
        CertError::X509(e.to_string())
    }
}
