//! autoeval certs: X.509 chain fixtures
//!
//! Builds small certificate chains with `rcgen`, optionally injecting
//! custom extensions written in OpenSSL config syntax, and writes them
//! leaf-first as commented PEM files for chain verification tests.

pub mod chain;
pub mod error;
pub mod extension;
pub mod fixture;

pub use chain::{CertId, CertRole, ChainBuilder, IssuedCert};
pub use error::{CertError, Result};
pub use extension::{parse_oid, parse_property, ExtensionSpec};
pub use fixture::{
    fingerprint, generate_unknown_critical_extension, read_chain, render_chain,
    unknown_critical_extension_chain, write_chain, CertSummary, CHAIN_FILE,
    UNKNOWN_CRITICAL_EXTENSION_DESCRIPTION,
};
