//! PEM chain fixtures for certificate verification tests.

use crate::chain::{ChainBuilder, IssuedCert};
use crate::error::{CertError, Result};
use ::pem::{EncodeConfig, LineEnding, Pem};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::info;
use x509_parser::prelude::*;

const GENERATOR: &str = "autoeval gen-chain";
const CERTIFICATE_TAG: &str = "CERTIFICATE";

/// File name every generated chain fixture is written to.
pub const CHAIN_FILE: &str = "chain.pem";

/// Subject, issuer and fingerprint of one DER certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertSummary {
    pub subject: String,
    pub issuer: String,
    pub sha256: String,
}

impl CertSummary {
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(der)?;
        Ok(Self {
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            sha256: fingerprint(der),
        })
    }
}

/// Upper-case, colon-separated SHA-256 of `der`.
pub fn fingerprint(der: &[u8]) -> String {
    Sha256::digest(der)
        .iter()
        .map(|b| hex::encode_upper([*b]))
        .collect::<Vec<_>>()
        .join(":")
}

/// Render `chain` (leaf first) as commented PEM.
pub fn render_chain(description: &str, chain: &[IssuedCert]) -> Result<String> {
    let mut out = format!("[Created by: {GENERATOR}]\n\n{}\n", description.trim());

    for (i, cert) in chain.iter().enumerate() {
        let summary = CertSummary::from_der(&cert.der)?;
        out.push_str(&format!(
            "\nCertificate {} ({}):\n    Subject: {}\n    Issuer: {}\n    SHA256 Fingerprint: {}\n",
            i + 1,
            cert.name,
            summary.subject,
            summary.issuer,
            summary.sha256
        ));
        let config = EncodeConfig::new().set_line_ending(LineEnding::LF);
        out.push_str(&::pem::encode_config(
            &Pem::new(CERTIFICATE_TAG, cert.der.clone()),
            config,
        ));
    }
    Ok(out)
}

/// Write `chain` (leaf first) to `path` with a descriptive header.
pub fn write_chain(description: &str, chain: &[IssuedCert], path: &Path) -> Result<()> {
    let content = render_chain(description, chain)?;
    std::fs::write(path, content).map_err(|source| CertError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), certs = chain.len(), "wrote certificate chain");
    Ok(())
}

/// DER blocks of every certificate in a chain file, in file order.
pub fn read_chain(path: &Path) -> Result<Vec<Vec<u8>>> {
    let content = std::fs::read_to_string(path).map_err(|source| CertError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(::pem::parse_many(content)?
        .into_iter()
        .filter(|block| block.tag() == CERTIFICATE_TAG)
        .map(Pem::into_contents)
        .collect())
}

pub const UNKNOWN_CRITICAL_EXTENSION_DESCRIPTION: &str = "Certificate chain where the target \
certificate contains an unknown X.509v3 extension (OID=1.2.3.4) that is marked as critical.";

/// Root -> Intermediate -> Target, where Target carries the unknown
/// critical extension 1.2.3.4 with value `01 02 03 04`. Leaf first.
pub fn unknown_critical_extension_chain() -> Result<Vec<IssuedCert>> {
    let mut builder = ChainBuilder::new();
    let root = builder.create_self_signed_root("Root");
    let intermediate = builder.create_intermediate("Intermediate", root)?;
    let target = builder.create_end_entity("Target", intermediate)?;
    builder.add_extension(target, "1.2.3.4", "critical,DER:01:02:03:04")?;
    builder.issue(&[target, intermediate, root])
}

/// Generate the unknown-critical-extension fixture as `<out_dir>/chain.pem`.
pub fn generate_unknown_critical_extension(out_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(out_dir).map_err(|source| CertError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;
    let chain = unknown_critical_extension_chain()?;
    let path = out_dir.join(CHAIN_FILE);
    write_chain(UNKNOWN_CRITICAL_EXTENSION_DESCRIPTION, &chain, &path)?;
    Ok(path)
}
