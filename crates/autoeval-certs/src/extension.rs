//! Custom X.509v3 extensions written in OpenSSL config syntax.
//!
//! A property looks like `critical,DER:01:02:03:04`: an optional
//! `critical` flag followed by the raw extension value as colon-separated
//! hex bytes.

use crate::error::{CertError, Result};

/// A custom extension ready to be attached to a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionSpec {
    pub oid: Vec<u64>,
    pub critical: bool,
    pub value: Vec<u8>,
}

impl ExtensionSpec {
    /// Parse a dotted OID and an OpenSSL-style property.
    pub fn parse(oid: &str, property: &str) -> Result<Self> {
        let oid = parse_oid(oid)?;
        let (critical, value) = parse_property(property)?;
        Ok(Self {
            oid,
            critical,
            value,
        })
    }

    pub fn oid_string(&self) -> String {
        self.oid
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }

    pub(crate) fn to_rcgen(&self) -> rcgen::CustomExtension {
        let mut ext = rcgen::CustomExtension::from_oid_content(&self.oid, self.value.clone());
        ext.set_criticality(self.critical);
        ext
    }
}

/// `"1.2.3.4"` -> `[1, 2, 3, 4]`.
pub fn parse_oid(oid: &str) -> Result<Vec<u64>> {
    let invalid = |reason: &str| CertError::InvalidOid {
        oid: oid.to_string(),
        reason: reason.to_string(),
    };

    let arcs = oid
        .trim()
        .split('.')
        .map(|arc| arc.parse::<u64>().map_err(|_| invalid("arcs must be decimal integers")))
        .collect::<Result<Vec<_>>>()?;
    if arcs.len() < 2 {
        return Err(invalid("need at least two arcs"));
    }
    if arcs[0] > 2 {
        return Err(invalid("first arc must be 0, 1 or 2"));
    }
    Ok(arcs)
}

/// Parse `[critical,]DER:xx:xx:...` into (critical, value bytes).
pub fn parse_property(property: &str) -> Result<(bool, Vec<u8>)> {
    let invalid = |reason: String| CertError::InvalidProperty {
        property: property.to_string(),
        reason,
    };

    let mut critical = false;
    let mut value = None;
    for token in property.split(',').map(str::trim) {
        if token == "critical" {
            critical = true;
        } else if let Some(hex_bytes) = token.strip_prefix("DER:") {
            if value.is_some() {
                return Err(invalid("more than one DER value".to_string()));
            }
            value = Some(parse_der_bytes(hex_bytes).map_err(&invalid)?);
        } else {
            return Err(invalid(format!("unsupported token {token:?}")));
        }
    }

    let value = value.ok_or_else(|| invalid("missing DER: value".to_string()))?;
    Ok((critical, value))
}

fn parse_der_bytes(hex_bytes: &str) -> std::result::Result<Vec<u8>, String> {
    if hex_bytes.is_empty() {
        return Err("empty DER value".to_string());
    }
    hex_bytes
        .split(':')
        .map(|byte| match hex::decode(byte) {
            Ok(decoded) if decoded.len() == 1 => Ok(decoded[0]),
            _ => Err(format!("bad hex byte {byte:?}")),
        })
        .collect()
}
