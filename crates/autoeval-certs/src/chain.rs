//! Certificate chain builder.
//!
//! Certificates are declared first and signed in one pass by
//! [`ChainBuilder::issue`], so extensions can still be attached to a
//! certificate after its subjects have been declared. Issuers always precede
//! their subjects, which makes declaration order a valid signing order.

use crate::error::{CertError, Result};
use crate::extension::ExtensionSpec;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType,
    ExtendedKeyUsagePurpose, IsCa, KeyUsagePurpose,
};
use tracing::debug;

/// Handle to a certificate declared in a [`ChainBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CertId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertRole {
    Root,
    Intermediate,
    EndEntity,
}

#[derive(Debug)]
struct Declared {
    name: String,
    role: CertRole,
    issuer: Option<CertId>,
    extensions: Vec<ExtensionSpec>,
}

/// A signed certificate.
#[derive(Debug, Clone)]
pub struct IssuedCert {
    pub name: String,
    pub role: CertRole,
    pub der: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct ChainBuilder {
    declared: Vec<Declared>,
}

impl ChainBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, name: &str, role: CertRole, issuer: Option<CertId>) -> CertId {
        self.declared.push(Declared {
            name: name.to_string(),
            role,
            issuer,
            extensions: Vec::new(),
        });
        CertId(self.declared.len() - 1)
    }

    fn declare_issued(&mut self, name: &str, role: CertRole, issuer: CertId) -> Result<CertId> {
        if issuer.0 >= self.declared.len() {
            return Err(CertError::UnknownCertificate(issuer.0));
        }
        Ok(self.push(name, role, Some(issuer)))
    }

    /// Self-signed CA certificate.
    pub fn create_self_signed_root(&mut self, name: &str) -> CertId {
        self.push(name, CertRole::Root, None)
    }

    /// CA certificate signed by `issuer`.
    pub fn create_intermediate(&mut self, name: &str, issuer: CertId) -> Result<CertId> {
        self.declare_issued(name, CertRole::Intermediate, issuer)
    }

    /// Server certificate signed by `issuer`.
    pub fn create_end_entity(&mut self, name: &str, issuer: CertId) -> Result<CertId> {
        self.declare_issued(name, CertRole::EndEntity, issuer)
    }

    /// Attach an extension given as a dotted OID and an OpenSSL-style
    /// property such as `critical,DER:01:02:03:04`.
    pub fn add_extension(&mut self, cert: CertId, oid: &str, property: &str) -> Result<()> {
        let ext = ExtensionSpec::parse(oid, property)?;
        let declared = self
            .declared
            .get_mut(cert.0)
            .ok_or(CertError::UnknownCertificate(cert.0))?;
        declared.extensions.push(ext);
        Ok(())
    }

    pub fn name(&self, cert: CertId) -> Option<&str> {
        self.declared.get(cert.0).map(|d| d.name.as_str())
    }

    /// Sign every declared certificate and return `order` as issued certs.
    pub fn issue(&self, order: &[CertId]) -> Result<Vec<IssuedCert>> {
        let mut signers: Vec<Certificate> = Vec::with_capacity(self.declared.len());
        let mut ders: Vec<Vec<u8>> = Vec::with_capacity(self.declared.len());

        for declared in &self.declared {
            let cert = Certificate::from_params(params_for(declared))?;
            let der = match declared.issuer {
                None => cert.serialize_der()?,
                Some(CertId(idx)) => cert.serialize_der_with_signer(&signers[idx])?,
            };
            debug!(name = %declared.name, role = ?declared.role, "issued certificate");
            signers.push(cert);
            ders.push(der);
        }

        order
            .iter()
            .map(|&CertId(idx)| {
                let declared = self
                    .declared
                    .get(idx)
                    .ok_or(CertError::UnknownCertificate(idx))?;
                Ok(IssuedCert {
                    name: declared.name.clone(),
                    role: declared.role,
                    der: ders[idx].clone(),
                })
            })
            .collect()
    }
}

fn params_for(declared: &Declared) -> CertificateParams {
    let mut params = CertificateParams::new(Vec::<String>::new());

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, declared.name.clone());
    params.distinguished_name = dn;

    match declared.role {
        CertRole::Root | CertRole::Intermediate => {
            params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
            params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
        }
        CertRole::EndEntity => {
            params.is_ca = IsCa::NoCa;
            params.key_usages = vec![
                KeyUsagePurpose::DigitalSignature,
                KeyUsagePurpose::KeyEncipherment,
            ];
            params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
        }
    }

    params.custom_extensions = declared.extensions.iter().map(ExtensionSpec::to_rcgen).collect();
    params
}
