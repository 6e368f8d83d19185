//! The unknown-critical-extension fixture, read back and inspected.

use autoeval_certs::{
    generate_unknown_critical_extension, read_chain, CertSummary, ChainBuilder, CHAIN_FILE,
};
use x509_parser::prelude::*;

fn common_name(cert: &X509Certificate<'_>) -> String {
    cert.subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .unwrap_or("")
        .to_string()
}

fn is_ca(cert: &X509Certificate<'_>) -> bool {
    cert.basic_constraints()
        .map(|bc| bc.map(|b| b.value.ca).unwrap_or(false))
        .unwrap_or(false)
}

#[test]
fn test_chain_is_leaf_first() {
    let dir = tempfile::tempdir().unwrap();
    let path = generate_unknown_critical_extension(dir.path()).unwrap();
    assert_eq!(path, dir.path().join(CHAIN_FILE));

    let ders = read_chain(&path).unwrap();
    assert_eq!(ders.len(), 3);

    let certs: Vec<X509Certificate<'_>> = ders
        .iter()
        .map(|der| X509Certificate::from_der(der).unwrap().1)
        .collect();
    let names: Vec<String> = certs.iter().map(common_name).collect();
    assert_eq!(names, ["Target", "Intermediate", "Root"]);

    // Each certificate is issued by the next one; the root by itself.
    assert_eq!(certs[0].issuer(), certs[1].subject());
    assert_eq!(certs[1].issuer(), certs[2].subject());
    assert_eq!(certs[2].issuer(), certs[2].subject());

    assert!(!is_ca(&certs[0]));
    assert!(is_ca(&certs[1]));
    assert!(is_ca(&certs[2]));
}

#[test]
fn test_target_carries_unknown_critical_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = generate_unknown_critical_extension(dir.path()).unwrap();
    let ders = read_chain(&path).unwrap();

    let (_, target) = X509Certificate::from_der(&ders[0]).unwrap();
    let ext = target
        .extensions()
        .iter()
        .find(|e| e.oid.to_id_string() == "1.2.3.4")
        .expect("target should carry OID 1.2.3.4");
    assert!(ext.critical);
    assert_eq!(ext.value, &[0x01, 0x02, 0x03, 0x04]);

    for der in &ders[1..] {
        let (_, cert) = X509Certificate::from_der(der).unwrap();
        assert!(cert
            .extensions()
            .iter()
            .all(|e| e.oid.to_id_string() != "1.2.3.4"));
    }
}

#[test]
fn test_header_describes_chain() {
    let dir = tempfile::tempdir().unwrap();
    let path = generate_unknown_critical_extension(dir.path()).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    let ders = read_chain(&path).unwrap();

    assert!(text.contains("unknown X.509v3 extension (OID=1.2.3.4)"));
    for der in &ders {
        let summary = CertSummary::from_der(der).unwrap();
        assert!(text.contains(&summary.sha256));
        assert!(text.contains(&format!("Subject: {}", summary.subject)));
    }
}

#[test]
fn test_non_critical_extension() {
    let mut builder = ChainBuilder::new();
    let root = builder.create_self_signed_root("Root");
    builder.add_extension(root, "1.3.6.1.4.1.11129.99", "DER:05:00").unwrap();
    let chain = builder.issue(&[root]).unwrap();

    let (_, cert) = X509Certificate::from_der(&chain[0].der).unwrap();
    let ext = cert
        .extensions()
        .iter()
        .find(|e| e.oid.to_id_string() == "1.3.6.1.4.1.11129.99")
        .unwrap();
    assert!(!ext.critical);
    assert_eq!(ext.value, &[0x05, 0x00]);
}
