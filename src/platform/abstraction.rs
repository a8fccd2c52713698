//! Platform abstraction implementation: one [`PlatformAbstractionImpl`] per
//! OS, each reading that OS's system trust store through the crate the
//! workspace already links for it rather than a bundled CA list.

use std::io::Cursor;

use crate::error::{PdfSignError, Result};
use crate::traits::{PlatformAbstraction, PlatformInfo};
use crate::types::X509Certificate;
use crate::x509::certificate::parse_certificate;

#[derive(Debug, Default)]
pub struct PlatformAbstractionImpl;

impl PlatformAbstractionImpl {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "windows")]
fn read_system_certificates() -> Result<Vec<X509Certificate>> {
    use std::ptr;

    use winapi::um::wincrypt::{CertCloseStore, CertEnumCertificatesInStore, CertOpenSystemStoreW, PCCERT_CONTEXT};

    let store_name: Vec<u16> = "ROOT\0".encode_utf16().collect();
    let mut certs = Vec::new();

    unsafe {
        let store = CertOpenSystemStoreW(0, store_name.as_ptr());
        if store.is_null() {
            return Err(PdfSignError::io("failed to open the Windows ROOT certificate store"));
        }

        let mut cert_context: PCCERT_CONTEXT = ptr::null();
        loop {
            cert_context = CertEnumCertificatesInStore(store, cert_context);
            if cert_context.is_null() {
                break;
            }
            let ctx = &*cert_context;
            let der = std::slice::from_raw_parts(ctx.pbCertEncoded, ctx.cbCertEncoded as usize);
            if let Ok(parsed) = parse_certificate(der) {
                certs.push(parsed);
            }
        }

        CertCloseStore(store, 0);
    }

    Ok(certs)
}

#[cfg(target_os = "macos")]
fn read_system_certificates() -> Result<Vec<X509Certificate>> {
    use security_framework::os::macos::trust_settings::{Domain, TrustSettings};

    let settings = TrustSettings::new(Domain::System);
    let entries = settings
        .iter()
        .map_err(|e| PdfSignError::io(format!("failed to read the macOS system trust settings: {e}")))?;

    Ok(entries.filter_map(|(cert, _trust)| parse_certificate(&cert.to_der()).ok()).collect())
}

#[cfg(target_os = "linux")]
fn read_system_certificates() -> Result<Vec<X509Certificate>> {
    const BUNDLE_PATHS: &[&str] = &[
        "/etc/ssl/certs/ca-certificates.crt",
        "/etc/pki/tls/certs/ca-bundle.crt",
        "/etc/ssl/cert.pem",
    ];

    for path in BUNDLE_PATHS {
        if let Ok(pem) = std::fs::read_to_string(path) {
            return Ok(parse_pem_bundle(&pem));
        }
    }
    Ok(Vec::new())
}

#[cfg(target_os = "linux")]
fn parse_pem_bundle(pem: &str) -> Vec<X509Certificate> {
    use rustls_pemfile::{read_one, Item};

    let mut cursor = Cursor::new(pem.as_bytes());
    let mut certs = Vec::new();
    while let Ok(Some(item)) = read_one(&mut cursor) {
        if let Item::X509Certificate(der) = item {
            if let Ok(cert) = parse_certificate(&der) {
                certs.push(cert);
            }
        }
    }
    certs
}

#[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
fn read_system_certificates() -> Result<Vec<X509Certificate>> {
    Ok(Vec::new())
}

impl PlatformAbstraction for PlatformAbstractionImpl {
    fn get_system_certificates(&self) -> Result<Vec<X509Certificate>> {
        read_system_certificates()
    }

    fn use_platform_crypto(&self) -> bool {
        false
    }

    fn platform_info(&self) -> PlatformInfo {
        PlatformInfo {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            has_hardware_crypto: false,
        }
    }
}
