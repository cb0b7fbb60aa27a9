use std::io::BufReader;

use rustls::{pki_types::CertificateDer, RootCertStore};
use rustls_pemfile::certs;
use tonic::transport::{Certificate, ClientTlsConfig};

use crate::error::{ChannelError, ChannelResult};

fn load_certs(pem: &[u8]) -> ChannelResult<Vec<CertificateDer<'static>>> {
    certs(&mut BufReader::new(pem))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| ChannelError::invalid_certificates(format!("malformed PEM: {}", err)))
}

/// Parses `pem` into a trust store, failing on anything that is not a
/// usable X.509 certificate.
pub fn load_root_cert_store(pem: &[u8]) -> ChannelResult<RootCertStore> {
    let ca_certs = load_certs(pem)?;
    if ca_certs.is_empty() {
        return Err(ChannelError::invalid_certificates(
            "no CERTIFICATE blocks found",
        ));
    }

    let mut root_store = RootCertStore::empty();
    for cert in ca_certs {
        root_store.add(cert).map_err(|err| {
            ChannelError::invalid_certificates(format!("failed to load CA certificate: {}", err))
        })?;
    }
    Ok(root_store)
}

/// Client TLS settings trusting the CA certificates in `root_certificates`.
///
/// The bytes are validated here since the transport only parses them when
/// the first connection is attempted.
pub fn build_client_tls_config(
    root_certificates: &[u8],
    domain_name: Option<&str>,
) -> ChannelResult<ClientTlsConfig> {
    load_root_cert_store(root_certificates)?;

    let mut tls_config =
        ClientTlsConfig::new().ca_certificate(Certificate::from_pem(root_certificates));
    if let Some(domain) = domain_name {
        tls_config = tls_config.domain_name(domain);
    }
    Ok(tls_config)
}
