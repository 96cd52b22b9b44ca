//! TLS credentials for the listener.
//!
//! Certificate and key paths can be given explicitly; each one that is left
//! out falls back to the development pair under `certs/`. Credentials are
//! loaded before the listener binds, so a bad configuration stops the server
//! from starting at all.

use crate::error::{ServerError, ServerResult};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

pub const DEFAULT_CERT_PATH: &str = "certs/localhost.pem";
pub const DEFAULT_KEY_PATH: &str = "certs/localhost-key.pem";

#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    cert_file: Option<PathBuf>,
    key_file: Option<PathBuf>,
}

impl TlsConfig {
    pub fn new<P: AsRef<Path>>(cert_file: P, key_file: P) -> Self {
        Self {
            cert_file: Some(cert_file.as_ref().to_path_buf()),
            key_file: Some(key_file.as_ref().to_path_buf()),
        }
    }

    pub fn cert_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.cert_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn key_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.key_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn cert_path(&self) -> PathBuf {
        self.cert_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CERT_PATH))
    }

    pub fn key_path(&self) -> PathBuf {
        self.key_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_KEY_PATH))
    }

    /// Returns the certificate and key paths, failing if either is missing.
    pub fn resolve(&self) -> ServerResult<(PathBuf, PathBuf)> {
        let cert = self.cert_path();
        let key = self.key_path();
        for path in [&cert, &key] {
            if !path.is_file() {
                return Err(ServerError::TlsConfig(format!(
                    "Certificate or key file missing: {}",
                    path.display()
                )));
            }
        }
        Ok((cert, key))
    }

    /// Builds an acceptor that negotiates `h2` via ALPN.
    pub fn acceptor(&self) -> ServerResult<TlsAcceptor> {
        let (cert_path, key_path) = self.resolve()?;
        let certs = load_certs(&cert_path)?;
        let key = load_key(&key_path)?;

        let mut config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| ServerError::TlsConfig(format!("invalid certificate or key: {}", e)))?;
        config.alpn_protocols = vec![b"h2".to_vec()];
        Ok(TlsAcceptor::from(Arc::new(config)))
    }
}

fn load_certs(path: &Path) -> ServerResult<Vec<CertificateDer<'static>>> {
    let mut reader = BufReader::new(File::open(path).map_err(|e| tls_io_error(path, e))?);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| tls_io_error(path, e))?;
    if certs.is_empty() {
        return Err(ServerError::TlsConfig(format!(
            "no certificates found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> ServerResult<PrivateKeyDer<'static>> {
    let mut reader = BufReader::new(File::open(path).map_err(|e| tls_io_error(path, e))?);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| tls_io_error(path, e))?
        .ok_or_else(|| ServerError::TlsConfig(format!("no private key found in {}", path.display())))
}

fn tls_io_error(path: &Path, err: std::io::Error) -> ServerError {
    ServerError::TlsConfig(format!("{}: {}", path.display(), err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("h2-dispatch-{}-{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn falls_back_to_default_paths() {
        let config = TlsConfig::default();
        assert_eq!(config.cert_path(), PathBuf::from(DEFAULT_CERT_PATH));
        assert_eq!(config.key_path(), PathBuf::from(DEFAULT_KEY_PATH));

        let config = TlsConfig::default().cert_file("/etc/site.pem");
        assert_eq!(config.cert_path(), PathBuf::from("/etc/site.pem"));
        assert_eq!(config.key_path(), PathBuf::from(DEFAULT_KEY_PATH));
    }

    #[test]
    fn missing_files_fail_resolution() {
        let config = TlsConfig::new("/nonexistent/cert.pem", "/nonexistent/key.pem");
        let err = config.resolve().unwrap_err();
        assert!(matches!(err, ServerError::TlsConfig(_)));
        assert!(err.to_string().contains("/nonexistent/cert.pem"));
    }

    #[test]
    fn files_without_pem_material_are_rejected() {
        let cert = scratch_file("cert.pem", "not a certificate\n");
        let key = scratch_file("key.pem", "not a key\n");
        let err = TlsConfig::new(&cert, &key).acceptor().err().unwrap();
        assert!(err.to_string().contains("no certificates found"));

        let _ = std::fs::remove_file(cert);
        let _ = std::fs::remove_file(key);
    }
}
