use crate::core::error::{ProbeError, Stage};
use openssl::error::ErrorStack;
use openssl::ssl::{Ssl, SslConnector, SslMethod, SslVerifyMode};
use openssl::x509::{X509VerifyResult, X509};
use std::pin::Pin;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;
use tokio_openssl::SslStream;

/// How a probe treats the server certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsMode {
    /// Verify the chain against the trust store and the certificate against
    /// `server_name`, which is also sent as SNI.
    Verify { server_name: String },
    /// Accept any certificate; no server name is sent.
    Insecure,
}

impl TlsMode {
    pub fn verifies_peer(&self) -> bool {
        matches!(self, TlsMode::Verify { .. })
    }

    pub fn server_name(&self) -> Option<&str> {
        match self {
            TlsMode::Verify { server_name } => Some(server_name),
            TlsMode::Insecure => None,
        }
    }
}

/// Builds a connector for `mode`. `extra_roots` are trusted on top of the
/// platform store and ignored in insecure mode.
pub fn connector(mode: &TlsMode, extra_roots: &[X509]) -> Result<SslConnector, ErrorStack> {
    let mut builder = SslConnector::builder(SslMethod::tls())?;
    match mode {
        TlsMode::Verify { .. } => {
            for root in extra_roots {
                builder.cert_store_mut().add_cert(root.clone())?;
            }
        }
        TlsMode::Insecure => builder.set_verify(SslVerifyMode::NONE),
    }
    Ok(builder.build())
}

fn configure(connector: &SslConnector, mode: &TlsMode) -> Result<Ssl, ErrorStack> {
    let config = connector.configure()?;
    match mode {
        TlsMode::Verify { server_name } => config.into_ssl(server_name),
        TlsMode::Insecure => config
            .verify_hostname(false)
            .use_server_name_indication(false)
            .into_ssl(""),
    }
}

/// Runs the client side of a TLS handshake over `stream`, bounded by `limit`.
pub async fn handshake<S>(
    stream: S,
    mode: &TlsMode,
    extra_roots: &[X509],
    address: &str,
    limit: Duration,
) -> Result<SslStream<S>, ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let tls_error = |message: String| ProbeError::Tls {
        address: address.to_string(),
        message,
    };

    let connector = connector(mode, extra_roots).map_err(|err| tls_error(err.to_string()))?;
    let ssl = configure(&connector, mode).map_err(|err| tls_error(err.to_string()))?;
    let mut tls = SslStream::new(ssl, stream).map_err(|err| tls_error(err.to_string()))?;

    let outcome = timeout(limit, Pin::new(&mut tls).connect()).await;
    match outcome {
        Ok(Ok(())) => Ok(tls),
        Ok(Err(err)) => {
            let verify = tls.ssl().verify_result();
            let message = if verify == X509VerifyResult::OK {
                err.to_string()
            } else {
                format!("{err} (certificate: {})", verify.error_string())
            };
            Err(tls_error(message))
        }
        Err(_) => Err(ProbeError::Timeout {
            stage: Stage::Handshake,
            after: limit,
        }),
    }
}
