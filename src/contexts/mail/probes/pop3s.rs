use crate::contexts::mail::clients::Pop3Session;
use crate::core::error::ProbeError;
use crate::core::model::{ArgumentSchema, Test, TestOptions};
use crate::core::tls::TlsMode;
use crate::core::traits::ProtocolTest;
use async_trait::async_trait;
use openssl::x509::X509;
use tracing::{debug, instrument, warn};

pub const DEFAULT_PORT: u16 = 995;

const EXAMPLE: &str = "
POP3S Tester
------------
 The POP3S tester connects to a remote host and ensures that this
 succeeds.  If you supply a username & password a login will be
 made, and the test will fail if this login fails.

 This test is invoked via input like so:

    host.example.com must run pop3s

 Credentials are supplied like so:

    host.example.com must run pop3s with username 'steve' with password 'secret'

 Because POP3S uses TLS it will test the validity of the certificate as
 part of the test, if you wish to disable this add 'with tls insecure'.
";

/// POP3 over implicit TLS: connect, optionally log in, quit.
#[derive(Clone, Default)]
pub struct Pop3sTest {
    extra_roots: Vec<X509>,
}

impl Pop3sTest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trusts `roots` in addition to the platform store when verifying.
    pub fn with_trusted_roots(roots: Vec<X509>) -> Self {
        Self { extra_roots: roots }
    }
}

#[async_trait]
impl ProtocolTest for Pop3sTest {
    fn arguments(&self) -> ArgumentSchema {
        ArgumentSchema::new()
            .with("port", "^[0-9]+$")
            .with("tls", "insecure")
            .with("username", ".*")
            .with("password", ".*")
    }

    fn example(&self) -> &'static str {
        EXAMPLE
    }

    #[instrument(name = "pop3s", skip(self, test, opts), fields(timeout_ms = opts.timeout.as_millis() as u64))]
    async fn run_test(
        &self,
        test: &Test,
        target: &str,
        opts: &TestOptions,
    ) -> Result<(), ProbeError> {
        let port = port_argument(test)?;
        let address = dial_address(target, port);
        let mode = tls_mode(test)?;
        debug!(%address, verify = mode.verifies_peer(), server_name = ?mode.server_name(), "dialing");

        let mut session =
            Pop3Session::dial(&address, &mode, &self.extra_roots, opts.timeout).await?;

        if let Some((username, password)) = credentials(test) {
            // An error here drops `session`, which closes the connection.
            session.auth(username, password).await?;
        }

        if let Err(err) = session.quit().await {
            warn!(%address, error = %err, "graceful close failed");
        }

        Ok(())
    }
}

pub(crate) fn port_argument(test: &Test) -> Result<u16, ProbeError> {
    match test.argument("port") {
        None => Ok(DEFAULT_PORT),
        Some(raw) => raw
            .parse::<u16>()
            .map_err(|err| ProbeError::invalid_argument("port", raw, err.to_string())),
    }
}

/// Joins host and port, bracketing anything containing a colon as an IPv6
/// literal. A hostname with a colon in it is misread as IPv6.
pub(crate) fn dial_address(target: &str, port: u16) -> String {
    if target.contains(':') {
        format!("[{target}]:{port}")
    } else {
        format!("{target}:{port}")
    }
}

/// The certificate is checked against the first token of the rule text, not
/// against `target`, so an address can be probed under its service name.
pub(crate) fn tls_mode(test: &Test) -> Result<TlsMode, ProbeError> {
    if test.argument("tls") == Some("insecure") {
        return Ok(TlsMode::Insecure);
    }

    let server_name = test.hostname().ok_or_else(|| {
        ProbeError::invalid_argument("input", &test.input, "no hostname to verify the certificate")
    })?;
    Ok(TlsMode::Verify {
        server_name: server_name.to_string(),
    })
}

pub(crate) fn credentials(test: &Test) -> Option<(&str, &str)> {
    Some((test.argument("username")?, test.argument("password")?))
}
