use crate::core::engine::reader::{ReadStopReason, ReplyReader};
use crate::core::error::{ProbeError, Stage};
use crate::core::tls::{self, TlsMode};
use openssl::x509::X509;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_openssl::SslStream;
use tracing::debug;

const MAX_REPLY_BYTES: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Reply {
    pub ok: bool,
    pub text: String,
}

impl Reply {
    fn parse(stage: Stage, line: String) -> Result<Self, ProbeError> {
        if line.starts_with("+OK") {
            Ok(Reply { ok: true, text: line })
        } else if line.starts_with("-ERR") {
            Ok(Reply { ok: false, text: line })
        } else {
            Err(ProbeError::UnexpectedReply { stage, reply: line })
        }
    }
}

/// A POP3 session that has received a positive greeting. Dropping it closes
/// the underlying connection.
pub(crate) struct Pop3Session<S> {
    stream: S,
    reader: ReplyReader,
    limit: Duration,
}

impl Pop3Session<SslStream<TcpStream>> {
    /// Connects to `address`, completes the TLS handshake and reads the
    /// greeting. `limit` bounds each step separately.
    pub(crate) async fn dial(
        address: &str,
        mode: &TlsMode,
        extra_roots: &[X509],
        limit: Duration,
    ) -> Result<Self, ProbeError> {
        let tcp = match timeout(limit, TcpStream::connect(address)).await {
            Ok(Ok(tcp)) => tcp,
            Ok(Err(source)) => {
                return Err(ProbeError::Connect {
                    address: address.to_string(),
                    source,
                })
            }
            Err(_) => {
                return Err(ProbeError::Timeout {
                    stage: Stage::Connect,
                    after: limit,
                })
            }
        };
        debug!(address, "tcp connected");

        let stream = tls::handshake(tcp, mode, extra_roots, address, limit).await?;
        debug!(address, "tls established");

        Self::open(stream, address, limit).await
    }
}

impl<S> Pop3Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub(crate) async fn open(stream: S, address: &str, limit: Duration) -> Result<Self, ProbeError> {
        let mut session = Self {
            stream,
            reader: ReplyReader::new(MAX_REPLY_BYTES, limit),
            limit,
        };

        let greeting = match session.reply(Stage::Greeting).await {
            Ok(reply) => reply,
            Err(ProbeError::UnexpectedReply { reply, .. }) => {
                return Err(ProbeError::Greeting {
                    address: address.to_string(),
                    reply,
                })
            }
            Err(ProbeError::Io { source, .. }) => {
                return Err(ProbeError::Greeting {
                    address: address.to_string(),
                    reply: format!("no greeting received: {source}"),
                })
            }
            Err(err) => return Err(err),
        };
        if !greeting.ok {
            return Err(ProbeError::Greeting {
                address: address.to_string(),
                reply: greeting.text,
            });
        }

        debug!(address, greeting = %greeting.text, "pop3 session open");
        Ok(session)
    }

    /// USER/PASS login.
    pub(crate) async fn auth(&mut self, username: &str, password: &str) -> Result<(), ProbeError> {
        let reply = self.command(Stage::Auth, &format!("USER {username}")).await?;
        if !reply.ok {
            return Err(ProbeError::Auth {
                username: username.to_string(),
                reply: reply.text,
            });
        }

        let reply = self.command(Stage::Auth, &format!("PASS {password}")).await?;
        if !reply.ok {
            return Err(ProbeError::Auth {
                username: username.to_string(),
                reply: reply.text,
            });
        }

        debug!(username, "pop3 login accepted");
        Ok(())
    }

    /// Sends QUIT and shuts the transport down.
    pub(crate) async fn quit(mut self) -> Result<(), ProbeError> {
        let reply = self.command(Stage::Quit, "QUIT").await;

        match timeout(self.limit, self.stream.shutdown()).await {
            Ok(Err(err)) => debug!(error = %err, "transport shutdown failed"),
            Err(_) => debug!("transport shutdown timed out"),
            Ok(Ok(())) => {}
        }

        let reply = reply?;
        if reply.ok {
            Ok(())
        } else {
            Err(ProbeError::UnexpectedReply {
                stage: Stage::Quit,
                reply: reply.text,
            })
        }
    }

    async fn command(&mut self, stage: Stage, line: &str) -> Result<Reply, ProbeError> {
        self.send(stage, line).await?;
        self.reply(stage).await
    }

    async fn send(&mut self, stage: Stage, line: &str) -> Result<(), ProbeError> {
        let mut wire = Vec::with_capacity(line.len() + 2);
        wire.extend_from_slice(line.as_bytes());
        wire.extend_from_slice(b"\r\n");

        let limit = self.limit;
        let stream = &mut self.stream;
        let write = async move {
            stream.write_all(&wire).await?;
            stream.flush().await
        };
        match timeout(limit, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(ProbeError::Io { stage, source }),
            Err(_) => Err(ProbeError::Timeout {
                stage,
                after: limit,
            }),
        }
    }

    async fn reply(&mut self, stage: Stage) -> Result<Reply, ProbeError> {
        let res = self
            .reader
            .read_line(&mut self.stream)
            .await
            .map_err(|source| ProbeError::Io { stage, source })?;

        match res.reason {
            ReadStopReason::Timeout => Err(ProbeError::Timeout {
                stage,
                after: self.limit,
            }),
            ReadStopReason::ConnectionClosed => Err(ProbeError::Io {
                stage,
                source: std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed by server",
                ),
            }),
            ReadStopReason::SizeLimit => Err(ProbeError::UnexpectedReply {
                stage,
                reply: format!("{}... (longer than {MAX_REPLY_BYTES} bytes)", res.text()),
            }),
            ReadStopReason::Delimiter => Reply::parse(stage, res.text()),
        }
    }
}
