use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::{timeout_at, Instant};

const CHUNK: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStopReason {
    ConnectionClosed,
    Delimiter,
    SizeLimit,
    Timeout,
}

#[derive(Debug, Clone)]
pub struct ReadResult {
    pub bytes: Vec<u8>,
    pub reason: ReadStopReason,
}

impl ReadResult {
    pub fn text(&self) -> String {
        crate::util::sanitize_text(&self.bytes)
            .trim_end_matches(['\r', '\n'])
            .to_string()
    }
}

/// Reads newline-terminated replies off a stream. Bytes received past the
/// end of one reply are kept for the next call.
pub struct ReplyReader {
    max_bytes: usize,
    reply_timeout: Duration,
    pending: Vec<u8>,
}

impl ReplyReader {
    /// `reply_timeout` bounds each whole reply, however the peer paces it.
    pub fn new(max_bytes: usize, reply_timeout: Duration) -> Self {
        Self {
            max_bytes: max_bytes.max(1),
            reply_timeout,
            pending: Vec::new(),
        }
    }

    pub async fn read_line<T: AsyncRead + Unpin>(
        &mut self,
        stream: &mut T,
    ) -> std::io::Result<ReadResult> {
        let deadline = Instant::now() + self.reply_timeout;
        let mut chunk = [0u8; CHUNK];
        loop {
            let window = self.pending.len().min(self.max_bytes);
            if let Some(pos) = self.pending[..window].iter().position(|&b| b == b'\n') {
                return Ok(self.take(pos + 1, ReadStopReason::Delimiter));
            }
            if self.pending.len() >= self.max_bytes {
                return Ok(self.take(self.max_bytes, ReadStopReason::SizeLimit));
            }

            match timeout_at(deadline, stream.read(&mut chunk)).await {
                Ok(Ok(0)) => {
                    let len = self.pending.len();
                    return Ok(self.take(len, ReadStopReason::ConnectionClosed));
                }
                Ok(Ok(n)) => self.pending.extend_from_slice(&chunk[..n]),
                Ok(Err(err)) => return Err(err),
                Err(_) => {
                    let len = self.pending.len();
                    return Ok(self.take(len, ReadStopReason::Timeout));
                }
            }
        }
    }

    fn take(&mut self, len: usize, reason: ReadStopReason) -> ReadResult {
        let rest = self.pending.split_off(len);
        let bytes = std::mem::replace(&mut self.pending, rest);
        ReadResult { bytes, reason }
    }
}
