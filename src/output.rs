use crate::core::model::{OutputConfig, OutputFormat, ProbeOutcome};
use std::io::{BufWriter, Write};
use tokio::sync::mpsc;

/// Serialises outcomes to stdout from a dedicated blocking writer so probe
/// tasks never block on terminal I/O.
#[derive(Clone)]
pub struct OutputSink {
    inner: std::sync::Arc<OutputInner>,
}

struct OutputInner {
    tx: tokio::sync::Mutex<Option<mpsc::Sender<ProbeOutcome>>>,
    handle: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl OutputSink {
    pub fn new(cfg: OutputConfig) -> anyhow::Result<Self> {
        let (tx, rx) = mpsc::channel(1024);
        let handle = tokio::task::spawn_blocking(move || run_writer(cfg, rx));

        Ok(Self {
            inner: std::sync::Arc::new(OutputInner {
                tx: tokio::sync::Mutex::new(Some(tx)),
                handle: tokio::sync::Mutex::new(Some(handle)),
            }),
        })
    }

    pub async fn emit(&self, outcome: ProbeOutcome) -> anyhow::Result<()> {
        let guard = self.inner.tx.lock().await;
        match guard.as_ref() {
            Some(tx) => tx
                .send(outcome)
                .await
                .map_err(|err| anyhow::anyhow!("output worker not available: {err}")),
            None => anyhow::bail!("output worker not available; dropping probe outcome"),
        }
    }

    /// Flushes pending outcomes and waits for the writer to finish.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.inner.tx.lock().await.take();

        if let Some(handle) = self.inner.handle.lock().await.take() {
            handle
                .await
                .map_err(|err| anyhow::anyhow!("failed to join output worker: {err}"))?;
        }

        Ok(())
    }
}

fn run_writer(cfg: OutputConfig, mut rx: mpsc::Receiver<ProbeOutcome>) {
    let stdout = std::io::stdout();
    let mut writer = BufWriter::new(stdout.lock());

    while let Some(outcome) = rx.blocking_recv() {
        if let Err(err) = write_outcome(&cfg.format, &mut writer, &outcome) {
            tracing::error!(error = %err, "failed to write probe outcome");
        }
    }

    let _ = writer.flush();
}

pub(crate) fn write_outcome<W: Write>(
    format: &OutputFormat,
    writer: &mut W,
    outcome: &ProbeOutcome,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Jsonl => {
            let line = serde_json::to_string(outcome)?;
            writeln!(writer, "{line}")?;
        }
        OutputFormat::Pretty => {
            writeln!(
                writer,
                "{} {} -> {} ({} ms)",
                outcome.probe, outcome.target, outcome.status, outcome.elapsed_ms
            )?;
            if let Some(err) = &outcome.error {
                writeln!(writer, "  error: [{}] {}", err.kind, err.message)?;
            }
        }
    }

    writer.flush()?;
    Ok(())
}
