pub mod reader;

use crate::core::model::{Config, ProbeOutcome};
use crate::core::traits::ProtocolTest;
use crate::output::OutputSink;
use crate::util::now_millis;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, instrument};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
}

impl Summary {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Runs one probe against every configured target, at most
/// `cfg.concurrency` at a time. Each target gets its own task and its own
/// connection.
pub struct Engine {
    cfg: Config,
    probe: Arc<dyn ProtocolTest>,
    sink: OutputSink,
    sem: Arc<Semaphore>,
}

impl Engine {
    pub fn new(cfg: Config, probe: Box<dyn ProtocolTest>, sink: OutputSink) -> anyhow::Result<Self> {
        if cfg.concurrency == 0 {
            anyhow::bail!("concurrency must be greater than zero");
        }

        Ok(Self {
            sem: Arc::new(Semaphore::new(cfg.concurrency)),
            probe: Arc::from(probe),
            cfg,
            sink,
        })
    }

    #[instrument(skip(self), fields(probe = %self.cfg.probe, targets = self.cfg.targets.len()))]
    pub async fn run(&mut self) -> anyhow::Result<Summary> {
        let test = Arc::new(self.cfg.test.clone());
        let mut tasks = FuturesUnordered::new();

        for target in self.cfg.targets.iter().cloned() {
            let permit = self.sem.clone().acquire_owned().await?;
            let probe = self.probe.clone();
            let test = test.clone();
            let opts = self.cfg.options;
            let name = self.cfg.probe.clone();
            let sink = self.sink.clone();

            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                let start = now_millis();
                let result = probe.run_test(&test, &target, &opts).await;
                let outcome = ProbeOutcome::from_result(&name, &target, now_millis() - start, result);
                debug!(target = %target, status = %outcome.status, ms = outcome.elapsed_ms, "probe finished");

                let passed = outcome.passed();
                if let Err(err) = sink.emit(outcome).await {
                    error!(error = %err, "failed to emit outcome");
                }
                passed
            }));
        }

        let mut summary = Summary::default();
        while let Some(joined) = tasks.next().await {
            match joined {
                Ok(true) => summary.passed += 1,
                Ok(false) => summary.failed += 1,
                Err(err) => {
                    error!(error = %err, "probe task panicked");
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }
}
