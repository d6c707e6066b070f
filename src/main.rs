use clap::Parser;
use protocol_tester::cli::{render_examples, Cli, Command};
use protocol_tester::core::engine::Engine;
use protocol_tester::core::registry::Registry;
use protocol_tester::output::OutputSink;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let registry = Registry::builtin();

    match cli.command {
        Command::Examples { probe } => {
            print!("{}", render_examples(&registry, probe.as_deref())?);
        }
        Command::Run(args) => {
            let cfg = args.into_config(&registry)?;
            let probe = registry
                .lookup(&cfg.probe)
                .ok_or_else(|| anyhow::anyhow!("unknown probe {}", cfg.probe))?;

            let sink = OutputSink::new(cfg.output.clone())?;
            let mut engine = Engine::new(cfg, probe, sink.clone())?;
            let summary = engine.run().await?;
            sink.shutdown().await?;

            if !summary.all_passed() {
                anyhow::bail!(
                    "{} of {} probes failed",
                    summary.failed,
                    summary.failed + summary.passed
                );
            }
        }
    }

    Ok(())
}
