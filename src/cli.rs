use crate::core::model::{Config, OutputConfig, OutputFormat, Test, TestOptions};
use crate::core::registry::Registry;
use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::fmt::Write;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(author, version, about = "Run protocol probes against network services", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a probe against one or more targets
    Run(RunArgs),
    /// Show usage text and arguments of registered probes
    Examples {
        /// Only show this probe
        #[arg(long = "probe", value_name = "NAME")]
        probe: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Registered probe name
    #[arg(long = "probe", default_value = "pop3s")]
    pub probe: String,

    /// Host or address to probe; repeat for several targets
    #[arg(short = 't', long = "target", value_name = "HOST", required = true)]
    pub targets: Vec<String>,

    /// Rule text; its first word is the hostname certificates are checked against
    #[arg(short = 'i', long = "input", value_name = "TEXT")]
    pub input: Option<String>,

    /// Probe argument, repeatable
    #[arg(short = 'a', long = "arg", value_name = "NAME=VALUE", value_parser = parse_argument)]
    pub arguments: Vec<(String, String)>,

    /// Timeout for connecting and for each protocol exchange, in milliseconds
    #[arg(long = "timeout", default_value_t = 10_000)]
    pub timeout_ms: u64,

    /// Targets probed at the same time
    #[arg(long = "concurrency", default_value_t = 8)]
    pub concurrency: usize,

    /// Output format
    #[arg(long = "output", default_value_t = OutputFormat::Jsonl)]
    pub output: OutputFormat,

    /// Human-readable output instead of JSONL
    #[arg(long = "pretty", action = ArgAction::SetTrue)]
    pub pretty: bool,
}

fn parse_argument(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got {raw:?}")),
    }
}

impl RunArgs {
    pub fn into_config(self, registry: &Registry) -> anyhow::Result<Config> {
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be greater than zero");
        }

        if self.timeout_ms == 0 {
            anyhow::bail!("timeout must be greater than zero");
        }

        let probe = registry.lookup(&self.probe).with_context(|| {
            let known: Vec<&str> = registry.names().collect();
            format!("unknown probe {:?} (known: {})", self.probe, known.join(", "))
        })?;

        let input = match self.input {
            Some(input) => input,
            None => format!("{} must run {}", self.targets[0], self.probe),
        };
        let mut test = Test::new(input);
        test.arguments.extend(self.arguments);

        probe
            .arguments()
            .validate(&test.arguments)
            .with_context(|| format!("invalid arguments for {}", self.probe))?;

        Ok(Config {
            probe: self.probe,
            targets: self.targets,
            test,
            options: TestOptions {
                timeout: Duration::from_millis(self.timeout_ms),
            },
            concurrency: self.concurrency,
            output: OutputConfig {
                format: if self.pretty {
                    OutputFormat::Pretty
                } else {
                    self.output
                },
            },
        })
    }
}

/// Usage text and argument table for one probe, or all of them.
pub fn render_examples(registry: &Registry, only: Option<&str>) -> anyhow::Result<String> {
    let names: Vec<&str> = match only {
        Some(name) => vec![name],
        None => registry.names().collect(),
    };

    let mut out = String::new();
    for name in names {
        let probe = registry
            .lookup(name)
            .with_context(|| format!("unknown probe {name:?}"))?;
        writeln!(out, "{}", probe.example().trim_end())?;
        writeln!(out, "\n Arguments ({name}):")?;
        for (arg, pattern) in probe.arguments().iter() {
            writeln!(out, "    {arg:<10} {pattern}")?;
        }
        writeln!(out)?;
    }
    Ok(out)
}
