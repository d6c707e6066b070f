use crate::core::error::{ErrorKind, ProbeError};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A single rule handed to a probe: the raw rule text plus the arguments the
/// rule parser extracted from it.
#[derive(Debug, Clone, Default)]
pub struct Test {
    pub input: String,
    pub arguments: HashMap<String, String>,
}

impl Test {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            arguments: HashMap::new(),
        }
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    /// Returns the value of `name`, treating an empty value as not supplied.
    pub fn argument(&self, name: &str) -> Option<&str> {
        self.arguments
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// First whitespace-delimited token of the rule text.
    pub fn hostname(&self) -> Option<&str> {
        self.input.split_whitespace().next()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TestOptions {
    pub timeout: Duration,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Argument names a probe understands, each paired with the regular
/// expression its value must match. Patterns are compiled once, when declared.
#[derive(Debug, Clone, Default)]
pub struct ArgumentSchema {
    patterns: BTreeMap<String, Pattern>,
}

#[derive(Debug, Clone)]
struct Pattern {
    source: String,
    compiled: Result<Regex, regex::Error>,
}

impl ArgumentSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `name`. A pattern that fails to compile is kept and reported
    /// by `validate` when a value for `name` is supplied.
    pub fn with(mut self, name: impl Into<String>, pattern: impl Into<String>) -> Self {
        let source = pattern.into();
        let compiled = Regex::new(&source);
        self.patterns.insert(name.into(), Pattern { source, compiled });
        self
    }

    pub fn pattern(&self, name: &str) -> Option<&str> {
        self.patterns.get(name).map(|p| p.source.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.patterns.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.patterns
            .iter()
            .map(|(name, p)| (name.as_str(), p.source.as_str()))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Checks supplied arguments against the schema. Unknown names are
    /// rejected; empty values count as not supplied and are skipped. Patterns
    /// are matched unanchored, so only patterns carrying `^`/`$` pin the
    /// whole value.
    pub fn validate(&self, arguments: &HashMap<String, String>) -> Result<(), ProbeError> {
        let mut names: Vec<&String> = arguments.keys().collect();
        names.sort();

        for name in names {
            let value = &arguments[name];
            let pattern = self
                .patterns
                .get(name)
                .ok_or_else(|| ProbeError::invalid_argument(name, value, "unknown argument"))?;

            if value.is_empty() {
                continue;
            }

            let re = pattern.compiled.as_ref().map_err(|err| {
                ProbeError::invalid_argument(
                    name,
                    value,
                    format!("bad pattern {}: {err}", pattern.source),
                )
            })?;
            if !re.is_match(value) {
                return Err(ProbeError::invalid_argument(
                    name,
                    value,
                    format!("does not match {}", pattern.source),
                ));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Passed,
    Failed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Passed => write!(f, "passed"),
            Status::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub kind: ErrorKind,
    pub message: String,
}

/// What the runner reports for one probe invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeOutcome {
    pub probe: String,
    pub target: String,
    pub status: Status,
    pub elapsed_ms: u128,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Diagnostics>,
}

impl ProbeOutcome {
    pub fn from_result(
        probe: &str,
        target: &str,
        elapsed_ms: u128,
        result: Result<(), ProbeError>,
    ) -> Self {
        let (status, error) = match result {
            Ok(()) => (Status::Passed, None),
            Err(err) => (
                Status::Failed,
                Some(Diagnostics {
                    kind: err.kind(),
                    message: err.to_string(),
                }),
            ),
        };

        Self {
            probe: probe.to_string(),
            target: target.to_string(),
            status,
            elapsed_ms,
            timestamp: chrono::Utc::now().to_rfc3339(),
            error,
        }
    }

    pub fn passed(&self) -> bool {
        self.status == Status::Passed
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum OutputFormat {
    Jsonl,
    Pretty,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Jsonl => write!(f, "jsonl"),
            OutputFormat::Pretty => write!(f, "pretty"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

/// Settings for one run of the command-line driver.
#[derive(Debug, Clone)]
pub struct Config {
    pub probe: String,
    pub targets: Vec<String>,
    pub test: Test,
    pub options: TestOptions,
    pub concurrency: usize,
    pub output: OutputConfig,
}
