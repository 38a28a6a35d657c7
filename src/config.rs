use std::path::PathBuf;
use anyhow::{bail, Context};

use crate::chord_filter::MIN_HOLD_MS;
use crate::melody::{builtin_melodies, parse_melodies, Melody};

pub const USAGE: &str = "options: [--melodies <file>] [--min-hold-ms <ms>] [--no-echo] [--verbose|-v]";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ListenerConfig {
    pub melodies: Option<PathBuf>,
    pub min_hold_ms: u64,
    pub echo: bool,
    pub verbose: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        ListenerConfig {melodies: None, min_hold_ms: MIN_HOLD_MS, echo: true, verbose: false}
    }
}

impl ListenerConfig {
    /// Arguments after the program name.
    pub fn from_args<I: Iterator<Item = String>>(mut args: I) -> anyhow::Result<Self> {
        let mut config = Self::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--melodies" => {
                    let path = args.next().context("--melodies needs a file name")?;
                    config.melodies = Some(PathBuf::from(path));
                }
                "--min-hold-ms" => {
                    let ms = args.next().context("--min-hold-ms needs a value")?;
                    config.min_hold_ms = ms
                        .parse::<u64>()
                        .with_context(|| format!("--min-hold-ms: `{ms}` is not a whole number"))?;
                }
                "--no-echo" => config.echo = false,
                "--verbose" | "-v" => config.verbose = true,
                other => bail!("unknown argument `{other}`\n{USAGE}"),
            }
        }
        Ok(config)
    }

    /// For tools that record melodies rather than match them.
    pub fn without_melodies(self) -> anyhow::Result<Self> {
        if let Some(path) = self.melodies.as_ref() {
            bail!("--melodies {} has no effect here\n{USAGE}", path.display());
        }
        Ok(self)
    }

    /// Melodies from the configured file, or the built-in set.
    pub fn load_melodies(&self) -> anyhow::Result<Vec<Melody>> {
        match &self.melodies {
            None => Ok(builtin_melodies()?),
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                let melodies = parse_melodies(text.as_str())
                    .with_context(|| format!("parsing {}", path.display()))?;
                if melodies.is_empty() {
                    bail!("{} defines no melodies", path.display());
                }
                Ok(melodies)
            }
        }
    }
}

/// `RUST_LOG` wins over the verbosity flag.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}
