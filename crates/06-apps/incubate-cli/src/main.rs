//! Command-line driver that stamps out copies of a JSON document.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use incubator::{CountingExceptionHandler, ErrorKind, Incubator, IncubatorConfig};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Deep-copy JSON documents through pooled streams")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy a document repeatedly and verify every copy
    Copy {
        /// JSON document to copy; reads stdin when omitted
        #[arg(long)]
        input: Option<PathBuf>,

        /// Copies made by each thread
        #[arg(long, default_value_t = 1000)]
        copies: usize,

        /// Worker threads sharing the incubator
        #[arg(long, default_value_t = 4)]
        threads: usize,

        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the last copy to stdout
        #[arg(long)]
        print: bool,
    },
    /// Print the effective configuration as TOML
    Config {
        /// TOML configuration file to merge over the defaults
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    init_tracing();

    match Cli::parse().command {
        Command::Copy {
            input,
            copies,
            threads,
            config,
            print,
        } => {
            let config = load_config(config.as_deref())?;
            let template = read_template(input.as_deref())?;
            run_copies(config, &template, copies, threads.max(1), print)
        }
        Command::Config { config } => {
            let config = load_config(config.as_deref())?;
            let text = toml::to_string_pretty(&config).context("failed to render config")?;
            print!("{text}");
            Ok(())
        }
    }
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Ignore error if already set.
    let _ = fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<IncubatorConfig> {
    let Some(path) = path else {
        return Ok(IncubatorConfig::default());
    };
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    IncubatorConfig::from_toml_str(&text)
        .with_context(|| format!("invalid config {}", path.display()))
}

fn read_template(path: Option<&Path>) -> Result<Value> {
    let text = match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            text
        }
    };
    serde_json::from_str(&text).context("input is not valid JSON")
}

/// Outcome of a batch of copies.
#[derive(Debug, Default)]
struct CopyTally {
    copied: usize,
    mismatched: usize,
    failed: usize,
    panicked: usize,
    last: Option<Value>,
}

impl CopyTally {
    fn merge(&mut self, other: CopyTally) {
        self.copied += other.copied;
        self.mismatched += other.mismatched;
        self.failed += other.failed;
        self.panicked += other.panicked;
        if other.last.is_some() {
            self.last = other.last;
        }
    }

    /// Fails unless every copy came back equal to the template.
    fn verdict(&self) -> Result<()> {
        if self.panicked > 0 {
            bail!("{} worker thread(s) panicked", self.panicked);
        }
        if self.mismatched > 0 {
            bail!("{} copies differed from the template", self.mismatched);
        }
        if self.failed > 0 {
            bail!("{} copies failed", self.failed);
        }
        Ok(())
    }
}

/// Makes `copies` copies of `template` on each of `threads` threads and
/// checks every one against it.
fn copy_concurrently(
    incubator: &Incubator,
    template: &Value,
    copies: usize,
    threads: usize,
) -> CopyTally {
    thread::scope(|scope| {
        let workers: Vec<_> = (0..threads)
            .map(|_| {
                scope.spawn(move || {
                    let mut tally = CopyTally::default();
                    for _ in 0..copies {
                        match incubator.born(template) {
                            Some(copy) if &copy == template => {
                                tally.copied += 1;
                                tally.last = Some(copy);
                            }
                            Some(_) => tally.mismatched += 1,
                            None => tally.failed += 1,
                        }
                    }
                    tally
                })
            })
            .collect();

        let mut total = CopyTally::default();
        for worker in workers {
            match worker.join() {
                Ok(tally) => total.merge(tally),
                Err(_) => total.panicked += 1,
            }
        }
        total
    })
}

fn run_copies(
    config: IncubatorConfig,
    template: &Value,
    copies: usize,
    threads: usize,
    print: bool,
) -> Result<()> {
    let counter = CountingExceptionHandler::new();
    let incubator = Incubator::builder()
        .config(config)
        .exception_handler(counter.clone())
        .build()
        .context("failed to build incubator")?;
    let guard = incubator.shutdown_guard();

    let started = Instant::now();
    let tally = copy_concurrently(&guard, template, copies, threads);
    let elapsed = started.elapsed();

    let resources = guard.resource_stats();
    let serializers = guard.serializer_stats();
    info!(
        copied = tally.copied,
        failed = tally.failed,
        elapsed_ms = elapsed.as_millis() as u64,
        stream_pairs_created = resources.created,
        serializers_created = serializers.created,
        "incubation finished"
    );
    for kind in ErrorKind::ALL {
        let count = counter.count(kind);
        if count > 0 {
            warn!(?kind, count, "failures reported");
        }
    }

    if print {
        if let Some(last) = &tally.last {
            let text = serde_json::to_string_pretty(last).context("failed to render copy")?;
            println!("{text}");
        }
    }

    tally.verdict()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "title": "inventory",
            "items": [{ "sku": "A-1", "count": 3 }, { "sku": "B-2", "count": 0 }],
            "tags": ["warehouse", "north"]
        })
    }

    #[test]
    fn every_copy_is_verified() {
        let incubator = Incubator::new().unwrap();
        let tally = copy_concurrently(&incubator, &document(), 25, 3);

        assert_eq!(tally.copied, 75);
        assert_eq!(tally.failed, 0);
        assert_eq!(tally.mismatched, 0);
        assert_eq!(tally.last, Some(document()));
        assert!(tally.verdict().is_ok());
    }

    #[test]
    fn failed_copies_fail_the_run() {
        let counter = CountingExceptionHandler::new();
        let mut config = IncubatorConfig::default();
        config.stream.capacity_bytes = 8;
        let incubator = Incubator::builder()
            .config(config)
            .exception_handler(counter.clone())
            .build()
            .unwrap();

        let tally = copy_concurrently(&incubator, &document(), 5, 2);
        assert_eq!(tally.copied, 0);
        assert_eq!(tally.failed, 10);
        assert_eq!(counter.count(ErrorKind::Codec), 10);

        let err = tally.verdict().unwrap_err();
        assert_eq!(err.to_string(), "10 copies failed");
    }

    #[test]
    fn mismatched_copies_fail_the_run() {
        let tally = CopyTally {
            copied: 4,
            mismatched: 1,
            ..CopyTally::default()
        };
        let err = tally.verdict().unwrap_err();
        assert_eq!(err.to_string(), "1 copies differed from the template");
    }
}
