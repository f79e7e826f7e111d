//! CLI entrypoint for the futex lock contention benchmark.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::{ArgAction, Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use futex_wait::bench::{self, Backend, Config};
use futex_wait::report::Format;

/// Measures the throughput of a futex based mutex under contention.
#[derive(Debug, Parser)]
#[command(name = "futex-wait", version)]
#[command(about = "Benchmark lock/unlock throughput of a futex mutex under contention")]
struct Cli {
    /// Total lock/unlock iterations, split evenly among threads.
    #[arg(short, long, default_value_t = Config::ITERATIONS)]
    iterations: u64,
    /// Number of worker threads.
    #[arg(short, long, default_value_t = Config::THREADS)]
    threads: u32,
    /// Number of futexes, threads must be a multiple of it.
    #[arg(short, long, default_value_t = Config::FUTEXES)]
    futexes: u32,
    /// Use futex barriers instead of pipes to synchronize the timed window.
    #[arg(short = 's', long)]
    futex_for_sync: bool,
    /// Report format.
    #[arg(long, value_enum, default_value_t = ReportFormat::Default)]
    format: ReportFormat,
    /// Log more, repeat for even more.
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,
    /// Only log errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ReportFormat {
    /// Configuration, timing breakdown and throughput.
    Default,
    /// Throughput only.
    Simple,
}

impl From<ReportFormat> for Format {
    fn from(format: ReportFormat) -> Self {
        match format {
            ReportFormat::Default => Self::Default,
            ReportFormat::Simple => Self::Simple,
        }
    }
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            iterations: self.iterations,
            threads: self.threads,
            futexes: self.futexes,
            backend: if self.futex_for_sync { Backend::Futex } else { Backend::Handshake },
            format: self.format.into(),
        }
    }

    fn level(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "error",
            (false, 0) => "warn",
            (false, 1) => "info",
            (false, 2) => "debug",
            (false, _) => "trace",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.level()));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();

    let config = cli.config();
    let report = bench::run(&config).and_then(|outcome| outcome.report(&config));
    match report {
        Ok(report) => {
            let mut stdout = io::stdout().lock();
            match write!(stdout, "{}", report.display(config.format)) {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    tracing::error!(%err, "failed to write report");
                    ExitCode::FAILURE
                }
            }
        }
        Err(err) => {
            tracing::error!(%err, "benchmark failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod test {
    use clap::{CommandFactory, Parser};

    use super::Cli;
    use futex_wait::bench::{Backend, Config};
    use futex_wait::report::Format;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_match_config() {
        let cli = Cli::parse_from(["futex-wait"]);
        assert_eq!(cli.config(), Config::default());
        assert_eq!(cli.level(), "warn");
    }

    #[test]
    fn short_flags() {
        let cli = Cli::parse_from(["futex-wait", "-i", "1000", "-t", "8", "-f", "2", "-s"]);
        let config = cli.config();
        assert_eq!(config.iterations, 1000);
        assert_eq!(config.threads, 8);
        assert_eq!(config.futexes, 2);
        assert_eq!(config.backend, Backend::Futex);
    }

    #[test]
    fn simple_format_and_verbosity() {
        let cli = Cli::parse_from(["futex-wait", "--format", "simple", "-vv"]);
        assert_eq!(cli.config().format, Format::Simple);
        assert_eq!(cli.level(), "debug");
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["futex-wait", "-q", "-v"]).is_err());
        assert_eq!(Cli::parse_from(["futex-wait", "-q"]).level(), "error");
    }
}
