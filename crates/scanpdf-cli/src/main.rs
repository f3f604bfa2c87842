//! scanpdf - Scan a single page from a SANE device into a PDF
//!
//! This tool opens a scanner through the system SANE library, configures it
//! from `-o name=value` overrides and writes the scanned page to a PDF.

use anyhow::{Context, Result};
use clap::parser::ValueSource;
use clap::{ArgAction, ArgMatches, CommandFactory, FromArgMatches, Parser};
use scanpdf_core::config::DEFAULT_OUTPUT;
use scanpdf_core::device::overrides::scan_int;
use scanpdf_core::{pipeline, Backend, Operation, ScanConfig};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, warn, Level};
use tracing_subscriber::EnvFilter;

/// Exit status for every fatal error
const FAILURE: u8 = 255;

/// Scan a single page from a SANE device into a PDF
#[derive(Parser, Debug)]
#[command(name = "scanpdf")]
#[command(author, version, about, long_about = None)]
#[command(disable_help_flag = true, args_override_self = true)]
struct Cli {
    /// Print help and exit
    #[arg(short = 'h', long = "help", action = ArgAction::SetTrue)]
    help: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// List devices and exit
    #[arg(short = 'L', long)]
    list_devices: bool,

    /// List the options of the selected device instead of scanning
    #[arg(short = 'O', long)]
    list_options: bool,

    /// Draw a date/user annotation onto the scanned page
    #[arg(short, long)]
    annotate: bool,

    /// Device number, as printed by -L
    #[arg(short, long, default_value = "0", allow_hyphen_values = true)]
    device: String,

    /// Output PDF file
    #[arg(short = 'f', long = "file", value_name = "FILE", default_value = DEFAULT_OUTPUT)]
    file: PathBuf,

    /// Set a device option (repeatable; the first value for a name is used)
    #[arg(short = 'o', long = "option", value_name = "NAME=VALUE")]
    options: Vec<String>,
}

/// Modes that finish before any device is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Immediate {
    Help,
    ListDevices,
}

/// Returns the immediate mode given first on the command line, if any
fn immediate_mode(matches: &ArgMatches) -> Option<Immediate> {
    [("help", Immediate::Help), ("list_devices", Immediate::ListDevices)]
        .into_iter()
        .filter(|(id, _)| matches.value_source(id) == Some(ValueSource::CommandLine))
        .filter_map(|(id, mode)| matches.index_of(id).map(|index| (index, mode)))
        .min_by_key(|(index, _)| *index)
        .map(|(_, mode)| mode)
}

/// Reads the device number the way `%d` does: a leading integer, else 0
fn device_index(raw: &str) -> i64 {
    scan_int(raw).map(i64::from).unwrap_or_else(|| {
        debug!("Device number {:?} is not a number, using 0", raw);
        0
    })
}

/// Collects `name=value` tokens; tokens without `=` are dropped and a
/// repeated name keeps its first value
fn parse_overrides(tokens: &[String]) -> BTreeMap<String, String> {
    let mut overrides = BTreeMap::new();
    for token in tokens {
        let Some((name, value)) = token.split_once('=') else {
            debug!("Ignoring malformed option override: {}", token);
            continue;
        };
        overrides
            .entry(name.to_string())
            .or_insert_with(|| value.to_string());
    }
    overrides
}

fn build_config(cli: &Cli, user: Option<String>) -> ScanConfig {
    let operation = if cli.list_options {
        Operation::DumpOptions
    } else {
        Operation::Scan
    };

    ScanConfig::new()
        .device_index(device_index(&cli.device))
        .output(&cli.file)
        .annotate(cli.annotate)
        .user(user)
        .operation(operation)
        .overrides(parse_overrides(&cli.options))
}

fn main() -> ExitCode {
    let matches = Cli::command().get_matches();
    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match run(&cli, immediate_mode(&matches)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::from(FAILURE)
        }
    }
}

fn run(cli: &Cli, immediate: Option<Immediate>) -> Result<()> {
    if immediate == Some(Immediate::Help) {
        Cli::command()
            .print_help()
            .context("Failed to print help")?;
        return Ok(());
    }

    let mut backend = open_backend()?;
    let mut stdout = io::stdout().lock();

    if immediate == Some(Immediate::ListDevices) {
        pipeline::list_devices(&mut *backend, &mut stdout)?;
        return Ok(());
    }

    let config = build_config(cli, std::env::var("USER").ok());
    if config.annotate && config.user.is_none() {
        warn!("USER is not set, annotation will carry the time only");
    }

    pipeline::run(&mut *backend, &config, &mut stdout)?;
    stdout.flush()?;
    Ok(())
}

#[cfg(feature = "sane")]
fn open_backend() -> Result<Box<dyn Backend>> {
    let backend = scanpdf_core::SaneBackend::init()?;
    Ok(Box::new(backend))
}

#[cfg(not(feature = "sane"))]
fn open_backend() -> Result<Box<dyn Backend>> {
    anyhow::bail!("scanpdf was built without SANE support (enable the `sane` feature)")
}
