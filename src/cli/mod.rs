//! # CLI Module
//!
//! Command-line interface for the photo cache.
//!
//! ## Usage
//! ```bash
//! # Rebuild a target's cache now
//! photo update nas
//!
//! # Sort a folder of new photos against a target
//! photo filter nas ~/Downloads/phone
//!
//! # Rename photos after their capture time
//! photo fix ~/Downloads/phone
//!
//! # Latest photo per camera
//! photo stats nas --all
//!
//! # Never report the photos in this folder again
//! photo ignore ~/Pictures/rejects
//!
//! # Dump EXIF fields
//! photo info IMG_0001.JPG
//! ```

use clap::{Parser, Subcommand};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use photo_cache::config::{Config, Target};
use photo_cache::core::cache::{write_ignore_file, CacheSnapshot, CacheStore, IgnoreSet};
use photo_cache::core::fingerprint::{Fingerprinter, MagickConverter};
use photo_cache::core::metadata::{dump_fields, ExifReader};
use photo_cache::core::organize::{OrganizeReport, Organizer};
use photo_cache::core::refresh::{
    LocalRebuilder, Rebuild, RefreshOrchestrator, RemoteRebuilder, SshTransport,
};
use photo_cache::core::scanner::WorkerPool;
use photo_cache::core::stats::camera_report;
use photo_cache::error::{ConfigError, Result};
use photo_cache::events::{
    AnalyzeEvent, Bucket, Event, EventChannel, EventSender, OrganizeEvent, RefreshEvent,
    ScanEvent,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Photo Cache - know what is already in your archive
#[derive(Parser, Debug)]
#[command(name = "photo")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding config.json and the caches (default: next to the executable)
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rebuild the cache of a target
    Update {
        /// One of the targets defined in config.json
        target: String,
    },

    /// Rebuild the cache of a target by scanning its collections on this machine
    #[command(hide = true)]
    Localupdate {
        target: String,
    },

    /// Sort photos into AlreadyImported, NoExif and ToBeImported/YYYY-MM-DD
    Filter {
        /// One of the targets defined in config.json
        target: String,

        /// Directory with the photos to be filtered
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Leave HEIC/HEIF photos unconverted
        #[arg(long)]
        no_convert: bool,
    },

    /// Rename photos to YYYY-MM-DD_HH-MM-SS.jpg after their capture time
    Fix {
        /// Directory with the photos to be fixed
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Leave HEIC/HEIF photos unconverted
        #[arg(long)]
        no_convert: bool,
    },

    /// Show the latest photo of each camera in a target
    Stats {
        /// One of the targets defined in config.json
        target: String,

        /// Every camera in the target instead of the configured ones
        #[arg(long)]
        all: bool,
    },

    /// Write a photoignore file listing every photo in a directory
    Ignore {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },

    /// Print the EXIF fields of photos
    Info {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    photo_cache::init_tracing(cli.verbose);

    let base_dir = cli.base_dir.clone().unwrap_or_else(default_base_dir);
    let term = Term::stderr();
    let start = Instant::now();

    match cli.command {
        Commands::Update { target } => run_update(&base_dir, &target, cli.verbose, &term)?,
        Commands::Localupdate { target } => {
            run_local_update(&base_dir, &target, cli.verbose, &term)?
        }
        Commands::Filter {
            target,
            dir,
            no_convert,
        } => run_filter(&base_dir, &target, &dir, !no_convert, cli.verbose, &term)?,
        Commands::Fix { dir, no_convert } => {
            run_fix(&base_dir, &dir, !no_convert, cli.verbose, &term)?
        }
        Commands::Stats { target, all } => run_stats(&base_dir, &target, all, cli.verbose)?,
        Commands::Ignore { dir } => run_ignore(&base_dir, &dir, cli.verbose, &term)?,
        Commands::Info { files } => run_info(&files),
    }

    term.write_line(&format!(
        "{}",
        style(format!("{:.1}s elapsed", start.elapsed().as_secs_f64())).dim()
    ))
    .ok();
    Ok(())
}

/// Directory of the running executable, or the current directory
fn default_base_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Configuration for commands that work without one
fn load_config_or_default(base_dir: &Path) -> Result<Config> {
    match Config::load(base_dir) {
        Ok(config) => Ok(config),
        Err(ConfigError::Read { .. }) => Ok(Config::default()),
        Err(e) => Err(e.into()),
    }
}

fn orchestrator(config: &Config, base_dir: &Path) -> RefreshOrchestrator {
    RefreshOrchestrator::new(
        CacheStore::new(base_dir),
        Box::new(LocalRebuilder::new(
            Arc::new(ExifReader::new()),
            config.worker_count(),
        )),
        Box::new(RemoteRebuilder::new(
            Box::new(SshTransport::new()),
            base_dir,
        )),
    )
}

fn fingerprinter(convert: bool) -> Fingerprinter {
    let fingerprinter = Fingerprinter::new(Arc::new(ExifReader::new()));
    if convert {
        fingerprinter.with_converter(Arc::new(MagickConverter::new()))
    } else {
        fingerprinter
    }
}

fn run_update(base_dir: &Path, target_name: &str, verbose: bool, term: &Term) -> Result<()> {
    let config = Config::load(base_dir)?;
    let target = config.target(target_name)?;

    let progress = Progress::start(verbose);
    let result = orchestrator(&config, base_dir).rebuild(target, &progress.sender);
    progress.finish();
    let snapshot = result?;

    print_cache_summary(term, &snapshot);
    Ok(())
}

fn run_local_update(base_dir: &Path, target_name: &str, verbose: bool, term: &Term) -> Result<()> {
    let config = Config::load(base_dir)?;
    let target = config.target(target_name)?;
    let store = CacheStore::new(base_dir);
    let rebuilder = LocalRebuilder::new(Arc::new(ExifReader::new()), config.worker_count());

    let progress = Progress::start(verbose);
    let result = rebuilder.rebuild(target, &store, &progress.sender);
    progress.finish();
    result?;

    print_cache_summary(term, &store.load(&target.name)?);
    Ok(())
}

fn run_filter(
    base_dir: &Path,
    target_name: &str,
    dir: &Path,
    convert: bool,
    verbose: bool,
    term: &Term,
) -> Result<()> {
    let config = Config::load(base_dir)?;
    let target = config.target(target_name)?;
    let ignored = IgnoreSet::load(&target.ignore)?;
    let organizer = Organizer::new(fingerprinter(convert), config.worker_count()).with_ignored(ignored);

    let progress = Progress::start(verbose);
    let result = orchestrator(&config, base_dir)
        .ensure_fresh(target, &progress.sender)
        .and_then(|snapshot| organizer.filter(dir, &snapshot, &progress.sender));
    progress.finish();
    let report = result?;

    print_report(term, &report, &[Bucket::AlreadyImported, Bucket::NoExif, Bucket::ToBeImported]);
    Ok(())
}

fn run_fix(base_dir: &Path, dir: &Path, convert: bool, verbose: bool, term: &Term) -> Result<()> {
    let config = load_config_or_default(base_dir)?;
    let organizer = Organizer::new(fingerprinter(convert), config.worker_count());

    let progress = Progress::start(verbose);
    let result = organizer.fix(dir, &progress.sender);
    progress.finish();
    let report = result?;

    print_report(term, &report, &[Bucket::Renamed]);
    Ok(())
}

fn run_stats(base_dir: &Path, target_name: &str, all: bool, verbose: bool) -> Result<()> {
    let config = Config::load(base_dir)?;
    let target = config.target(target_name)?;

    let progress = Progress::start(verbose);
    let result = orchestrator(&config, base_dir).ensure_fresh(target, &progress.sender);
    progress.finish();
    let snapshot = result?;

    print_stats(&snapshot, target, all);
    Ok(())
}

fn run_ignore(base_dir: &Path, dir: &Path, verbose: bool, term: &Term) -> Result<()> {
    let config = load_config_or_default(base_dir)?;
    let pool = WorkerPool::new(config.worker_count(), fingerprinter(false))?;

    let progress = Progress::start(verbose);
    let result = pool.scan(dir, "", &progress.sender);
    progress.finish();
    let outcome = result?;

    let path = write_ignore_file(dir, &outcome.snapshot)?;
    term.write_line(&format!(
        "{} {} photos listed in {}",
        style("✓").green().bold(),
        style(outcome.snapshot.len()).cyan(),
        display_path(&path)
    ))
    .ok();
    Ok(())
}

fn run_info(files: &[PathBuf]) {
    for file in files {
        println!("{}", style(display_path(file)).bold());
        match dump_fields(file) {
            Ok(fields) if fields.is_empty() => println!("    (no EXIF fields)"),
            Ok(fields) => {
                for field in fields {
                    println!("    {} [IFD {}]: {}", field.tag, field.ifd, field.value);
                }
            }
            Err(e) => println!("    {}", style(e).red()),
        }
    }
}

/// Progress bar driven by library events on a listener thread
struct Progress {
    sender: EventSender,
    handle: JoinHandle<()>,
}

impl Progress {
    fn start(verbose: bool) -> Self {
        let (sender, receiver) = EventChannel::new();

        let pb = ProgressBar::new(0);
        if let Ok(bar_style) =
            ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(bar_style.progress_chars("█▓░"));
        }

        let handle = thread::spawn(move || {
            for event in receiver.iter() {
                match event {
                    Event::Scan(ScanEvent::CandidatesFound { root, total }) => {
                        pb.set_length(total as u64);
                        pb.set_position(0);
                        pb.set_message(display_path(&root));
                    }
                    Event::Analyze(AnalyzeEvent::Progress(p)) => {
                        pb.set_position(p.completed as u64);
                        if verbose {
                            pb.set_message(
                                p.current_path
                                    .file_name()
                                    .unwrap_or_default()
                                    .to_string_lossy()
                                    .to_string(),
                            );
                        }
                    }
                    Event::Analyze(AnalyzeEvent::Converted { from, to }) if verbose => {
                        pb.println(format!(
                            "  {} {} -> {}",
                            style("converted").cyan(),
                            display_path(&from),
                            display_path(&to)
                        ));
                    }
                    Event::Refresh(RefreshEvent::Stale { target, reason }) => {
                        pb.println(format!(
                            "{} {}: {}, updating...",
                            style("↻").yellow(),
                            target,
                            reason
                        ));
                    }
                    Event::Refresh(RefreshEvent::RebuildStarted { target, remote: true }) => {
                        pb.println(format!("  rebuilding {} on the remote host", target));
                    }
                    Event::Organize(OrganizeEvent::Moved { from, to, bucket }) if verbose => {
                        pb.println(format!(
                            "  {} {} -> {}",
                            style(bucket).cyan(),
                            display_path(&from),
                            display_path(&to)
                        ));
                    }
                    Event::Organize(OrganizeEvent::Failed { path, message }) => {
                        pb.println(format!(
                            "  {} {}: {}",
                            style("✗").red(),
                            display_path(&path),
                            message
                        ));
                    }
                    _ => {}
                }
            }
            pb.finish_and_clear();
        });

        Self { sender, handle }
    }

    /// Close the channel and wait for the listener to drain it
    fn finish(self) {
        drop(self.sender);
        self.handle.join().ok();
    }
}

fn print_cache_summary(term: &Term, snapshot: &CacheSnapshot) {
    term.write_line(&format!(
        "{} Cache for {} holds {} photos",
        style("✓").green().bold(),
        style(&snapshot.target_name).bold(),
        style(snapshot.len()).cyan()
    ))
    .ok();
}

fn print_report(term: &Term, report: &OrganizeReport, buckets: &[Bucket]) {
    term.write_line("").ok();
    for bucket in buckets {
        term.write_line(&format!(
            "  {:>16}: {}",
            bucket.to_string(),
            style(report.count(*bucket)).cyan()
        ))
        .ok();
    }
    if report.unchanged > 0 {
        term.write_line(&format!("  {:>16}: {}", "unchanged", style(report.unchanged).dim()))
            .ok();
    }
    if report.ignored > 0 {
        term.write_line(&format!("  {:>16}: {}", "ignored", style(report.ignored).dim()))
            .ok();
    }

    for failed in report
        .scan_failures
        .iter()
        .chain(&report.conversion_failures)
        .chain(&report.failures)
    {
        term.write_line(&format!(
            "  {} {}: {}",
            style("!").yellow().bold(),
            display_path(&failed.path),
            failed.message
        ))
        .ok();
    }
}

fn print_stats(snapshot: &CacheSnapshot, target: &Target, all: bool) {
    let mut title = String::from("Latest photo per camera");
    if all {
        title.push_str(" (all cameras)");
    }
    let rows = camera_report(snapshot, if all { None } else { Some(target.cameras.as_slice()) });

    println!("{}", style(&title).bold());
    println!("{}", "=".repeat(title.chars().count()));

    let width = rows.iter().map(|r| r.camera.chars().count()).max().unwrap_or(0);
    for row in rows {
        let (time, path) = match row.latest {
            Some(entry) => (
                entry
                    .capture_timestamp
                    .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string()),
                display_path(&entry.path),
            ),
            None => ("-".to_string(), "-".to_string()),
        };
        println!("{:<width$}  {:<19}  {}", row.camera, time, path, width = width);
    }
}

/// Shorten paths under the home directory to `~/...`
fn display_path(path: &Path) -> String {
    match dirs::home_dir() {
        Some(home) => match path.strip_prefix(&home) {
            Ok(relative) => format!("~/{}", relative.display()),
            Err(_) => path.display().to_string(),
        },
        None => path.display().to_string(),
    }
}
