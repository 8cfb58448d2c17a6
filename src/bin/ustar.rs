//! ustar command-line front end
//!
//! `ustar -c|-a|-t|-u|-x -f ARCHIVE [FILE...]`

use anyhow::{Context, Result};
use clap::{ArgAction, ArgGroup, Parser};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, Level};
use ustar_rs::{Archive, ArchiveEntry, ArchiveOptions};

#[derive(Parser, Debug)]
#[command(name = "ustar", version)]
#[command(about = "Create, append, list, update and extract ustar archives")]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["create", "append", "list", "update", "extract"])
))]
struct Args {
    /// Create a new archive from FILE...
    #[arg(short = 'c', long)]
    create: bool,

    /// Append FILE... to an existing archive
    #[arg(short = 'a', long)]
    append: bool,

    /// List archive members, one per line
    #[arg(short = 't', long)]
    list: bool,

    /// Re-append FILE..., which must already be archived
    #[arg(short = 'u', long)]
    update: bool,

    /// Extract every member
    #[arg(short = 'x', long)]
    extract: bool,

    /// Archive path
    #[arg(short = 'f', long = "file", value_name = "ARCHIVE")]
    archive: PathBuf,

    /// Member files
    #[arg(value_name = "FILE")]
    files: Vec<String>,

    /// Resolve member files against, and extract into, DIR
    #[arg(short = 'C', long, value_name = "DIR")]
    directory: Option<PathBuf>,

    /// TOML file with archive options
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// List with mode, owner, size and mtime
    #[arg(long = "long", requires = "list")]
    long_listing: bool,

    /// List as JSON
    #[arg(long, requires = "list", conflicts_with = "long_listing")]
    json: bool,

    /// More log output on stderr (-v info, -vv debug); RUST_LOG overrides
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Create,
    Append,
    List,
    Update,
    Extract,
}

impl Args {
    fn mode(&self) -> Mode {
        if self.create {
            Mode::Create
        } else if self.append {
            Mode::Append
        } else if self.list {
            Mode::List
        } else if self.update {
            Mode::Update
        } else {
            Mode::Extract
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    // RUST_LOG wins when set; -v only moves the default
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ustar: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let mut options = match &args.config {
        Some(path) => ArchiveOptions::from_toml_file(path)?,
        None => ArchiveOptions::default(),
    };
    if let Some(dir) = &args.directory {
        options.directory = dir.clone();
    }

    let mode = args.mode();
    debug!("Mode {:?} on {:?} with options {:?}", mode, args.archive, options);

    let archive = Archive::with_options(&args.archive, options);
    let shown = args.archive.display();

    match mode {
        Mode::Create => {
            archive
                .create(&args.files)
                .with_context(|| format!("cannot create {}", shown))?;
        }
        Mode::Append => {
            archive
                .append(&args.files)
                .with_context(|| format!("cannot append to {}", shown))?;
        }
        Mode::Update => {
            archive
                .update(&args.files)
                .with_context(|| format!("cannot update {}", shown))?;
        }
        Mode::Extract => {
            archive
                .extract()
                .with_context(|| format!("cannot extract {}", shown))?;
        }
        Mode::List => {
            let entries = archive
                .entries()
                .with_context(|| format!("cannot list {}", shown))?;
            print_listing(&entries, args).context("cannot write listing")?;
        }
    }

    Ok(())
}

fn print_listing(entries: &[ArchiveEntry], args: &Args) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.json {
        serde_json::to_writer_pretty(&mut out, entries)?;
        writeln!(out)?;
    } else if args.long_listing {
        for entry in entries {
            let header = &entry.header;
            writeln!(
                out,
                "{} {}/{} {:>10} {} {}",
                mode_string(header.mode),
                header.uname,
                header.gname,
                header.size,
                format_mtime(header.mtime),
                header.name
            )?;
        }
    } else {
        for entry in entries {
            writeln!(out, "{}", entry.name())?;
        }
    }

    out.flush()
}

/// `-rwxr-xr-x` style rendering of permission bits
fn mode_string(mode: u32) -> String {
    let mut text = String::with_capacity(10);
    text.push('-');
    for (shift, special, special_char) in [(6, 0o4000, 's'), (3, 0o2000, 's'), (0, 0o1000, 't')] {
        let bits = (mode >> shift) & 0o7;
        text.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        text.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        let exec = bits & 0o1 != 0;
        text.push(match (mode & special != 0, exec) {
            (true, true) => special_char,
            (true, false) => special_char.to_ascii_uppercase(),
            (false, true) => 'x',
            (false, false) => '-',
        });
    }
    text
}

fn format_mtime(mtime: u64) -> String {
    i64::try_from(mtime)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| mtime.to_string())
}
