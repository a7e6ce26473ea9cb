//! Inspect and edit a `(u64, u64)` table stored in a file.
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use shm_hashtable::{DumpLevel, First, HashTable, InitMode, Segment, SegmentError};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const CAPACITY: usize = 1024;

type Table = HashTable<(u64, u64), First, CAPACITY>;

#[derive(Parser)]
#[command(about = "Operate on a shared-memory hash table kept in a file")]
struct TableCommand {
    /// The segment file. Created and sized on demand.
    #[arg(long)]
    segment: PathBuf,

    /// Whether to lay out a new table or continue the one in the file.
    #[arg(value_enum, long, default_value = "resume")]
    mode: Mode,

    #[command(subcommand)]
    op: Op,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Discard the file's contents and start an empty table.
    Create,
    /// Load the table an earlier run left in the file.
    Resume,
}

impl From<Mode> for InitMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Create => InitMode::Create,
            Mode::Resume => InitMode::Resume,
        }
    }
}

#[derive(Subcommand)]
enum Op {
    /// Insert unless the key is present.
    Insert { key: u64, value: u64 },
    /// Insert, keeping earlier values with the same key.
    InsertDup { key: u64, value: u64 },
    /// Print every value stored under a key, oldest first.
    Get { key: u64 },
    /// Number of values stored under a key.
    Count { key: u64 },
    /// Remove every value stored under a key.
    Erase { key: u64 },
    /// Print the table.
    Dump {
        #[arg(value_enum, long, default_value = "simple")]
        level: Level,
    },
    /// Check the table's structure.
    Verify,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Level {
    Simple,
    Structure,
    Detail,
}

impl From<Level> for DumpLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::Simple => DumpLevel::Simple,
            Level::Structure => DumpLevel::Structure,
            Level::Detail => DumpLevel::Detail,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cmd = TableCommand::parse();
    match run(cmd) {
        Ok(code) => code,
        Err(err) => {
            error!(%err, "failed to open table");
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` directives when set and valid, `info` otherwise.
fn log_filter(directives: Option<String>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn run(cmd: TableCommand) -> Result<ExitCode, SegmentError> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(&cmd.segment)?;
    let mut seg = Segment::create::<Table>(&file)?;
    // SAFETY: the file is only ever written by this tool, with this table
    // type, and one invocation at a time.
    let table = unsafe { seg.table::<(u64, u64), First, CAPACITY>(cmd.mode.into())? };

    let code = apply(table, cmd.op);
    seg.flush()?;
    Ok(code)
}

fn apply(table: &mut Table, op: Op) -> ExitCode {
    match op {
        Op::Insert { key, value } => match table.insert_unique((key, value)) {
            Ok(pos) => info!(key, slot = pos.get(), "inserted"),
            Err(err) => {
                error!(key, %err, "not inserted");
                return ExitCode::FAILURE;
            }
        },
        Op::InsertDup { key, value } => match table.insert_equal((key, value)) {
            Ok(pos) => info!(key, slot = pos.get(), "inserted"),
            Err(err) => {
                error!(key, %err, "not inserted");
                return ExitCode::FAILURE;
            }
        },
        Op::Get { key } => {
            let mut found = false;
            for (_, value) in table.equal_range(&key) {
                println!("{value}");
                found = true;
            }
            if !found {
                return ExitCode::FAILURE;
            }
        }
        Op::Count { key } => println!("{}", table.count(&key)),
        Op::Erase { key } => println!("{}", table.erase(&key)),
        Op::Dump { level } => println!("{}", table.dump(level.into())),
        Op::Verify => match table.verify() {
            Ok(()) => println!("ok"),
            Err(err) => {
                println!("{err}");
                return ExitCode::FAILURE;
            }
        },
    }
    ExitCode::SUCCESS
}
