//! veilfs console driver.
//!
//! A line-oriented stand-in for the OS dispatcher: one command per stdin
//! line, one engine call per command. The rotation shift for the
//! obfuscation transform rides in the final command-line argument, the
//! snapshot in the working directory is loaded at startup (absence is
//! fine), and the state is written back on exit.
//!
//! ## Usage
//!
//! ```bash
//! veilfs-shell [shift]
//! echo -e "touch /a\nwrite /a 0 Hi\nread /a 0 2\nexit" | veilfs-shell 3
//! ```

mod command;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::bail;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use veilfs_core::{EngineConfig, FsEngine, FsError, SNAPSHOT_FILENAME};

use command::Command;

const HELP: &str = "\
stat <path>                  entry attributes
ls <path>                    list immediate children
touch <path>                 create a file (mode 644)
mkdir <path>                 create a directory (mode 755)
rm <path>                    remove a file
rmdir <path>                 remove an empty directory
write <path> <offset> <text> write text at a byte offset
read <path> <offset> <len>   read bytes
truncate <path> <size>       shrink a file
utime <path> <atime> <mtime> set timestamps (unix seconds)
df                           capacity report
help                         this text
exit                         save and quit";

fn print_usage() {
    eprintln!(
        r#"veilfs-shell - console driver for the veilfs engine

USAGE:
    veilfs-shell [shift]

The optional trailing argument is the rotation shift for the obfuscation
transform (default 0). State is loaded from ./{image} at startup and
written back on exit.

COMMANDS (one per stdin line):
{commands}
"#,
        image = SNAPSHOT_FILENAME,
        commands = HELP
    );
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return ExitCode::SUCCESS;
    }

    // The rotation shift rides in the final argument, when it parses as
    // an integer. Anything else (the bare program name included) means 0.
    let shift = args.last().and_then(|s| s.parse::<i32>().ok()).unwrap_or(0);

    let mut engine = FsEngine::new(EngineConfig::with_shift(shift));
    let image = Path::new(SNAPSHOT_FILENAME);
    match engine.load(image) {
        Ok(()) => {}
        Err(FsError::NotFound(_)) => info!("no snapshot found, starting fresh"),
        Err(e) => warn!("ignoring unreadable snapshot: {e}"),
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    if let Err(e) = run(&mut engine, stdin.lock(), &mut stdout) {
        eprintln!("fatal: {e}");
        return ExitCode::FAILURE;
    }

    if let Err(e) = engine.save(image) {
        eprintln!("failed to save snapshot: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

/// Drive the engine from `input` until `exit` or end of input.
///
/// Command errors are reported on `out` and the loop continues; only I/O
/// failures on the streams abort.
fn run(engine: &mut FsEngine, input: impl BufRead, out: &mut impl Write) -> io::Result<()> {
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let cmd = match command::parse(&line) {
            Ok(cmd) => cmd,
            Err(e) => {
                writeln!(out, "error: {e}")?;
                continue;
            }
        };
        if cmd == Command::Exit {
            break;
        }
        match dispatch(engine, cmd) {
            Ok(reply) => writeln!(out, "{reply}")?,
            Err(e) => writeln!(out, "error: {e}")?,
        }
    }
    Ok(())
}

/// Carry out one command against the engine, formatting the reply for
/// the console.
fn dispatch(engine: &mut FsEngine, cmd: Command) -> anyhow::Result<String> {
    match cmd {
        Command::Stat { path } => {
            let attr = engine.getattr(&path)?;
            let kind = if attr.is_dir() { "directory" } else { "file" };
            Ok(format!(
                "{path}: {kind} mode={:o} size={} nlink={} atime={} mtime={}",
                attr.mode,
                attr.size,
                attr.nlink,
                fmt_time(attr.atime),
                fmt_time(attr.mtime),
            ))
        }
        Command::List { path } => {
            let entries = engine.readdir(&path)?;
            if entries.is_empty() {
                return Ok("(empty)".to_string());
            }
            let lines: Vec<String> = entries
                .into_iter()
                .map(|e| {
                    let marker = if e.kind.is_dir() { "/" } else { "" };
                    format!("{}{marker}", e.name)
                })
                .collect();
            Ok(lines.join("\n"))
        }
        Command::Touch { path } => {
            ensure_absent(engine, &path)?;
            engine.create_file(&path, 0o644)?;
            Ok("ok".to_string())
        }
        Command::MkDir { path } => {
            ensure_absent(engine, &path)?;
            engine.create_dir(&path, 0o755)?;
            Ok("ok".to_string())
        }
        Command::Remove { path } => {
            engine.remove_file(&path)?;
            Ok("ok".to_string())
        }
        Command::RemoveDir { path } => {
            engine.remove_dir(&path)?;
            Ok("ok".to_string())
        }
        Command::Write { path, offset, data } => {
            let n = engine.write(&path, offset, data.as_bytes())?;
            Ok(format!("wrote {n} bytes"))
        }
        Command::Read { path, offset, len } => {
            let mut buf = vec![0; len];
            let n = engine.read(&path, offset, &mut buf)?;
            Ok(format!(
                "read {n} bytes: {}",
                String::from_utf8_lossy(&buf[..n])
            ))
        }
        Command::Truncate { path, size } => {
            engine.truncate(&path, size)?;
            Ok("ok".to_string())
        }
        Command::Utime { path, atime, mtime } => {
            engine.set_times(&path, atime, mtime)?;
            Ok("ok".to_string())
        }
        Command::Df => {
            let u = engine.usage();
            Ok(format!(
                "entries {}/{} active, blocks {}/{} free, block size {}",
                u.entries_active, u.entries_total, u.blocks_free, u.blocks_total, u.block_size
            ))
        }
        Command::Help => Ok(HELP.to_string()),
        Command::Exit => Ok("bye".to_string()),
    }
}

/// Stat before create, as the kernel does for a real mount; the engine
/// itself never checks for an existing path.
fn ensure_absent(engine: &FsEngine, path: &str) -> anyhow::Result<()> {
    if engine.getattr(path).is_ok() {
        bail!("{path} already exists");
    }
    Ok(())
}

fn fmt_time(t: Option<i64>) -> String {
    match t {
        Some(seconds) => seconds.to_string(),
        None => "-".to_string(),
    }
}
