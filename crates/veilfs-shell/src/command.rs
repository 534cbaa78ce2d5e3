//! Command grammar for the console driver.
//!
//! One command per line. Every command maps to exactly one engine call;
//! `write` treats the remainder of the line after the offset as the data,
//! spaces included.

use anyhow::{Result, anyhow, bail};

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Stat { path: String },
    List { path: String },
    Touch { path: String },
    MkDir { path: String },
    Remove { path: String },
    RemoveDir { path: String },
    Write { path: String, offset: u64, data: String },
    Read { path: String, offset: u64, len: usize },
    Truncate { path: String, size: u64 },
    Utime { path: String, atime: i64, mtime: i64 },
    Df,
    Help,
    Exit,
}

/// Parse one input line.
pub fn parse(line: &str) -> Result<Command> {
    let Some((verb, rest)) = split_word(line) else {
        bail!("empty command");
    };
    match verb {
        "stat" => Ok(Command::Stat {
            path: one_path(rest, "stat <path>")?,
        }),
        "ls" => Ok(Command::List {
            path: one_path(rest, "ls <path>")?,
        }),
        "touch" => Ok(Command::Touch {
            path: one_path(rest, "touch <path>")?,
        }),
        "mkdir" => Ok(Command::MkDir {
            path: one_path(rest, "mkdir <path>")?,
        }),
        "rm" => Ok(Command::Remove {
            path: one_path(rest, "rm <path>")?,
        }),
        "rmdir" => Ok(Command::RemoveDir {
            path: one_path(rest, "rmdir <path>")?,
        }),
        "write" => {
            let usage = "write <path> <offset> <text>";
            let Some((path, rest)) = split_word(rest) else {
                bail!("usage: {usage}");
            };
            let Some((offset, data)) = split_word(rest) else {
                bail!("usage: {usage}");
            };
            Ok(Command::Write {
                path: path.to_string(),
                offset: number(offset, usage)?,
                data: data.to_string(),
            })
        }
        "read" => {
            let usage = "read <path> <offset> <len>";
            match rest.split_whitespace().collect::<Vec<_>>()[..] {
                [path, offset, len] => Ok(Command::Read {
                    path: path.to_string(),
                    offset: number(offset, usage)?,
                    len: number(len, usage)?,
                }),
                _ => Err(anyhow!("usage: {usage}")),
            }
        }
        "truncate" => {
            let usage = "truncate <path> <size>";
            match rest.split_whitespace().collect::<Vec<_>>()[..] {
                [path, size] => Ok(Command::Truncate {
                    path: path.to_string(),
                    size: number(size, usage)?,
                }),
                _ => Err(anyhow!("usage: {usage}")),
            }
        }
        "utime" => {
            let usage = "utime <path> <atime> <mtime>";
            match rest.split_whitespace().collect::<Vec<_>>()[..] {
                [path, atime, mtime] => Ok(Command::Utime {
                    path: path.to_string(),
                    atime: number(atime, usage)?,
                    mtime: number(mtime, usage)?,
                }),
                _ => Err(anyhow!("usage: {usage}")),
            }
        }
        "df" => Ok(Command::Df),
        "help" => Ok(Command::Help),
        "exit" | "quit" => Ok(Command::Exit),
        other => Err(anyhow!("unknown command: {other} (try 'help')")),
    }
}

/// First whitespace-delimited word and the remainder after one separator.
fn split_word(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => Some((word, rest)),
        None => Some((s, "")),
    }
}

fn one_path(rest: &str, usage: &str) -> Result<String> {
    match rest.split_whitespace().collect::<Vec<_>>()[..] {
        [path] => Ok(path.to_string()),
        _ => Err(anyhow!("usage: {usage}")),
    }
}

fn number<T: std::str::FromStr>(s: &str, usage: &str) -> Result<T> {
    s.parse().map_err(|_| anyhow!("usage: {usage}"))
}
