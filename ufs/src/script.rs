//! Parsing of line-oriented command scripts.
//!
//! One command per line, words separated by whitespace. `#` starts a
//! comment. `write` takes the rest of the line verbatim as its payload, so
//! only there can `#` be data. A `#` fill byte is written as decimal `35`.

use anyhow::{Context, Result, bail};

/// A single engine command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open { name: String, create: bool },
    Write { fd: usize, data: Vec<u8> },
    Fill { fd: usize, len: usize, byte: u8 },
    Read { fd: usize, max: usize },
    Close { fd: usize },
    Delete { name: String },
    Resize { fd: usize, size: u64 },
    Rewind { fd: usize },
    Stat { name: String },
    Fstat { fd: usize },
    Digest { fd: usize },
    Ls,
    Errno,
    Destroy,
}

/// Parse one script line. Blank lines and comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Command>> {
    let line = match line.split_once('#') {
        Some((code, _)) if !line.trim_start().starts_with("write") => code,
        _ => line,
    };
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (word, rest) = split_word(line);
    let command = match word {
        "open" => {
            let (name, flag) = split_word(rest);
            let create = match flag {
                "" => false,
                "create" => true,
                other => bail!("Unknown open flag: {}", other),
            };
            Command::Open {
                name: required(name, "file name")?.to_string(),
                create,
            }
        }
        "write" => {
            let (fd, data) = split_word(rest);
            Command::Write {
                fd: parse_fd(fd)?,
                data: data.as_bytes().to_vec(),
            }
        }
        "fill" => {
            let (fd, rest) = split_word(rest);
            let (len, byte) = split_word(rest);
            Command::Fill {
                fd: parse_fd(fd)?,
                len: parse_number(len, "length")?,
                byte: parse_byte(byte)?,
            }
        }
        "read" => {
            let (fd, max) = split_word(rest);
            Command::Read {
                fd: parse_fd(fd)?,
                max: parse_number(max, "byte count")?,
            }
        }
        "close" => Command::Close {
            fd: parse_fd(single(rest)?)?,
        },
        "delete" | "rm" => Command::Delete {
            name: required(single(rest)?, "file name")?.to_string(),
        },
        "resize" => {
            let (fd, size) = split_word(rest);
            Command::Resize {
                fd: parse_fd(fd)?,
                size: parse_number(size, "size")?,
            }
        }
        "rewind" => Command::Rewind {
            fd: parse_fd(single(rest)?)?,
        },
        "stat" => Command::Stat {
            name: required(single(rest)?, "file name")?.to_string(),
        },
        "fstat" => Command::Fstat {
            fd: parse_fd(single(rest)?)?,
        },
        "digest" => Command::Digest {
            fd: parse_fd(single(rest)?)?,
        },
        "ls" => no_args(rest, Command::Ls)?,
        "errno" => no_args(rest, Command::Errno)?,
        "destroy" => no_args(rest, Command::Destroy)?,
        other => bail!("Unknown command: {}", other),
    };

    Ok(Some(command))
}

/// Split off the first whitespace-delimited word.
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (s, ""),
    }
}

fn single(rest: &str) -> Result<&str> {
    let (word, extra) = split_word(rest);
    if !extra.is_empty() {
        bail!("Unexpected argument: {}", extra);
    }
    Ok(word)
}

fn no_args(rest: &str, command: Command) -> Result<Command> {
    if !rest.is_empty() {
        bail!("Unexpected argument: {}", rest);
    }
    Ok(command)
}

fn required<'a>(word: &'a str, what: &str) -> Result<&'a str> {
    if word.is_empty() {
        bail!("Missing {}", what);
    }
    Ok(word)
}

fn parse_fd(word: &str) -> Result<usize> {
    parse_number(word, "descriptor")
}

fn parse_number<T: std::str::FromStr>(word: &str, what: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    required(word, what)?
        .parse()
        .with_context(|| format!("Invalid {}: {}", what, word))
}

/// A fill byte is either a single character or a decimal value.
fn parse_byte(word: &str) -> Result<u8> {
    match word.as_bytes() {
        [] => Ok(b'x'),
        [byte] if !byte.is_ascii_digit() => Ok(*byte),
        _ => parse_number(word, "fill byte"),
    }
}
