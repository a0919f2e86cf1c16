//! Executes parsed commands against one engine.

use crate::script::Command;
use serde::Serialize;
use ufs_core::{Digest, Engine, ErrorKind, Fd, FileStat, OpenFlags};

/// Result of one successfully executed command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Outcome {
    Open {
        name: String,
        fd: usize,
    },
    Write {
        fd: usize,
        written: usize,
        last_error: ErrorKind,
    },
    Read {
        fd: usize,
        len: usize,
        data: String,
    },
    Close {
        fd: usize,
    },
    Delete {
        name: String,
    },
    Resize {
        fd: usize,
        size: u64,
    },
    Rewind {
        fd: usize,
    },
    Stat(FileStat),
    Digest {
        fd: usize,
        digest: Digest,
    },
    Ls {
        files: Vec<String>,
    },
    Errno {
        last_error: ErrorKind,
    },
    Destroy,
}

impl Outcome {
    /// Human-readable rendering, newline-terminated.
    pub fn to_text(&self) -> String {
        match self {
            Outcome::Open { name, fd } => format!("{} -> fd {}\n", name, fd),
            Outcome::Write {
                written,
                last_error: ErrorKind::NoError,
                ..
            } => format!("wrote {} bytes\n", written),
            Outcome::Write {
                written,
                last_error,
                ..
            } => format!("wrote {} bytes (short write: {})\n", written, last_error),
            Outcome::Read { data, .. } => format!("{}\n", data),
            Outcome::Close { fd } => format!("closed fd {}\n", fd),
            Outcome::Delete { name } => format!("deleted {}\n", name),
            Outcome::Resize { fd, size } => format!("fd {} resized to {} bytes\n", fd, size),
            Outcome::Rewind { fd } => format!("fd {} rewound\n", fd),
            Outcome::Stat(stat) => format!(
                "{}: {} bytes, {} blocks, {} open{}\n",
                stat.name,
                stat.size,
                stat.blocks,
                stat.refs,
                if stat.deleted { ", deleted" } else { "" }
            ),
            Outcome::Digest { digest, .. } => format!("{}\n", digest),
            Outcome::Ls { files } if files.is_empty() => String::new(),
            Outcome::Ls { files } => format!("{}\n", files.join("\n")),
            Outcome::Errno { last_error } => format!("{}\n", last_error),
            Outcome::Destroy => "destroyed\n".to_string(),
        }
    }
}

/// An engine plus the commands run against it.
#[derive(Debug, Default)]
pub struct Session {
    engine: Engine,
    executed: usize,
}

impl Session {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            executed: 0,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Number of commands executed, failed ones included.
    pub fn executed(&self) -> usize {
        self.executed
    }

    pub fn execute(&mut self, command: &Command) -> ufs_core::Result<Outcome> {
        self.executed += 1;
        let engine = &mut self.engine;

        let outcome = match command {
            Command::Open { name, create } => {
                let flags = if *create {
                    OpenFlags::CREATE
                } else {
                    OpenFlags::empty()
                };
                let fd = engine.open(name, flags)?;
                Outcome::Open {
                    name: name.clone(),
                    fd: fd.index(),
                }
            }
            Command::Write { fd, data } => {
                let written = engine.write(Fd(*fd), data)?;
                Outcome::Write {
                    fd: *fd,
                    written,
                    last_error: engine.last_error(),
                }
            }
            Command::Fill { fd, len, byte } => {
                let written = fill(engine, Fd(*fd), *len, *byte)?;
                Outcome::Write {
                    fd: *fd,
                    written,
                    last_error: engine.last_error(),
                }
            }
            Command::Read { fd, max } => {
                let data = engine.read_vec(Fd(*fd), *max)?;
                Outcome::Read {
                    fd: *fd,
                    len: data.len(),
                    data: String::from_utf8_lossy(&data).into_owned(),
                }
            }
            Command::Close { fd } => {
                engine.close(Fd(*fd))?;
                Outcome::Close { fd: *fd }
            }
            Command::Delete { name } => {
                engine.delete(name)?;
                Outcome::Delete { name: name.clone() }
            }
            Command::Resize { fd, size } => {
                engine.resize(Fd(*fd), *size)?;
                Outcome::Resize {
                    fd: *fd,
                    size: *size,
                }
            }
            Command::Rewind { fd } => {
                engine.rewind(Fd(*fd))?;
                Outcome::Rewind { fd: *fd }
            }
            Command::Stat { name } => Outcome::Stat(engine.stat(name)?),
            Command::Fstat { fd } => Outcome::Stat(engine.fstat(Fd(*fd))?),
            Command::Digest { fd } => Outcome::Digest {
                fd: *fd,
                digest: engine.digest(Fd(*fd))?,
            },
            Command::Ls => Outcome::Ls {
                files: engine.list(),
            },
            Command::Errno => Outcome::Errno {
                last_error: engine.last_error(),
            },
            Command::Destroy => {
                engine.destroy();
                Outcome::Destroy
            }
        };

        Ok(outcome)
    }
}

/// Write `len` copies of `byte`, one block-sized buffer at a time.
///
/// Stops early on a short write, returning the total written so far.
fn fill(engine: &mut Engine, fd: Fd, len: usize, byte: u8) -> ufs_core::Result<usize> {
    let size = len.min(engine.config().block_size);
    let mut chunk = Vec::new();
    chunk.try_reserve_exact(size)?;
    chunk.resize(size, byte);

    let mut written = 0;
    loop {
        let want = (len - written).min(chunk.len());
        match engine.write(fd, &chunk[..want]) {
            Ok(n) if n == want && written + n < len => written += n,
            Ok(n) => return Ok(written + n),
            Err(_) if written > 0 => return Ok(written),
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse_line;
    use ufs_core::Config;

    fn run(session: &mut Session, line: &str) -> ufs_core::Result<Outcome> {
        let command = parse_line(line).unwrap().unwrap();
        session.execute(&command)
    }

    #[test]
    fn test_open_write_read() {
        let mut session = Session::default();

        assert_eq!(
            run(&mut session, "open a create").unwrap(),
            Outcome::Open {
                name: "a".to_string(),
                fd: 0
            }
        );
        assert_eq!(
            run(&mut session, "fill 0 600 X").unwrap(),
            Outcome::Write {
                fd: 0,
                written: 600,
                last_error: ErrorKind::NoError
            }
        );
        run(&mut session, "close 0").unwrap();
        run(&mut session, "open a").unwrap();

        match run(&mut session, "read 0 600").unwrap() {
            Outcome::Read { len, data, .. } => {
                assert_eq!(len, 600);
                assert_eq!(data, "X".repeat(600));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(session.engine().block_count(), 2);
        assert_eq!(session.executed(), 5);
    }

    #[test]
    fn test_errno_reports_previous_failure() {
        let mut session = Session::default();
        assert!(run(&mut session, "close 0").is_err());
        assert_eq!(
            run(&mut session, "errno").unwrap(),
            Outcome::Errno {
                last_error: ErrorKind::NoSuchFile
            }
        );
    }

    #[test]
    fn test_stat_text() {
        let mut session = Session::default();
        run(&mut session, "open a create").unwrap();
        run(&mut session, "write 0 hello").unwrap();
        run(&mut session, "delete a").unwrap();

        let outcome = run(&mut session, "fstat 0").unwrap();
        assert_eq!(outcome.to_text(), "a: 5 bytes, 1 blocks, 1 open, deleted\n");
    }

    #[test]
    fn test_outcome_json_shape() {
        let outcome = Outcome::Write {
            fd: 1,
            written: 10,
            last_error: ErrorKind::FileTooLarge,
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["op"], "write");
        assert_eq!(value["written"], 10);
        assert_eq!(value["last_error"], "file_too_large");

        let stat = Outcome::Stat(FileStat {
            name: "a".to_string(),
            size: 3,
            blocks: 1,
            refs: 0,
            deleted: false,
        });
        let value = serde_json::to_value(&stat).unwrap();
        assert_eq!(value["op"], "stat");
        assert_eq!(value["size"], 3);
    }

    #[test]
    fn test_short_write_text() {
        let outcome = Outcome::Write {
            fd: 0,
            written: 4,
            last_error: ErrorKind::FileTooLarge,
        };
        assert_eq!(
            outcome.to_text(),
            "wrote 4 bytes (short write: file_too_large)\n"
        );
    }

    #[test]
    fn test_fill_huge_length_stops_at_limit() {
        let config = Config::default()
            .with_block_size(64)
            .with_max_file_size(Some(1000));
        let mut session = Session::new(Engine::with_config(config).unwrap());
        run(&mut session, "open a create").unwrap();

        assert_eq!(
            run(&mut session, "fill 0 18446744073709551615").unwrap(),
            Outcome::Write {
                fd: 0,
                written: 1000,
                last_error: ErrorKind::FileTooLarge
            }
        );
        assert_eq!(session.engine().block_count(), 16);

        // Already at the limit: nothing goes in.
        let err = run(&mut session, "fill 0 10").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileTooLarge);
    }

    #[test]
    fn test_fill_zero_checks_descriptor() {
        let mut session = Session::default();
        assert!(run(&mut session, "fill 3 0").is_err());

        run(&mut session, "open a create").unwrap();
        assert_eq!(
            run(&mut session, "fill 0 0").unwrap(),
            Outcome::Write {
                fd: 0,
                written: 0,
                last_error: ErrorKind::NoError
            }
        );
    }

    #[test]
    fn test_ls_and_destroy() {
        let mut session = Session::default();
        run(&mut session, "open b create").unwrap();
        run(&mut session, "open a create").unwrap();
        assert_eq!(
            run(&mut session, "ls").unwrap().to_text(),
            "a\nb\n"
        );

        run(&mut session, "destroy").unwrap();
        assert_eq!(run(&mut session, "ls").unwrap().to_text(), "");
        assert!(run(&mut session, "close 0").is_err());
    }
}
