use std::error::Error as StdError;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::fs::File;
use std::io::{BufRead, BufReader, Error as IoError, Read};
use std::path::Path;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Read,
    Write,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Read => "read",
            Op::Write => "write",
        }
    }
}

/// One memory reference of the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub op: Op,
    pub addr: u32,
}

impl Command {
    pub fn read(addr: u32) -> Self {
        Command { op: Op::Read, addr }
    }

    pub fn write(addr: u32) -> Self {
        Command { op: Op::Write, addr }
    }

    pub fn is_write(&self) -> bool {
        self.op == Op::Write
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{} {:x}", self.op.as_str(), self.addr)
    }
}

/// Opens `path`, transparently decompressing `.zst` traces.
pub fn open_trace(path: &str) -> Result<Box<dyn BufRead>, Error> {
    let file = File::open(path).map_err(|e| Error::Io(path.to_owned(), e))?;
    let is_zstd = Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zst"));
    let reader: Box<dyn Read> = if is_zstd {
        Box::new(zstd::stream::read::Decoder::new(file).map_err(|e| Error::Io(path.to_owned(), e))?)
    } else {
        Box::new(file)
    };
    Ok(Box::new(BufReader::new(reader)))
}

pub fn load_trace(path: &str) -> Result<Vec<Command>, Error> {
    let reader = open_trace(path)?;
    parse_trace(reader).map_err(|e| match e {
        Error::Io(_, io) => Error::Io(path.to_owned(), io),
        other => other,
    })
}

/// Parses every line of `reader`. Any line that is not `r|w <hex>`, blank ones
/// included, fails with its 1-based line number.
pub fn parse_trace<R: BufRead>(reader: R) -> Result<Vec<Command>, Error> {
    let re = Regex::new(r"^\s*([rw])\s+([0-9A-Fa-f]+)\s*$").map_err(Error::Pattern)?;
    let mut commands = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line.map_err(|e| Error::Io(String::new(), e))?;
        let cap = re.captures(&line).ok_or_else(|| Error::Malformed {
            line: line_no,
            text: line.clone(),
        })?;
        let addr = u32::from_str_radix(&cap[2], 16).map_err(|_| Error::Address {
            line: line_no,
            text: cap[2].to_owned(),
        })?;
        let op = if &cap[1] == "r" { Op::Read } else { Op::Write };
        commands.push(Command { op, addr });
    }

    Ok(commands)
}

/// Trace-format errors; fatal and reported before the simulation starts.
#[derive(Debug)]
pub enum Error {
    Io(String, IoError),
    Pattern(regex::Error),
    Malformed { line: usize, text: String },
    Address { line: usize, text: String },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::Io(fname, error) => write!(f, "input/output error: file: {fname}: {error}"),
            Self::Pattern(error) => write!(f, "trace pattern error: {error}"),
            Self::Malformed { line, text } => {
                write!(f, "line {line}: expected `r|w <hex address>`, found {text:?}")
            }
            Self::Address { line, text } => {
                write!(f, "line {line}: address {text:?} does not fit in 32 bits")
            }
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io(_, error) => Some(error),
            Self::Pattern(error) => Some(error),
            _ => None,
        }
    }
}
