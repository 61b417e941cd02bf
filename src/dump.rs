//! Decoding of mysqldump insert statements into row tables
//!
//! A dump is a (usually gzip-compressed) text file in which every table's data
//! appears as one or more `INSERT INTO `table` VALUES (...),(...);` lines. Only
//! those lines matter here; everything else in the dump is skipped.

use crate::error::{MirrorError, Result};
use crate::scratch::{ScratchArea, Side};
use flate2::read::MultiGzDecoder;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::str::Chars;
use walkdir::WalkDir;

/// Value stored for SQL `NULL` and empty fields so rows never contain empty cells
pub const NULL_SENTINEL: &str = "NULL";

/// Prefix of every significant dump line
pub const INSERT_PREFIX: &str = "INSERT INTO `";

const VALUES_MARKER: &str = " VALUES ";

/// One record's column values at one point in time; column 0 is the identifier
pub type Row = Vec<String>;

/// An insert statement split into its table name and tuple-list payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement<'a> {
    pub table: &'a str,
    pub values: &'a str,
}

impl<'a> InsertStatement<'a> {
    /// Split a dump line. Returns `None` for lines that are not insert statements.
    pub fn parse(line: &'a str) -> Option<Result<Self>> {
        let rest = line.strip_prefix(INSERT_PREFIX)?;
        let Some(end) = rest.find('`') else {
            return Some(Err(MirrorError::decode(
                "<unknown>",
                "unterminated table name in insert statement",
            )));
        };
        let table = &rest[..end];
        let after_name = &rest[end + 1..];
        match after_name.find(VALUES_MARKER) {
            Some(pos) => Some(Ok(Self {
                table,
                values: &after_name[pos + VALUES_MARKER.len()..],
            })),
            None => Some(Err(MirrorError::decode(
                table,
                "insert statement has no VALUES clause",
            ))),
        }
    }

    /// Decode the payload into rows
    pub fn decode(&self) -> Result<Vec<Row>> {
        decode_values(self.values).map_err(|message| MirrorError::decode(self.table, message))
    }
}

/// Decode a `(...),(...);` tuple list into rows.
///
/// Fields are split on commas only outside quoted strings and at parenthesis
/// depth zero, so literal parentheses and commas inside values never end a
/// tuple early.
pub fn decode_values(payload: &str) -> std::result::Result<Vec<Row>, String> {
    let payload = payload.trim_end();
    if !payload.starts_with('(') {
        return Err("payload does not begin with '('".to_string());
    }

    let mut chars = payload.chars().peekable();
    let mut rows = Vec::new();

    loop {
        skip_whitespace(&mut chars);
        match chars.next() {
            Some('(') => {}
            Some(c) => {
                return Err(format!(
                    "expected '(' to open tuple {}, found '{}'",
                    rows.len() + 1,
                    c
                ));
            }
            None => return Err("unexpected end of payload".to_string()),
        }
        rows.push(read_tuple(&mut chars)?);

        skip_whitespace(&mut chars);
        match chars.next() {
            Some(',') => continue,
            Some(';') | None => break,
            Some(c) => return Err(format!("unexpected '{}' after tuple {}", c, rows.len())),
        }
    }

    skip_whitespace(&mut chars);
    if let Some(c) = chars.next() {
        return Err(format!("trailing content after statement terminator: '{}'", c));
    }

    Ok(rows)
}

fn read_tuple(chars: &mut Peekable<Chars<'_>>) -> std::result::Result<Row, String> {
    let mut row = Vec::new();
    loop {
        skip_whitespace(chars);
        let value = if chars.peek() == Some(&'\'') {
            chars.next();
            read_quoted(chars)?
        } else {
            read_bare(chars)?
        };
        row.push(if value.is_empty() || value == NULL_SENTINEL {
            NULL_SENTINEL.to_string()
        } else {
            value
        });

        skip_whitespace(chars);
        match chars.next() {
            Some(',') => continue,
            Some(')') => return Ok(row),
            Some(c) => return Err(format!("unexpected '{}' after field {}", c, row.len())),
            None => return Err("unterminated tuple".to_string()),
        }
    }
}

/// Read a single-quoted literal; the opening quote is already consumed
fn read_quoted(chars: &mut Peekable<Chars<'_>>) -> std::result::Result<String, String> {
    let mut value = String::new();
    loop {
        match chars.next() {
            Some('\\') => match chars.next() {
                Some(escaped) => value.push(unescape(escaped)),
                None => return Err("dangling escape at end of payload".to_string()),
            },
            Some('\'') => {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    value.push('\'');
                } else {
                    return Ok(value);
                }
            }
            Some(c) => value.push(c),
            None => return Err("unterminated quoted field".to_string()),
        }
    }
}

/// Read an unquoted token (number, `NULL`, or an expression) up to the next
/// top-level comma or the tuple's closing parenthesis
fn read_bare(chars: &mut Peekable<Chars<'_>>) -> std::result::Result<String, String> {
    let mut value = String::new();
    let mut depth = 0usize;
    let mut in_quote = false;

    while let Some(&c) = chars.peek() {
        if in_quote {
            value.push(c);
            chars.next();
            match c {
                '\\' => {
                    if let Some(next) = chars.next() {
                        value.push(next);
                    }
                }
                '\'' => in_quote = false,
                _ => {}
            }
            continue;
        }
        match c {
            ',' if depth == 0 => break,
            ')' if depth == 0 => break,
            '(' => depth += 1,
            ')' => depth -= 1,
            '\'' => in_quote = true,
            _ => {}
        }
        value.push(c);
        chars.next();
    }

    if in_quote {
        return Err("unterminated quoted section in unquoted field".to_string());
    }
    Ok(value.trim().to_string())
}

fn unescape(c: char) -> char {
    match c {
        '0' => '\0',
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        'b' => '\u{8}',
        'Z' => '\u{1a}',
        other => other,
    }
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) {
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
}

/// Open a dump for line reading, transparently decompressing `.gz` files
pub fn open_dump(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    let is_gzip = path.extension().is_some_and(|ext| ext == "gz");
    if is_gzip {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Decode every insert statement for the wanted tables of one dump into the
/// scratch area. Returns the number of rows decoded per table.
pub fn decode_dump<T>(
    path: &Path,
    tables: &IndexMap<String, T>,
    scratch: &ScratchArea,
    side: Side,
) -> Result<BTreeMap<String, usize>> {
    let mut reader = open_dump(path)?;
    let mut counts: BTreeMap<String, usize> = tables.keys().map(|t| (t.clone(), 0)).collect();
    let mut buf = Vec::new();

    // Every wanted table gets a scratch file even if the dump has no rows for it
    for table in tables.keys() {
        scratch.create(side, table)?;
    }

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        if !buf.starts_with(INSERT_PREFIX.as_bytes()) {
            continue;
        }
        let line = String::from_utf8_lossy(&buf);
        let Some(statement) = InsertStatement::parse(line.trim_end_matches(['\n', '\r'])) else {
            continue;
        };
        let statement = statement?;
        if !tables.contains_key(statement.table) {
            continue;
        }

        let rows = statement.decode()?;
        scratch.append_rows(side, statement.table, &rows)?;
        if let Some(count) = counts.get_mut(statement.table) {
            *count += rows.len();
        }
        log::debug!(
            "{}: decoded {} rows for `{}`",
            path.display(),
            rows.len(),
            statement.table
        );
    }

    Ok(counts)
}

/// The two dumps being compared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpPair {
    pub old: PathBuf,
    pub new: PathBuf,
}

impl DumpPair {
    pub fn new(old: PathBuf, new: PathBuf) -> Self {
        Self { old, new }
    }

    /// Pick the two most recently modified files in a dump directory
    pub fn latest_in(dir: &Path) -> Result<Self> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry?;
            if entry.file_type().is_file() {
                let modified = entry.metadata()?.modified()?;
                files.push((modified, entry.into_path()));
            }
        }

        files.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
        let mut newest = files.into_iter().map(|(_, path)| path);
        match (newest.next(), newest.next()) {
            (Some(new), Some(old)) => Ok(Self { old, new }),
            _ => Err(MirrorError::invalid_input(format!(
                "need at least two dump files in {}",
                dir.display()
            ))),
        }
    }

    /// Identifying label of the newer dump, used to tag commits
    pub fn label(&self) -> String {
        self.new
            .file_name()
            .map(|name| name.to_string_lossy())
            .and_then(|name| name.split('.').next().map(str::to_string))
            .unwrap_or_default()
    }
}
