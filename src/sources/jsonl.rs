//! Line-delimited JSON fragment source.
//!
//! Each non-blank line holds one object with at least an `id` (non-negative
//! integer or non-empty string) and a non-blank `text`. Other fields are
//! ignored. The reader is forward-only: once it reports an error or reaches
//! the end of input it releases the underlying handle and yields nothing more.

use serde_json::Value;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::error::SourceError;
use crate::models::{FragmentId, FragmentRecord, SourcedFragment};

const BOM: char = '\u{feff}';

pub struct FragmentReader<R> {
    lines: Option<Lines<R>>,
    line: usize,
}

impl FragmentReader<BufReader<File>> {
    /// Open a JSONL file for reading.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let file = File::open(path).await.map_err(|source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl FragmentReader<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin> FragmentReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: Some(reader.lines()),
            line: 0,
        }
    }

    /// Read the next fragment, skipping blank lines.
    ///
    /// Returns `Ok(None)` once the input is exhausted or after an error has
    /// been returned.
    pub async fn next_fragment(&mut self) -> Result<Option<SourcedFragment>, SourceError> {
        loop {
            let Some(lines) = self.lines.as_mut() else {
                return Ok(None);
            };

            let raw = match lines.next_line().await {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    self.lines = None;
                    return Ok(None);
                }
                Err(source) if source.kind() == ErrorKind::InvalidData => {
                    self.lines = None;
                    self.line += 1;
                    return Err(SourceError::MalformedRecord {
                        line: self.line,
                        reason: "invalid UTF-8".to_string(),
                    });
                }
                Err(source) => {
                    self.lines = None;
                    return Err(SourceError::Read {
                        line: self.line + 1,
                        source,
                    });
                }
            };
            self.line += 1;

            let content = if self.line == 1 {
                raw.trim_start_matches(BOM).trim()
            } else {
                raw.trim()
            };
            if content.is_empty() {
                continue;
            }

            return match parse_record(content, self.line) {
                Ok(record) => Ok(Some(SourcedFragment {
                    line: self.line,
                    record,
                })),
                Err(e) => {
                    self.lines = None;
                    Err(e)
                }
            };
        }
    }

    /// Number of lines consumed so far.
    pub fn lines_read(&self) -> usize {
        self.line
    }

    pub fn is_finished(&self) -> bool {
        self.lines.is_none()
    }
}

/// Parse one trimmed, non-blank line into a record.
pub fn parse_record(content: &str, line: usize) -> Result<FragmentRecord, SourceError> {
    let malformed = |reason: String| SourceError::MalformedRecord { line, reason };

    let value: Value =
        serde_json::from_str(content).map_err(|e| malformed(format!("invalid JSON: {e}")))?;
    let mut object = match value {
        Value::Object(object) => object,
        other => {
            return Err(malformed(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            )));
        }
    };

    let id = match object.remove("id") {
        Some(Value::Number(n)) => match n.as_u64() {
            Some(n) => FragmentId::Num(n),
            None => return Err(malformed(format!("id {n} is not a non-negative integer"))),
        },
        Some(Value::String(s)) if !s.trim().is_empty() => FragmentId::Text(s),
        Some(Value::String(_)) => return Err(malformed("id is empty".to_string())),
        Some(other) => {
            return Err(malformed(format!(
                "id must be a string or integer, got {}",
                json_kind(&other)
            )));
        }
        None => return Err(malformed("missing field `id`".to_string())),
    };

    let text = match object.remove("text") {
        Some(Value::String(s)) if !s.trim().is_empty() => s,
        Some(Value::String(_)) => return Err(malformed("text is blank".to_string())),
        Some(other) => {
            return Err(malformed(format!(
                "text must be a string, got {}",
                json_kind(&other)
            )));
        }
        None => return Err(malformed("missing field `text`".to_string())),
    };

    Ok(FragmentRecord { id, text })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
