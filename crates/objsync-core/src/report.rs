//! Line-oriented migration report.
//!
//! Format, one record per line:
//!
//! ```text
//! <unix-ts>,ok,<verified>,<key>
//! <unix-ts>,fail,false,<key>,<error>
//! ```
//!
//! The same text is accepted back as resume input, mixed freely with bare
//! one-key-per-line listings.

use std::fmt;

use chrono::Utc;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

use crate::types::{OutcomeStatus, SyncOutcome};

pub const FIELD_DELIMITER: char = ',';
pub const STATUS_OK: &str = "ok";
pub const STATUS_FAIL: &str = "fail";

/// One durable report line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRecord {
    pub timestamp: i64,
    pub key: String,
    pub status: OutcomeStatus,
}

impl ReportRecord {
    pub fn new(outcome: &SyncOutcome, timestamp: i64) -> Self {
        ReportRecord {
            timestamp,
            key: outcome.key.clone(),
            status: outcome.status.clone(),
        }
    }

    pub fn now(outcome: &SyncOutcome) -> Self {
        Self::new(outcome, Utc::now().timestamp())
    }
}

impl fmt::Display for ReportRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            OutcomeStatus::Synced { verified } => {
                write!(f, "{},{STATUS_OK},{},{}", self.timestamp, verified, self.key)
            }
            OutcomeStatus::Failed { error } => write!(
                f,
                "{},{STATUS_FAIL},false,{},{}",
                self.timestamp,
                self.key,
                error.replace(['\r', '\n'], " ")
            ),
        }
    }
}

/// Prior status of a report line read back as resume input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriorStatus {
    Ok { verified: bool },
    Fail,
    Unrecognized(String),
}

/// Classification of one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLine {
    /// A bare key from a fresh listing.
    Key(String),
    /// A record from a previous report.
    Record { status: PriorStatus, key: String },
    /// Nothing usable; the reason is for diagnostics.
    Malformed(&'static str),
}

impl InputLine {
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
        match fields.len() {
            1 => {
                let key = fields[0].trim();
                if key.is_empty() {
                    InputLine::Malformed("empty object key")
                } else {
                    InputLine::Key(key.to_string())
                }
            }
            2 | 3 => InputLine::Malformed("record has too few fields"),
            _ => {
                let key = fields[3].trim();
                if key.is_empty() {
                    return InputLine::Malformed("empty object key");
                }
                let status = match fields[1].trim() {
                    STATUS_OK => PriorStatus::Ok {
                        verified: fields[2].trim() != "false",
                    },
                    STATUS_FAIL => PriorStatus::Fail,
                    other => PriorStatus::Unrecognized(other.to_string()),
                };
                InputLine::Record {
                    status,
                    key: key.to_string(),
                }
            }
        }
    }
}

/// Appends records and flushes after each one.
pub struct ReportWriter<W> {
    inner: BufWriter<W>,
}

impl<W: AsyncWrite + Unpin> ReportWriter<W> {
    pub fn new(inner: W) -> Self {
        ReportWriter {
            inner: BufWriter::new(inner),
        }
    }

    pub async fn record(&mut self, outcome: &SyncOutcome) -> std::io::Result<()> {
        self.write_record(&ReportRecord::now(outcome)).await
    }

    pub async fn write_record(&mut self, record: &ReportRecord) -> std::io::Result<()> {
        let line = format!("{record}\n");
        self.inner.write_all(line.as_bytes()).await?;
        self.inner.flush().await
    }

    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_ok_line() {
        let record = ReportRecord::new(&SyncOutcome::synced("k1", true), 1577358017);
        assert_eq!(record.to_string(), "1577358017,ok,true,k1");
        let record = ReportRecord::new(&SyncOutcome::synced("k2", false), 1577358017);
        assert_eq!(record.to_string(), "1577358017,ok,false,k2");
    }

    #[test]
    fn test_encode_fail_line_flattens_newlines() {
        let record = ReportRecord::new(&SyncOutcome::failed("k1", "bad\nthings\r\nhappened"), 7);
        assert_eq!(record.to_string(), "7,fail,false,k1,bad things  happened");
    }

    #[test]
    fn test_parse_bare_key() {
        assert_eq!(
            InputLine::parse("f423580f-cb2c-40b5-96db-a03553ab70b2\n"),
            InputLine::Key("f423580f-cb2c-40b5-96db-a03553ab70b2".into())
        );
        assert_eq!(InputLine::parse("  \n"), InputLine::Malformed("empty object key"));
    }

    #[test]
    fn test_parse_records() {
        assert_eq!(
            InputLine::parse("1577358017,fail,false,k1,f423580f-cb2c"),
            InputLine::Record {
                status: PriorStatus::Fail,
                key: "k1".into()
            }
        );
        assert_eq!(
            InputLine::parse("1577358017,ok,true,k2\n"),
            InputLine::Record {
                status: PriorStatus::Ok { verified: true },
                key: "k2".into()
            }
        );
        assert_eq!(
            InputLine::parse("1,ok,false,k3"),
            InputLine::Record {
                status: PriorStatus::Ok { verified: false },
                key: "k3".into()
            }
        );
        assert_eq!(
            InputLine::parse("1,retry,false,k4"),
            InputLine::Record {
                status: PriorStatus::Unrecognized("retry".into()),
                key: "k4".into()
            }
        );
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(InputLine::parse("1,ok"), InputLine::Malformed(_)));
        assert!(matches!(InputLine::parse("1,ok,true"), InputLine::Malformed(_)));
        assert!(matches!(InputLine::parse("1,fail,false,,err"), InputLine::Malformed(_)));
    }

    #[test]
    fn test_fail_line_with_commas_in_error_reparses() {
        let record = ReportRecord::new(&SyncOutcome::failed("k9", "a, b, c"), 3);
        assert_eq!(
            InputLine::parse(&record.to_string()),
            InputLine::Record {
                status: PriorStatus::Fail,
                key: "k9".into()
            }
        );
    }

    #[tokio::test]
    async fn test_writer_appends_lines() {
        let mut writer = ReportWriter::new(Vec::new());
        writer.record(&SyncOutcome::synced("a", true)).await.unwrap();
        writer.record(&SyncOutcome::failed("b", "boom")).await.unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(",ok,true,a"));
        assert!(lines[1].ends_with(",fail,false,b,boom"));
        assert!(text.ends_with('\n'));
    }
}
