// Detector Pipe Data Models
// Per-invocation values: provider selection, outcome, log records

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::ser::{Formatter, PrettyFormatter};
use serde_json::Value;
use std::fmt;
use std::io;

// ============ Provider Selection ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// GPTZero `/v2/predict/text`
    #[value(name = "gptzero")]
    GptZero,
    /// ZeroGPT `/api/detect/detectText`
    #[value(name = "zerogpt")]
    ZeroGpt,
    /// Sapling `/api/v1/aidetect`
    #[value(name = "sapling")]
    Sapling,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [ProviderKind::GptZero, ProviderKind::ZeroGpt, ProviderKind::Sapling];

    /// Key used in the config file and as the log file prefix.
    pub fn slug(self) -> &'static str {
        match self {
            ProviderKind::GptZero => "gptzero",
            ProviderKind::ZeroGpt => "zerogpt",
            ProviderKind::Sapling => "sapling",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ProviderKind::GptZero => "GPTZero",
            ProviderKind::ZeroGpt => "ZeroGPT",
            ProviderKind::Sapling => "Sapling",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

// ============ Invocation Outcome ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    EmptyInput,
    MissingCredential,
    ClientTransportError,
    HttpStatusError,
    UnexpectedError,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InvocationResult {
    Success(Value),
    Failure { message: String, kind: FailureKind },
}

impl InvocationResult {
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            InvocationResult::Success(_) => None,
            InvocationResult::Failure { kind, .. } => Some(*kind),
        }
    }

    /// Map the outcome onto the process contract.
    ///
    /// Only an empty input goes to stderr with a non-zero exit; every other
    /// failure is printed to stdout and the process still exits 0, so callers
    /// that branch on the empty-input case keep working.
    pub fn render(&self) -> PipeOutput {
        match self {
            InvocationResult::Success(body) => PipeOutput {
                stream: OutputStream::Stdout,
                text: pretty_json(body),
                exit_code: 0,
            },
            InvocationResult::Failure {
                message,
                kind: FailureKind::EmptyInput,
            } => PipeOutput {
                stream: OutputStream::Stderr,
                text: message.clone(),
                exit_code: 1,
            },
            InvocationResult::Failure { message, .. } => PipeOutput {
                stream: OutputStream::Stdout,
                text: message.clone(),
                exit_code: 0,
            },
        }
    }
}

/// Two-space indented JSON, key order as received, non-ASCII escaped as `\uXXXX`.
pub fn pretty_json(value: &Value) -> String {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, AsciiPrettyFormatter::new());
    // Serializing a `Value` cannot fail: keys are always strings.
    if value.serialize(&mut ser).is_err() {
        return value.to_string();
    }
    String::from_utf8(buf).unwrap_or_else(|_| value.to_string())
}

/// `PrettyFormatter` with every char above U+007F written as UTF-16 escapes
/// (surrogate pairs outside the BMP).
struct AsciiPrettyFormatter<'a> {
    inner: PrettyFormatter<'a>,
}

impl AsciiPrettyFormatter<'_> {
    fn new() -> Self {
        Self {
            inner: PrettyFormatter::with_indent(b"  "),
        }
    }
}

impl Formatter for AsciiPrettyFormatter<'_> {
    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_array(writer)
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.inner.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_object(writer)
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.inner.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object_value(writer)
    }

    fn write_string_fragment<W: ?Sized + io::Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        let mut start = 0;
        for (i, c) in fragment.char_indices() {
            if c.is_ascii() {
                continue;
            }
            writer.write_all(fragment[start..i].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = i + c.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

// ============ Rendered Output ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeOutput {
    pub stream: OutputStream,
    /// Written followed by a single newline.
    pub text: String,
    pub exit_code: u8,
}

// ============ Audit Log ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl LogRecord {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            message: message.into(),
        }
    }
}
