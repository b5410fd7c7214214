use std::fmt;

use tracing::debug;

use crate::PROTOCOL_TARGET;

/// Longest excerpt of an offending line kept in a [`LineIssue`].
const EXCERPT_CHARS: usize = 80;

/// Reason a record was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    /// The key is not part of the protocol.
    UnknownField,
    /// A length prefix was missing, non-numeric, or overran the record.
    BadLength,
    /// Bytes followed a counted value on its last line; the value was kept.
    TrailingBytes,
    /// A numeric value failed to parse.
    BadNumber,
    /// A value was present but not acceptable for its key.
    BadValue,
    /// A blank line appeared inside the message body.
    EmptyLine,
    /// The field is valid but has no meaning in this message.
    UnexpectedField,
    /// A single-valued field appeared more than once; the first value wins.
    DuplicateField,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::UnknownField => "unknown field",
            Self::BadLength => "malformed length prefix",
            Self::TrailingBytes => "bytes beyond the declared length",
            Self::BadNumber => "malformed number",
            Self::BadValue => "malformed value",
            Self::EmptyLine => "empty line",
            Self::UnexpectedField => "field not valid in this message",
            Self::DuplicateField => "duplicate field",
        };
        formatter.write_str(text)
    }
}

/// Diagnostic for one record the decoder could not use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIssue {
    /// One-based line number within the message (the header is line 0).
    pub line: usize,
    /// Why the record was skipped.
    pub kind: IssueKind,
    /// Leading excerpt of the offending line.
    pub excerpt: String,
}

impl LineIssue {
    pub(crate) fn new(line: usize, kind: IssueKind, text: &str) -> Self {
        Self {
            line,
            kind,
            excerpt: text.chars().take(EXCERPT_CHARS).collect(),
        }
    }
}

impl fmt::Display for LineIssue {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "line {}: {} ({:?})", self.line, self.kind, self.excerpt)
    }
}

/// Result of a lax decode: the best-effort message plus every skipped line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded<T> {
    /// Message assembled from the records that could be understood.
    pub message: T,
    /// Records that were skipped, in input order.
    pub issues: Vec<LineIssue>,
}

impl<T> Decoded<T> {
    pub(crate) const fn new(message: T, issues: Vec<LineIssue>) -> Self {
        Self { message, issues }
    }

    /// Returns `true` when at least one line could not be understood.
    #[must_use]
    pub fn had_unintelligible_lines(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Discards the diagnostics.
    #[must_use]
    pub fn into_message(self) -> T {
        self.message
    }
}

/// Collects issues and logs each one as it is recorded.
#[derive(Debug, Default)]
pub(crate) struct IssueLog {
    issues: Vec<LineIssue>,
}

impl IssueLog {
    pub(crate) fn record(&mut self, issue: LineIssue) {
        debug!(
            target: PROTOCOL_TARGET,
            line = issue.line,
            kind = %issue.kind,
            excerpt = %issue.excerpt,
            "skipping unintelligible record"
        );
        self.issues.push(issue);
    }

    pub(crate) fn into_issues(self) -> Vec<LineIssue> {
        self.issues
    }
}
