//! Record-level grammar shared by every message.
//!
//! A record is either a plain line (`Key|value`, or a bare marker such as
//! `Entry`) or a counted record (`Key|<len>|<bytes>`). Counted values are
//! sliced by their declared byte length, so they may contain `|` and `\n`.

use std::str::FromStr;

use uuid::Uuid;

use crate::decode::{IssueKind, LineIssue};
use crate::instance::{InstanceId, VolumeState};

pub(crate) const KEY_SUBVOL: &str = "Option|Subvol";
pub(crate) const KEY_SUBVOL_ID: &str = "Option|SubvolID";
pub(crate) const KEY_DUMP: &str = "Option|Dump";
pub(crate) const KEY_TEST_RUN: &str = "Option|TestRun";
pub(crate) const KEY_MOUNT_POINT: &str = "MountPoint";
pub(crate) const KEY_DEVICE: &str = "Device";
pub(crate) const KEY_INSTANCE_ID: &str = "InstanceID";
pub(crate) const KEY_STATE: &str = "State";
pub(crate) const KEY_FS_UUID: &str = "FSUUID";
pub(crate) const KEY_LABEL: &str = "Label";
pub(crate) const MARKER_ENTRY: &str = "Entry";
pub(crate) const MARKER_NO_ENTRIES: &str = "No Entries";

/// Keys whose value is length-prefixed. Legacy list keys are accepted as
/// aliases when decoding but never emitted.
const COUNTED_KEYS: &[(&str, CountedKey)] = &[
    (KEY_SUBVOL, CountedKey::Subvol),
    (KEY_DUMP, CountedKey::Dump),
    (KEY_MOUNT_POINT, CountedKey::MountPoint),
    (KEY_DEVICE, CountedKey::Device),
    (KEY_LABEL, CountedKey::Label),
    ("mountData|mountPoint", CountedKey::MountPoint),
    ("mountData|devices", CountedKey::Device),
    ("label", CountedKey::Label),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CountedKey {
    Subvol,
    Dump,
    MountPoint,
    Device,
    Label,
}

/// A decoded record, independent of the message it appeared in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Field {
    Subvol(String),
    SubvolId(u64),
    Dump(String),
    TestRun(bool),
    MountPoint(String),
    Device(String),
    InstanceId(InstanceId),
    State(VolumeState),
    FsUuid(Uuid),
    Label(String),
    Entry,
    NoEntries,
}

impl Field {
    fn from_counted(key: CountedKey, value: &str) -> Self {
        let value = value.to_owned();
        match key {
            CountedKey::Subvol => Self::Subvol(value),
            CountedKey::Dump => Self::Dump(value),
            CountedKey::MountPoint => Self::MountPoint(value),
            CountedKey::Device => Self::Device(value),
            CountedKey::Label => Self::Label(value),
        }
    }

    fn from_plain(line: &str) -> Result<Self, IssueKind> {
        match line {
            MARKER_ENTRY => return Ok(Self::Entry),
            MARKER_NO_ENTRIES => return Ok(Self::NoEntries),
            KEY_TEST_RUN => return Ok(Self::TestRun(true)),
            _ => {}
        }

        let (key, value) = line.rsplit_once('|').ok_or(IssueKind::UnknownField)?;
        match key {
            KEY_SUBVOL_ID => parse_number(value).map(Self::SubvolId),
            KEY_TEST_RUN => parse_bool(value).map(Self::TestRun),
            KEY_INSTANCE_ID => parse_value(value).map(Self::InstanceId),
            KEY_STATE => parse_value(value).map(Self::State),
            KEY_FS_UUID | "fsUUID" => parse_value(value).map(Self::FsUuid),
            _ => Err(IssueKind::UnknownField),
        }
    }
}

fn parse_number(value: &str) -> Result<u64, IssueKind> {
    value.parse().map_err(|_| IssueKind::BadNumber)
}

fn parse_bool(value: &str) -> Result<bool, IssueKind> {
    match value {
        "True" => Ok(true),
        "False" => Ok(false),
        _ => Err(IssueKind::BadValue),
    }
}

fn parse_value<T: FromStr>(value: &str) -> Result<T, IssueKind> {
    value.parse().map_err(|_| IssueKind::BadValue)
}

/// Walks the body of a message record by record.
pub(crate) struct RecordReader<'a> {
    input: &'a str,
    offset: usize,
    line: usize,
    last_line: usize,
    pending: Option<LineIssue>,
}

impl<'a> RecordReader<'a> {
    /// Starts reading `input`; `first_line` numbers the first record.
    pub(crate) const fn new(input: &'a str, first_line: usize) -> Self {
        Self {
            input,
            offset: 0,
            line: first_line,
            last_line: first_line,
            pending: None,
        }
    }

    fn rest(&self) -> &'a str {
        self.input.get(self.offset..).unwrap_or_default()
    }

    /// Returns the next record, or `None` once the input is exhausted.
    ///
    /// A final empty line produced by the trailing newline is not a record.
    pub(crate) fn next_record(&mut self) -> Option<Result<Field, LineIssue>> {
        if let Some(issue) = self.pending.take() {
            self.last_line = issue.line;
            return Some(Err(issue));
        }
        let rest = self.rest();
        if rest.is_empty() {
            return None;
        }
        let line_number = self.line;
        self.last_line = line_number;
        let physical = rest.split('\n').next().unwrap_or_default();

        if let Some((key, after_key)) = counted_key(physical) {
            return Some(self.read_counted(key, after_key, physical, line_number));
        }

        self.advance_line(physical);
        if physical.is_empty() {
            return Some(Err(LineIssue::new(line_number, IssueKind::EmptyLine, physical)));
        }
        Some(
            Field::from_plain(physical)
                .map_err(|kind| LineIssue::new(line_number, kind, physical)),
        )
    }

    fn read_counted(
        &mut self,
        key: CountedKey,
        after_key: usize,
        physical: &'a str,
        line_number: usize,
    ) -> Result<Field, LineIssue> {
        let header = physical.get(after_key..).unwrap_or_default();
        let Some((length_text, _)) = header.split_once('|') else {
            self.advance_line(physical);
            return Err(LineIssue::new(line_number, IssueKind::BadLength, physical));
        };
        let Ok(length) = length_text.parse::<usize>() else {
            self.advance_line(physical);
            return Err(LineIssue::new(line_number, IssueKind::BadLength, physical));
        };

        let value_start = self.offset + after_key + length_text.len() + 1;
        let value = value_start
            .checked_add(length)
            .and_then(|end| self.input.get(value_start..end));
        let Some(value) = value else {
            self.advance_line(physical);
            return Err(LineIssue::new(line_number, IssueKind::BadLength, physical));
        };

        // Bytes between the declared end and the next newline are dropped
        // and reported after the value is handed out.
        let value_end = value_start + length;
        let tail = self.input.get(value_end..).unwrap_or_default();
        let leftover = tail.split('\n').next().unwrap_or_default();
        let embedded_newlines = value.matches('\n').count();
        if !leftover.is_empty() {
            self.pending = Some(LineIssue::new(
                line_number + embedded_newlines,
                IssueKind::TrailingBytes,
                leftover,
            ));
        }

        self.line += 1 + embedded_newlines;
        self.offset = (value_end + leftover.len() + 1).min(self.input.len());
        Ok(Field::from_counted(key, value))
    }

    /// Line number at which the most recently returned record started.
    pub(crate) const fn last_line(&self) -> usize {
        self.last_line
    }

    fn advance_line(&mut self, physical: &str) {
        self.offset = (self.offset + physical.len() + 1).min(self.input.len());
        self.line += 1;
    }
}

/// Matches a counted key at the start of `line`, returning the key and the
/// offset just past its trailing `|`.
fn counted_key(line: &str) -> Option<(CountedKey, usize)> {
    COUNTED_KEYS.iter().find_map(|(prefix, key)| {
        line.strip_prefix(prefix)
            .filter(|rest| rest.starts_with('|'))
            .map(|_| (*key, prefix.len() + 1))
    })
}

/// Accumulates records into the wire form. Encoding never fails.
#[derive(Debug, Default)]
pub(crate) struct RecordWriter {
    buffer: String,
}

impl RecordWriter {
    pub(crate) fn header(kind: &str) -> Self {
        let mut writer = Self::default();
        writer.marker(kind);
        writer
    }

    pub(crate) fn marker(&mut self, text: &str) {
        self.buffer.push_str(text);
        self.buffer.push('\n');
    }

    pub(crate) fn plain(&mut self, key: &str, value: impl std::fmt::Display) {
        self.buffer.push_str(&format!("{key}|{value}\n"));
    }

    pub(crate) fn counted(&mut self, key: &str, value: &str) {
        self.buffer
            .push_str(&format!("{key}|{}|{value}\n", value.len()));
    }

    pub(crate) fn raw(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    pub(crate) fn finish(self) -> String {
        self.buffer
    }
}
