use thiserror::Error;
use uuid::Uuid;

use crate::decode::{Decoded, IssueKind, IssueLog};
use crate::field::{
    Field, KEY_FS_UUID, KEY_INSTANCE_ID, KEY_LABEL, KEY_STATE, MARKER_ENTRY, MARKER_NO_ENTRIES,
    RecordReader, RecordWriter,
};
use crate::instance::{InstanceId, VolumeState};
use crate::options::{Absorb, RawMountOptions};
use crate::request::{for_each_field, set_once};

const KIND_OK: &str = "OK";
const KIND_DATA: &str = "Data";
const KIND_ERROR: &str = "Error";

/// One volume as described in a `Data` reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeRecord {
    /// `InstanceID` field.
    pub instance: Option<InstanceId>,
    /// `State` field.
    pub state: Option<VolumeState>,
    /// `FSUUID` field, present once the worker has reported.
    pub fs_uuid: Option<Uuid>,
    /// `Label` field.
    pub label: Option<String>,
    /// Mount option fields.
    pub options: RawMountOptions,
}

impl VolumeRecord {
    fn encode(&self, writer: &mut RecordWriter) {
        if let Some(instance) = self.instance {
            writer.plain(KEY_INSTANCE_ID, instance);
        }
        if let Some(state) = self.state {
            writer.plain(KEY_STATE, state);
        }
        if let Some(fs_uuid) = self.fs_uuid {
            writer.plain(KEY_FS_UUID, fs_uuid.hyphenated());
        }
        if let Some(label) = &self.label {
            writer.counted(KEY_LABEL, label);
        }
        self.options.encode(writer);
    }

    fn absorb(&mut self, field: Field) -> Result<(), IssueKind> {
        match field {
            Field::InstanceId(id) => set_once(&mut self.instance, id),
            Field::State(state) => set_once(&mut self.state, state),
            Field::FsUuid(uuid) => set_once(&mut self.fs_uuid, uuid),
            Field::Label(label) => set_once(&mut self.label, label),
            other => match self.options.absorb(other) {
                Absorb::Taken => Ok(()),
                Absorb::Duplicate => Err(IssueKind::DuplicateField),
                Absorb::Declined(_) => Err(IssueKind::UnexpectedField),
            },
        }
    }
}

/// A message sent back by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The request succeeded and carries no data.
    Ok,
    /// `Data` reply holding a list of volumes, one `Entry` block each.
    Listing(Vec<VolumeRecord>),
    /// `Data` reply describing a single volume without `Entry` markers.
    Detail(VolumeRecord),
    /// The request failed; the text is meant for humans.
    Error(String),
}

/// Replies that cannot be interpreted at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplyDecodeError {
    /// Nothing was received.
    #[error("the reply was empty")]
    Empty,
    /// The header named no known reply kind.
    #[error("unrecognised reply kind '{0}'")]
    UnknownKind(String),
    /// A `Data` header arrived with no body.
    #[error("the data reply carried no data")]
    EmptyData,
}

impl Reply {
    /// Convenience constructor for error replies.
    #[must_use]
    pub fn error(description: impl Into<String>) -> Self {
        Self::Error(description.into())
    }

    /// Renders the reply in wire form.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::Ok => RecordWriter::header(KIND_OK).finish(),
            Self::Listing(records) => {
                let mut writer = RecordWriter::header(KIND_DATA);
                if records.is_empty() {
                    writer.marker(MARKER_NO_ENTRIES);
                }
                for record in records {
                    writer.marker(MARKER_ENTRY);
                    record.encode(&mut writer);
                }
                writer.finish()
            }
            Self::Detail(record) => {
                let mut writer = RecordWriter::header(KIND_DATA);
                record.encode(&mut writer);
                writer.finish()
            }
            Self::Error(description) => {
                let mut writer = RecordWriter::header(KIND_ERROR);
                writer.raw(description);
                if !description.ends_with('\n') {
                    writer.raw("\n");
                }
                writer.finish()
            }
        }
    }

    /// Decodes a reply.
    ///
    /// `Data` bodies are decoded laxly: unusable records are skipped and
    /// reported through [`Decoded::issues`].
    pub fn decode(text: &str) -> Result<Decoded<Self>, ReplyDecodeError> {
        if text.is_empty() {
            return Err(ReplyDecodeError::Empty);
        }
        let (header, body) = text.split_once('\n').unwrap_or((text, ""));
        match header {
            KIND_OK => Ok(Decoded::new(Self::Ok, Vec::new())),
            KIND_ERROR => {
                let description = body.strip_suffix('\n').unwrap_or(body);
                Ok(Decoded::new(Self::Error(description.to_owned()), Vec::new()))
            }
            KIND_DATA if body.is_empty() => Err(ReplyDecodeError::EmptyData),
            KIND_DATA => Ok(decode_data(body)),
            other => Err(ReplyDecodeError::UnknownKind(other.to_owned())),
        }
    }
}

fn decode_data(body: &str) -> Decoded<Reply> {
    let mut issues = IssueLog::default();
    let mut reader = RecordReader::new(body, 1);
    let mut records = Vec::new();
    let mut current = VolumeRecord::default();
    let mut entry_open = false;
    let mut current_touched = false;
    let mut no_entries = false;

    for_each_field(&mut reader, &mut issues, |field| match field {
        Field::Entry => {
            if entry_open || current_touched {
                records.push(std::mem::take(&mut current));
            }
            entry_open = true;
            current_touched = false;
            Ok(())
        }
        Field::NoEntries if entry_open || current_touched || !records.is_empty() => {
            Err(IssueKind::UnexpectedField)
        }
        Field::NoEntries => {
            no_entries = true;
            Ok(())
        }
        other => {
            current_touched = true;
            current.absorb(other)
        }
    });

    let reply = if entry_open || no_entries {
        if entry_open || current_touched {
            records.push(current);
        }
        Reply::Listing(records)
    } else {
        Reply::Detail(current)
    };
    Decoded::new(reply, issues.into_issues())
}
