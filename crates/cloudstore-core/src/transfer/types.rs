//! Transfer units.
//!
//! A `Downloadable` names a remote file; an `Uploadable` pairs that name with
//! the bytes to send. Backends are generic over both traits so applications
//! can bring their own record types. `RemoteFile` and `LocalFile` are the
//! ready-made implementations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier of a remote file.
///
/// This is the sole identity key for transfer units and the key of every
/// `Multiple` error map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RecordId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A value identifying a remote file, optionally holding its local payload.
pub trait Downloadable: Clone + Send + Sync + 'static {
    /// The uploadable type kept as local storage.
    type Payload: Uploadable;

    /// The stable identifier of the remote file.
    fn record_identifier(&self) -> RecordId;

    /// The file extension without a leading dot, if known.
    fn file_extension(&self) -> Option<&str>;

    /// Locally-held payload, set after a download or before an upload.
    fn storage(&self) -> Option<&Self::Payload>;

    /// Attach local storage.
    fn set_storage(&mut self, storage: Option<Self::Payload>);

    /// Same as `record_identifier`.
    fn id(&self) -> RecordId {
        self.record_identifier()
    }

    /// The payload bytes of the local storage, if any.
    fn local_data(&self) -> Option<&[u8]> {
        self.storage().and_then(Uploadable::payload)
    }

    /// File name used when a download lands in a directory.
    fn file_name(&self) -> String {
        match self.file_extension().filter(|ext| !ext.is_empty()) {
            Some(ext) => format!("{}.{ext}", self.record_identifier()),
            None => self.record_identifier().to_string(),
        }
    }
}

/// A local file staged for upload.
pub trait Uploadable: Clone + Send + Sync + 'static {
    /// The remote reference this value describes.
    type Metadata: Downloadable;

    /// The remote reference this value describes.
    fn metadata(&self) -> &Self::Metadata;

    /// Mutable access to the metadata, used by backends after a successful upload.
    fn metadata_mut(&mut self) -> &mut Self::Metadata;

    /// The bytes to send.
    fn payload(&self) -> Option<&[u8]>;

    /// Identity of this value, always equal to the metadata's identifier.
    fn id(&self) -> RecordId {
        self.metadata().record_identifier()
    }

    /// True when there is at least one byte to send.
    fn has_payload(&self) -> bool {
        self.payload().is_some_and(|bytes| !bytes.is_empty())
    }
}

/// Ready-made remote file reference.
///
/// Equality and hashing use only the record identifier.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteFile {
    record_identifier: RecordId,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_extension: Option<String>,
    #[serde(skip)]
    storage: Option<Box<LocalFile>>,
}

impl RemoteFile {
    /// Create a reference to an existing remote file.
    #[must_use]
    pub const fn new(record_identifier: RecordId) -> Self {
        Self {
            record_identifier,
            file_extension: None,
            storage: None,
        }
    }

    /// Create a reference with a fresh identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self::new(RecordId::new())
    }

    /// Set the file extension.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.file_extension = Some(extension.into());
        self
    }
}

impl PartialEq for RemoteFile {
    fn eq(&self, other: &Self) -> bool {
        self.record_identifier == other.record_identifier
    }
}

impl Eq for RemoteFile {}

impl Hash for RemoteFile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.record_identifier.hash(state);
    }
}

impl Downloadable for RemoteFile {
    type Payload = LocalFile;

    fn record_identifier(&self) -> RecordId {
        self.record_identifier
    }

    fn file_extension(&self) -> Option<&str> {
        self.file_extension.as_deref()
    }

    fn storage(&self) -> Option<&LocalFile> {
        self.storage.as_deref()
    }

    fn set_storage(&mut self, storage: Option<LocalFile>) {
        self.storage = storage.map(Box::new);
    }
}

/// Ready-made uploadable: a `RemoteFile` plus the bytes to send.
#[derive(Clone, Debug)]
pub struct LocalFile {
    metadata: RemoteFile,
    payload: Option<Vec<u8>>,
}

impl LocalFile {
    /// Pair metadata with a payload.
    #[must_use]
    pub const fn new(metadata: RemoteFile, payload: Option<Vec<u8>>) -> Self {
        Self { metadata, payload }
    }

    /// Create an uploadable with a fresh identifier.
    #[must_use]
    pub fn from_bytes(payload: impl Into<Vec<u8>>) -> Self {
        Self::new(RemoteFile::generate(), Some(payload.into()))
    }

    /// Consume and return the metadata.
    #[must_use]
    pub fn into_metadata(self) -> RemoteFile {
        self.metadata
    }
}

impl PartialEq for LocalFile {
    fn eq(&self, other: &Self) -> bool {
        self.metadata == other.metadata
    }
}

impl Eq for LocalFile {}

impl Uploadable for LocalFile {
    type Metadata = RemoteFile;

    fn metadata(&self) -> &RemoteFile {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut RemoteFile {
        &mut self.metadata
    }

    fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }
}
