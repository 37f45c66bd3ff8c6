#![forbid(unsafe_code)]
//! Identifier newtypes and the crate-wide error type.

use std::fmt;

/// Checksum helpers for persisted blobs.
pub mod checksum;

/// Number of bytes a [`VertexId`] occupies on disk.
pub const VID_SIZE: usize = 5;
/// Number of bytes an [`EdgeUid`] occupies on disk.
pub const EUID_SIZE: usize = 24;
/// Largest vertex id representable in [`VID_SIZE`] bytes.
pub const MAX_VID: u64 = (1 << (8 * VID_SIZE)) - 1;

/// Dense identifier of a vertex.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct VertexId(pub u64);
/// Identifier of a vertex or edge label.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct LabelId(pub u16);
/// Per-pair edge sequence number.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct EdgeId(pub u32);
/// Temporal ordering component of an edge.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct TemporalId(pub i64);

/// Fully qualified edge identity.
///
/// Field order matches the on-disk order so the derived `Ord` agrees with
/// byte-wise comparison of the encoded form.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct EdgeUid {
    /// Source vertex.
    pub src: VertexId,
    /// Destination vertex.
    pub dst: VertexId,
    /// Edge label.
    pub lid: LabelId,
    /// Temporal component.
    pub tid: TemporalId,
    /// Sequence number among edges sharing the other components.
    pub eid: EdgeId,
}

impl EdgeUid {
    /// Builds an edge uid from its raw parts.
    pub fn new(src: u64, dst: u64, lid: u16, tid: i64, eid: u32) -> Self {
        Self {
            src: VertexId(src),
            dst: VertexId(dst),
            lid: LabelId(lid),
            tid: TemporalId(tid),
            eid: EdgeId(eid),
        }
    }
}

/// Errors raised by the record and index layer.
#[derive(thiserror::Error, Debug)]
pub enum GraphRecordError {
    /// Underlying I/O failure.
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    /// Broken on-disk invariant.
    #[error("corruption: {0}")]
    Corruption(&'static str),
    /// Caller violated an API contract.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
    /// Lookup target is absent.
    #[error("not found")]
    NotFound,
    /// Write attempted through a read-only transaction.
    #[error("transaction is read-only")]
    TxnReadOnly,
    /// User input rejected with a descriptive message.
    #[error("{0}")]
    InputError(String),
    /// No field with the given name or id.
    #[error("Field [{0}] does not exist.")]
    FieldNotFound(String),
    /// A live field already uses the name.
    #[error("Field [{0}] already exists.")]
    FieldAlreadyExists(String),
    /// Null written to a non-optional field.
    #[error("Field [{0}] is not optional.")]
    FieldCannotBeNull(String),
    /// Primary or temporal fields cannot be removed.
    #[error("Field [{0}] cannot be deleted.")]
    FieldCannotBeDeleted(String),
    /// Field count outside the allowed range.
    #[error("Invalid number of fields: {given}, must be between 1 and {max}.")]
    TooManyFields {
        /// Requested count.
        given: usize,
        /// Maximum allowed.
        max: usize,
    },
    /// String input did not parse as the declared type.
    #[error("Failed to set field [{field}]: Failed to parse string into type [{ty}], string is:{input}")]
    ParseStringFailed {
        /// Target field name.
        field: String,
        /// Declared field type.
        ty: String,
        /// Offending input.
        input: String,
    },
    /// Structured input of a type that cannot be converted.
    #[error("Cannot convert data of type [{from}] into [{to}]")]
    ParseIncompatibleType {
        /// Type of the supplied value.
        from: String,
        /// Declared field type.
        to: String,
    },
    /// Variable-length value exceeds the per-field maximum.
    #[error("Data size too big, max is {max}, given {given}")]
    DataSizeTooLarge {
        /// Maximum size in bytes.
        max: usize,
        /// Supplied size in bytes.
        given: usize,
    },
    /// Record would grow past the per-record maximum.
    #[error("Record size limit exceeded, max is {max}, got {given}")]
    RecordSizeLimitExceeded {
        /// Maximum size in bytes.
        max: usize,
        /// Size the record would reach.
        given: usize,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GraphRecordError>;

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EdgeUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}->{}#{}:{}:{}",
            self.src.0, self.dst.0, self.lid.0, self.tid.0, self.eid.0
        )
    }
}

impl From<u64> for VertexId {
    fn from(value: u64) -> Self {
        VertexId(value)
    }
}

impl From<VertexId> for u64 {
    fn from(value: VertexId) -> Self {
        value.0
    }
}

impl From<u16> for LabelId {
    fn from(value: u16) -> Self {
        LabelId(value)
    }
}
