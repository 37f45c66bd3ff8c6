use serde::{Deserialize, Serialize};

use crate::types::{GraphRecordError, Result};

/// Largest variable-length value a single field may hold.
pub const MAX_STRING_SIZE: usize = (1 << 22) - 1;
/// Largest record (all fields together).
pub const MAX_RECORD_SIZE: usize = (1 << 24) - 1;
/// Serialized size above which a packed index value is split.
pub const NODE_SPLIT_THRESHOLD: usize = 1000;
/// Largest physical index key.
pub const MAX_KEY_SIZE: usize = 480;
/// Maximum number of fields in one schema.
pub const MAX_NUM_FIELDS: usize = 1024;

/// Physical record layout chosen for a label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    /// Schema-wide fixed offsets; cheap reads, alteration rewrites records.
    #[default]
    Eager,
    /// Per-record field count and offset table; alteration is lazy.
    SelfDescribing,
}

/// Tuning knobs for secondary indexes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexOptions {
    /// Packed values larger than this many bytes are split.
    pub split_threshold: usize,
    /// Largest accepted physical key.
    pub max_key_size: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            split_threshold: NODE_SPLIT_THRESHOLD,
            max_key_size: MAX_KEY_SIZE,
        }
    }
}

/// Configuration supplied when building a [`crate::storage::schema::Schema`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Record layout strategy.
    pub layout: LayoutKind,
    /// Whether records start with the label id.
    pub label_in_record: bool,
    /// Index tuning.
    pub index: IndexOptions,
    /// Maximum record size in bytes.
    pub max_record_size: usize,
    /// Maximum variable-length field size in bytes.
    pub max_field_size: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            layout: LayoutKind::Eager,
            label_in_record: true,
            index: IndexOptions::default(),
            max_record_size: MAX_RECORD_SIZE,
            max_field_size: MAX_STRING_SIZE,
        }
    }
}

impl StoreOptions {
    /// Selects the record layout.
    pub fn layout(mut self, layout: LayoutKind) -> Self {
        self.layout = layout;
        self
    }

    /// Enables or disables the label-id record prefix.
    pub fn label_in_record(mut self, enabled: bool) -> Self {
        self.label_in_record = enabled;
        self
    }

    /// Sets the index value split threshold in bytes.
    pub fn split_threshold(mut self, bytes: usize) -> Self {
        self.index.split_threshold = bytes;
        self
    }

    /// Sets the maximum physical index key size.
    pub fn max_key_size(mut self, bytes: usize) -> Self {
        self.index.max_key_size = bytes;
        self
    }

    /// Sets the maximum record size.
    pub fn max_record_size(mut self, bytes: usize) -> Self {
        self.max_record_size = bytes;
        self
    }

    /// Sets the maximum variable field size.
    pub fn max_field_size(mut self, bytes: usize) -> Self {
        self.max_field_size = bytes;
        self
    }

    /// Parses options from JSON, filling unspecified keys with defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let opts: Self = serde_json::from_str(text)
            .map_err(|e| GraphRecordError::InputError(format!("invalid store options: {e}")))?;
        opts.validate()?;
        Ok(opts)
    }

    /// Rejects combinations the encoders cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.max_field_size > self.max_record_size {
            return Err(GraphRecordError::Invalid(
                "max_field_size exceeds max_record_size",
            ));
        }
        if self.max_record_size > i32::MAX as usize {
            return Err(GraphRecordError::Invalid(
                "max_record_size does not fit a record offset",
            ));
        }
        if self.index.split_threshold == 0 || self.index.max_key_size == 0 {
            return Err(GraphRecordError::Invalid("index limits must be non-zero"));
        }
        Ok(())
    }
}
