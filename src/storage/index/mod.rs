//! Secondary indexes from field values to vertex ids and edge uids.
//!
//! Index keys are order-preserving encodings of field values. Non-unique
//! indexes pack many ids into one value and append the value's largest id to
//! the key, so a hot key spreads over several physical entries that stay
//! sorted by id.

mod composite;
mod edge;
mod iter;
mod key;
mod table;
mod value;
mod vertex;

pub use composite::CompositeIndex;
pub use edge::{EdgeIndex, EdgeIndexValue};
pub use iter::IndexIter;
pub use key::KeyCodec;
pub use table::SecondaryIndex;
pub use value::{IndexEntry, IndexValue, ValueChange, MAX_ENTRIES};
pub use vertex::{VertexIndex, VertexIndexValue};

use std::fmt;

use crate::types::{GraphRecordError, Result};

/// How many ids a single key may map to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexUniqueness {
    /// One id per key across the whole index.
    GlobalUnique,
    /// One edge per key for each (src, dst) pair.
    PairUnique,
    /// Any number of ids per key.
    NonUnique,
}

impl IndexUniqueness {
    /// Persistent tag.
    pub const fn tag(self) -> u8 {
        match self {
            IndexUniqueness::GlobalUnique => 1,
            IndexUniqueness::PairUnique => 2,
            IndexUniqueness::NonUnique => 3,
        }
    }

    /// Decodes a persistent tag.
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(IndexUniqueness::GlobalUnique),
            2 => Ok(IndexUniqueness::PairUnique),
            3 => Ok(IndexUniqueness::NonUnique),
            _ => Err(GraphRecordError::Corruption("unknown index uniqueness tag")),
        }
    }

    /// Whether a key maps to at most one id (within its scope).
    pub const fn is_unique(self) -> bool {
        !matches!(self, IndexUniqueness::NonUnique)
    }
}

impl fmt::Display for IndexUniqueness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IndexUniqueness::GlobalUnique => "global_unique",
            IndexUniqueness::PairUnique => "pair_unique",
            IndexUniqueness::NonUnique => "non_unique",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniqueness_tags_roundtrip() {
        for u in [
            IndexUniqueness::GlobalUnique,
            IndexUniqueness::PairUnique,
            IndexUniqueness::NonUnique,
        ] {
            assert_eq!(IndexUniqueness::from_tag(u.tag()).unwrap(), u);
        }
        assert!(IndexUniqueness::from_tag(9).is_err());
        assert!(!IndexUniqueness::NonUnique.is_unique());
    }
}
