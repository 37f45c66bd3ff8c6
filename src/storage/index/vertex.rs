use crate::primitives::bytes::ord;
use crate::types::{GraphRecordError, Result, VertexId, MAX_VID, VID_SIZE};

use super::{IndexEntry, IndexValue, SecondaryIndex};

/// Index from field values to vertex ids.
pub type VertexIndex = SecondaryIndex<VertexId>;
/// Packed list of vertex ids.
pub type VertexIndexValue = IndexValue<VertexId>;

impl IndexEntry for VertexId {
    const SIZE: usize = VID_SIZE;
    const PAIR_SCOPE_LEN: usize = 0;
    const MIN: Self = VertexId(0);
    const MAX: Self = VertexId(MAX_VID);

    fn write(&self, out: &mut Vec<u8>) {
        ord::put_uint_be(out, self.0 & MAX_VID, VID_SIZE);
    }

    fn check(&self) -> Result<()> {
        if self.0 > MAX_VID {
            return Err(GraphRecordError::InputError(format!(
                "Vertex id [{}] exceeds the maximum vertex id [{MAX_VID}].",
                self.0
            )));
        }
        Ok(())
    }

    fn read(src: &[u8]) -> Result<Self> {
        if src.len() < VID_SIZE {
            return Err(GraphRecordError::Corruption("vertex id truncated"));
        }
        ord::get_uint_be(src, VID_SIZE).map(VertexId)
    }
}
