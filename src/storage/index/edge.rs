use crate::primitives::bytes::ord;
use crate::types::{
    EdgeId, EdgeUid, GraphRecordError, LabelId, Result, TemporalId, VertexId, EUID_SIZE, VID_SIZE,
};

use super::{IndexEntry, IndexValue, SecondaryIndex};

/// Index from field values to edge uids.
pub type EdgeIndex = SecondaryIndex<EdgeUid>;
/// Packed list of edge uids.
pub type EdgeIndexValue = IndexValue<EdgeUid>;

impl IndexEntry for EdgeUid {
    const SIZE: usize = EUID_SIZE;
    const PAIR_SCOPE_LEN: usize = 2 * VID_SIZE;
    const MIN: Self = EdgeUid {
        src: VertexId(0),
        dst: VertexId(0),
        lid: LabelId(0),
        tid: TemporalId(i64::MIN),
        eid: EdgeId(0),
    };
    const MAX: Self = EdgeUid {
        src: <VertexId as IndexEntry>::MAX,
        dst: <VertexId as IndexEntry>::MAX,
        lid: LabelId(u16::MAX),
        tid: TemporalId(i64::MAX),
        eid: EdgeId(u32::MAX),
    };

    fn write(&self, out: &mut Vec<u8>) {
        self.src.write(out);
        self.dst.write(out);
        out.extend_from_slice(&self.lid.0.to_be_bytes());
        ord::put_int_be(out, self.tid.0, 8);
        out.extend_from_slice(&self.eid.0.to_be_bytes());
    }

    fn check(&self) -> Result<()> {
        self.src.check()?;
        self.dst.check()
    }

    fn read(src: &[u8]) -> Result<Self> {
        let b = src
            .get(..EUID_SIZE)
            .ok_or(GraphRecordError::Corruption("edge uid truncated"))?;
        Ok(EdgeUid {
            src: VertexId::read(&b[0..5])?,
            dst: VertexId::read(&b[5..10])?,
            lid: LabelId(u16::from_be_bytes([b[10], b[11]])),
            tid: TemporalId(ord::get_int_be(&b[12..20], 8)?),
            eid: EdgeId(u32::from_be_bytes([b[20], b[21], b[22], b[23]])),
        })
    }
}
