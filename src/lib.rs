//! Property-graph record encoding and secondary indexes.
//!
//! A [`storage::Schema`] describes the fields of one vertex or edge label and
//! lays records out either eagerly (fixed offsets shared by every record) or
//! self-describingly (each record carries its own field table, so schema
//! changes need no rewrite). Indexes map encoded field values to vertex ids
//! or edge uids inside any store implementing [`kv::KvTransaction`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod kv;
pub mod options;
pub mod primitives;
pub mod storage;
pub mod telemetry;
pub mod types;

pub use options::{IndexOptions, LayoutKind, StoreOptions};
pub use types::{EdgeUid, GraphRecordError, LabelId, Result, VertexId};
