//! Record encoding and secondary indexes for property-graph labels.
//!
//! Records are flat byte buffers laid out by a per-label [`Schema`]. Field
//! values are read and written through [`field::FieldExtractor`]s, and the
//! schema keeps its [`index`] tables in step with record changes.

/// Field types, typed values, and per-field record accessors.
pub mod field;

/// Secondary indexes over vertex and edge fields.
///
/// Unique, pair-unique, and packed non-unique layouts on top of the KV store.
pub mod index;

/// Growable record buffer with bounds-checked access.
pub mod record;

/// Per-label layout, alteration, and index maintenance.
pub mod schema;

pub use field::{FieldData, FieldExtractor, FieldSpec, FieldType};
pub use index::{EdgeIndex, IndexUniqueness, VertexIndex};
pub use record::Record;
pub use schema::{EdgeConstraint, FullTextEntry, Schema, TemporalOrder};
