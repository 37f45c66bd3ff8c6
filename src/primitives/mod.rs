//! Low-level primitives shared by the record and index layers.

/// Byte-level utilities and encoding/decoding.
///
/// Order-preserving key encodings, varints, and a parsing cursor.
pub mod bytes;
