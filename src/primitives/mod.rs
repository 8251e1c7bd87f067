//! Low-level primitives shared by the storage engine.

/// Byte-level utilities: big-endian encoders, terminated strings, hashing.
pub mod bytes;
