//! Property-based tests for the hyperedge model using proptest.
//!
//! - Parsing the serialized form reproduces an equal hyperedge
//! - `depth` follows `1 + max(depth(child))`
//! - The atom set of an edge is the union of its children's atom sets
