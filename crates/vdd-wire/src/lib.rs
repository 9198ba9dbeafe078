//! Protobuf wire codec.
//!
//! Implements the raw varint/fixed/length-delimited wire format plus a
//! heuristic tree decoder (`pbDecodeTree`) that turns opaque protobuf bytes
//! of unknown schema into an annotated tree — the starting point for
//! schema inference in `vdd-engine`. Also covers the sibling JSPB
//! positional-array encoding, which shares the same field-number-indexed
//! tree shape.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod jspb;
pub mod tree;
pub mod varint;

pub use tree::{decode_tree, DecodeError, LenValue, TreeNode};
pub use varint::{decode_varint, encode_varint, zigzag_decode, VarintValue};
