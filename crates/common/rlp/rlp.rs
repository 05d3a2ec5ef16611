//! Recursive Length Prefix encoding.
//!
//! Every value is either a byte string or a list of values. Integers are
//! encoded as minimal big-endian byte strings, structs as lists of their
//! fields in declaration order (see [`structs`]).

pub mod constants;
pub mod decode;
pub mod encode;
pub mod error;
pub mod structs;
