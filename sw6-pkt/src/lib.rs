#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![no_std]

//! Bounds-checked wire codecs for the sw6 switch agent.
//!
//! Every header type is a thin view over a caller-supplied byte buffer;
//! `parse` performs the one length check, field accessors index into the
//! checked region. All multi-byte fields are big-endian on the wire.

#[cfg(any(feature = "std", test))]
extern crate std;

#[macro_use]
mod macros;

mod cursor;
pub use cursor::WriteCursor;

pub mod checksum;

pub mod ether;
pub mod icmpv6;
pub mod ipv6;
pub mod udp;
