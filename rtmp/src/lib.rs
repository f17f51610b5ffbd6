//! Server side RTMP ingest.
//!
//! This crate contains the pieces needed to accept a stream from an RTMP publisher: the
//! handshake, the chunk stream framing in both directions, the RTMP message types, the command
//! exchange a publisher goes through before sending media, and FLV output of the media it sends.
//!
//! Nothing in this crate performs I/O.  A `sessions::ServerSession` is handed the bytes read from
//! a connection and returns the bytes to write back, so it can be driven by any networking
//! stack.

#[cfg(test)]
#[macro_use]
mod test_utils;

pub mod binary;
pub mod chunk_io;
pub mod command_builder;
pub mod flv;
pub mod handshake;
pub mod messages;
pub mod sessions;
