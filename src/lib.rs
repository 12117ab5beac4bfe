//! # amqp-dispatch
//!
//! Frame-level protocol dispatcher for an AMQP-style messaging transport.
//!
//! This crate provides:
//! - Length-prefixed binary framing (8-byte fixed header, big-endian)
//! - A described-value codec covering the AMQP primitive types
//! - Performative dispatch through a fixed 256-slot action table
//! - A growable FIFO output buffer with scratch-backed frame assembly
//!
//! The dispatcher is a pure buffer-to-buffer transformation: bytes are fed
//! in with [`Dispatcher::feed`], registered handlers run per decoded frame
//! and may queue replies, and pending output is retrieved with
//! [`Dispatcher::drain`]. Socket I/O, TLS, SASL and protocol state
//! machines live in the surrounding layers.

pub mod buffer;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod table;
pub mod value;

pub use buffer::OutputBuffer;
pub use dispatch::{Dispatcher, FrameView, FrameWriter};
pub use error::{CodecError, DispatchError};
pub use frame::{FrameHeader, FRAME_HEADER_SIZE, MIN_DOFF};
pub use table::ActionTable;
pub use value::Value;

/// Frame-type tag for the AMQP framing layer.
pub const AMQP_FRAME_TYPE: u8 = 0x00;

/// Frame-type tag for the SASL framing layer.
pub const SASL_FRAME_TYPE: u8 = 0x01;

/// Size of the fixed scratch region used while encoding a frame body.
pub const SCRATCH_SIZE: usize = 1024;
