//! The dispatcher aggregate: frame demultiplexing, performative dispatch,
//! and outgoing frame assembly.
//!
//! One `Dispatcher` serves one logical byte stream. The transport feeds
//! received bytes into [`Dispatcher::feed`]; each complete frame is
//! decoded and the handler registered for its performative code runs with
//! a read view of the frame and the output path, so it can queue replies
//! mid-dispatch. Queued frames are retrieved with [`Dispatcher::drain`].
//!
//! Everything is synchronous and single-threaded: decode-side and
//! output-side state are disjoint, but a handler must not feed more input
//! into the same instance.

use crate::buffer::OutputBuffer;
use crate::error::DispatchError;
use crate::frame::{self, FrameHeader, FRAME_HEADER_SIZE, MIN_DOFF};
use crate::table::ActionTable;
use crate::value::Value;
use crate::SCRATCH_SIZE;

/// Read-only view of the frame currently being dispatched. The payload
/// borrow is only valid for the handler invocation; a handler that needs
/// the payload afterwards must copy it.
pub struct FrameView<'a> {
    channel: u16,
    code: u8,
    size: u32,
    args: &'a [Value],
    payload: &'a [u8],
}

impl<'a> FrameView<'a> {
    pub fn channel(&self) -> u16 {
        self.channel
    }

    pub fn code(&self) -> u8 {
        self.code
    }

    /// Total frame length as declared on the wire.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Argument at `index`, in wire order.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    pub fn args(&self) -> &[Value] {
        self.args
    }

    pub fn payload(&self) -> &[u8] {
        self.payload
    }
}

/// The output path: stages one outgoing frame at a time and appends the
/// finished frame to the output queue.
///
/// Field staging is positional and sparse; gaps are filled with
/// [`Value::Null`]. The payload accumulates across `append_payload`
/// calls. [`post_frame`](FrameWriter::post_frame) finalizes and clears
/// the staging state for the next frame.
pub struct FrameWriter {
    frame_type: u8,
    trace: bool,
    args: Vec<Value>,
    payload: Vec<u8>,
    scratch: Box<[u8; SCRATCH_SIZE]>,
    buffer: OutputBuffer,
}

impl FrameWriter {
    fn new(frame_type: u8) -> Self {
        Self {
            frame_type,
            trace: false,
            args: Vec::new(),
            payload: Vec::new(),
            scratch: Box::new([0u8; SCRATCH_SIZE]),
            buffer: OutputBuffer::new(),
        }
    }

    /// Stages `value` at argument position `index`.
    pub fn set_field(&mut self, index: usize, value: Value) {
        if self.args.len() <= index {
            self.args.resize(index + 1, Value::Null);
        }
        self.args[index] = value;
    }

    /// Appends raw bytes to the pending payload.
    pub fn append_payload(&mut self, data: &[u8]) {
        self.payload.extend_from_slice(data);
    }

    /// Finalizes the staged frame for `channel` and `code` and queues it.
    ///
    /// The body is encoded through the fixed scratch region when it fits;
    /// larger bodies are serialized straight into the output queue. On
    /// success the staging state is cleared for the next frame.
    pub fn post_frame(&mut self, channel: u16, code: u8) -> Result<(), DispatchError> {
        // absent trailing fields are omitted from the wire, not encoded
        while matches!(self.args.last(), Some(Value::Null)) {
            self.args.pop();
        }

        let body_len = frame::described_len(code, &self.args);
        let size = FRAME_HEADER_SIZE + body_len + self.payload.len();
        let header = FrameHeader {
            size: size as u32,
            doff: MIN_DOFF,
            frame_type: self.frame_type,
            channel,
        };

        self.buffer.reserve(size);
        if body_len <= SCRATCH_SIZE {
            let written = frame::encode_described(code, &self.args, &mut self.scratch[..])
                .map_err(DispatchError::Encode)?;
            header.encode(self.buffer.writer());
            self.buffer.extend(&self.scratch[..written]);
        } else {
            header.encode(self.buffer.writer());
            let args = &self.args;
            let mut encoded = Ok(0);
            self.buffer.extend_with(body_len, |region| {
                encoded = frame::encode_described(code, args, region);
            });
            encoded.map_err(DispatchError::Encode)?;
        }
        self.buffer.extend(&self.payload);

        if self.trace {
            tracing::trace!(channel, code, size, "frame posted");
        }
        self.args.clear();
        self.payload.clear();
        Ok(())
    }

    /// Bytes queued for transmission.
    pub fn pending(&self) -> usize {
        self.buffer.queued()
    }
}

/// Frame-level protocol dispatcher for one connection-like session.
///
/// `C` is the caller-owned context threaded through every handler
/// invocation; the dispatcher itself never inspects it.
pub struct Dispatcher<C> {
    frame_type: u8,
    trace: bool,
    table: ActionTable<C>,
    // input-side per-frame state, overwritten on every decode
    channel: u16,
    code: u8,
    size: u32,
    args: Vec<Value>,
    unhandled: u64,
    output: FrameWriter,
    context: C,
}

impl<C> Dispatcher<C> {
    /// Creates a dispatcher speaking the given framing layer.
    pub fn new(frame_type: u8, context: C) -> Self {
        Self {
            frame_type,
            trace: false,
            table: ActionTable::new(),
            channel: 0,
            code: 0,
            size: 0,
            args: Vec::new(),
            unhandled: 0,
            output: FrameWriter::new(frame_type),
            context,
        }
    }

    /// Enables per-frame trace diagnostics. Orthogonal to correctness.
    pub fn set_trace(&mut self, on: bool) {
        self.trace = on;
        self.output.trace = on;
    }

    /// Binds `handler` to a performative code. Last registration wins.
    pub fn register<F>(&mut self, code: u8, name: &'static str, handler: F)
    where
        F: Fn(&mut C, &FrameView<'_>, &mut FrameWriter) -> Result<(), DispatchError> + 'static,
    {
        self.table.register(code, name, Box::new(handler));
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    /// Channel of the most recently decoded frame.
    pub fn channel(&self) -> u16 {
        self.channel
    }

    /// Performative code of the most recently decoded frame.
    pub fn code(&self) -> u8 {
        self.code
    }

    /// Declared size of the most recently decoded frame.
    pub fn frame_size(&self) -> u32 {
        self.size
    }

    /// Argument of the most recently decoded frame, by wire position.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Count of structurally valid frames skipped because their code had
    /// no registered handler.
    pub fn unhandled(&self) -> u64 {
        self.unhandled
    }

    /// Feeds received bytes through the decoder, dispatching every
    /// complete frame in arrival order.
    ///
    /// Returns the number of bytes consumed; the caller keeps any
    /// unconsumed tail and offers it again once more bytes arrive. A
    /// trailing partial frame is not an error. Framing violations, body
    /// decode failures and handler failures are fatal to the stream.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<usize, DispatchError> {
        let mut consumed = 0;
        while let Some(header) = FrameHeader::parse(&bytes[consumed..]) {
            if (header.size as usize) < FRAME_HEADER_SIZE {
                return Err(DispatchError::FrameTooSmall { size: header.size });
            }
            let size = header.size as usize;
            if bytes.len() - consumed < size {
                break; // need more input
            }
            header.validate(self.frame_type)?;
            self.dispatch_frame(header, &bytes[consumed..consumed + size])?;
            consumed += size;
        }
        Ok(consumed)
    }

    fn dispatch_frame(&mut self, header: FrameHeader, data: &[u8]) -> Result<(), DispatchError> {
        self.channel = header.channel;
        self.size = header.size;

        let body_offset = header.body_offset();
        if body_offset == data.len() {
            // bodyless frame (heartbeat): consumed, never dispatched.
            // No performative was decoded, so the code accessor must not
            // keep reporting the previous frame's.
            self.code = 0;
            self.args.clear();
            if self.trace {
                tracing::trace!(channel = header.channel, size = header.size, "empty frame");
            }
            return Ok(());
        }

        let body = &data[body_offset..];
        let (descriptor, body_used) =
            frame::decode_described(body, &mut self.args).map_err(DispatchError::Decode)?;
        let code = u8::try_from(descriptor)
            .map_err(|_| DispatchError::PerformativeOutOfRange(descriptor))?;
        self.code = code;
        let payload = &body[body_used..];

        if self.trace {
            tracing::trace!(
                channel = header.channel,
                code,
                name = self.table.name(code),
                size = header.size,
                payload_len = payload.len(),
                "frame received"
            );
        }

        match self.table.lookup(code) {
            Some(action) => {
                let view = FrameView {
                    channel: header.channel,
                    code,
                    size: header.size,
                    args: &self.args,
                    payload,
                };
                (action.handler)(&mut self.context, &view, &mut self.output)?;
            }
            None => {
                self.unhandled += 1;
                tracing::debug!(code, "unrecognized performative, frame skipped");
            }
        }
        Ok(())
    }

    /// Stages a value at an output argument position. See
    /// [`FrameWriter::set_field`].
    pub fn set_field(&mut self, index: usize, value: Value) {
        self.output.set_field(index, value);
    }

    /// Appends bytes to the pending output payload. See
    /// [`FrameWriter::append_payload`].
    pub fn append_payload(&mut self, data: &[u8]) {
        self.output.append_payload(data);
    }

    /// Finalizes and queues the staged frame. See
    /// [`FrameWriter::post_frame`].
    pub fn post_frame(&mut self, channel: u16, code: u8) -> Result<(), DispatchError> {
        self.output.post_frame(channel, code)
    }

    /// Bytes queued for transmission.
    pub fn pending(&self) -> usize {
        self.output.pending()
    }

    /// Copies up to `dst.len()` of the oldest queued output bytes into
    /// `dst`, removing them from the queue. Returns bytes copied. The
    /// queue is a FIFO byte stream; drain boundaries need not align with
    /// frame boundaries.
    pub fn drain(&mut self, dst: &mut [u8]) -> usize {
        self.output.buffer.drain(dst)
    }
}
