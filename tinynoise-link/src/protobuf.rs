//! A small subset of the protobuf wire format for handshake payloads.
//!
//! Only varint (wire type 0) and length-delimited (wire type 2) fields
//! are supported, with 8-bit tags. Both [`Formatter`] and [`Parser`]
//! carry a sticky error flag: once something goes wrong every further
//! call is a no-op, and the caller checks once at the end with
//! [`Formatter::finish`] or [`Parser::finish`].

use crate::error::Error;

/// Largest embedded message [`Formatter::end_embedded`] can close.
pub const EMBEDDED_LEN_MAX: usize = 0xFFFF;

/// The two wire types the codec understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    LengthDelimited = 2,
}

/// Position of an embedded message's length placeholder, returned by
/// [`Formatter::start_embedded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct EmbeddedStart(usize);

/// Saved outer boundary, returned by [`Parser::start_embedded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct EmbeddedEnd(usize);

/// Appends protobuf fields to a caller-supplied buffer.
#[derive(Debug)]
pub struct Formatter<'a> {
    buf: &'a mut [u8],
    pos: usize,
    error: bool,
}

impl<'a> Formatter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            error: false,
        }
    }

    /// Bytes written so far. Only meaningful while [`error`](Self::error)
    /// is false.
    pub fn size(&self) -> usize {
        self.pos
    }

    pub fn error(&self) -> bool {
        self.error
    }

    /// The encoded length, or [`Error::Encoding`] if any call failed.
    pub fn finish(self) -> Result<usize, Error> {
        if self.error {
            Err(Error::Encoding)
        } else {
            Ok(self.pos)
        }
    }

    pub fn add_bool(&mut self, tag: u8, value: bool) -> &mut Self {
        self.add_header(tag, WireType::Varint);
        self.add_varint(u64::from(value));
        self
    }

    pub fn add_u32(&mut self, tag: u8, value: u32) -> &mut Self {
        self.add_header(tag, WireType::Varint);
        self.add_varint(u64::from(value));
        self
    }

    pub fn add_u64(&mut self, tag: u8, value: u64) -> &mut Self {
        self.add_header(tag, WireType::Varint);
        self.add_varint(value);
        self
    }

    /// Zigzag-encoded.
    pub fn add_i32(&mut self, tag: u8, value: i32) -> &mut Self {
        self.add_header(tag, WireType::Varint);
        self.add_varint(u64::from(((value << 1) ^ (value >> 31)) as u32));
        self
    }

    /// Zigzag-encoded.
    pub fn add_i64(&mut self, tag: u8, value: i64) -> &mut Self {
        self.add_header(tag, WireType::Varint);
        self.add_varint(((value << 1) ^ (value >> 63)) as u64);
        self
    }

    pub fn add_bytes(&mut self, tag: u8, data: &[u8]) -> &mut Self {
        self.add_header(tag, WireType::LengthDelimited);
        self.add_varint(data.len() as u64);
        if !self.error {
            match self.buf.get_mut(self.pos..self.pos + data.len()) {
                Some(dst) => {
                    dst.copy_from_slice(data);
                    self.pos += data.len();
                }
                None => self.error = true,
            }
        }
        self
    }

    pub fn add_str(&mut self, tag: u8, value: &str) -> &mut Self {
        self.add_bytes(tag, value.as_bytes())
    }

    /// Open an embedded message under `tag`.
    ///
    /// A one-byte length placeholder is reserved; [`end_embedded`]
    /// widens it to two or three bytes if the message turns out longer.
    ///
    /// [`end_embedded`]: Self::end_embedded
    pub fn start_embedded(&mut self, tag: u8) -> EmbeddedStart {
        self.add_header(tag, WireType::LengthDelimited);
        let start = self.pos;
        self.push(0);
        EmbeddedStart(start)
    }

    /// Close the embedded message opened at `start`, filling in its length.
    pub fn end_embedded(&mut self, start: EmbeddedStart) {
        if self.error {
            return;
        }
        let start = start.0;
        if start >= self.pos {
            self.error = true;
            return;
        }

        let len = self.pos - start - 1;
        let extra = match len {
            0..0x80 => 0,
            0x80..0x4000 => 1,
            0x4000..=EMBEDDED_LEN_MAX => 2,
            _ => {
                self.error = true;
                return;
            }
        };
        if self.pos + extra > self.buf.len() {
            self.error = true;
            return;
        }
        if extra > 0 {
            self.buf.copy_within(start + 1..self.pos, start + 1 + extra);
            self.pos += extra;
        }

        let mut value = len;
        for byte in &mut self.buf[start..start + extra] {
            *byte = (value as u8) | 0x80;
            value >>= 7;
        }
        self.buf[start + extra] = value as u8;
    }

    fn push(&mut self, byte: u8) {
        if self.error {
            return;
        }
        match self.buf.get_mut(self.pos) {
            Some(slot) => {
                *slot = byte;
                self.pos += 1;
            }
            None => self.error = true,
        }
    }

    fn add_header(&mut self, tag: u8, wire: WireType) {
        self.add_varint((u64::from(tag) << 3) | wire as u64);
    }

    fn add_varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.push((value as u8) | 0x80);
            value >>= 7;
        }
        self.push(value as u8);
    }
}

/// Walks the fields of a protobuf message without copying.
///
/// ```
/// use tinynoise_link::protobuf::{Formatter, Parser};
///
/// let mut buf = [0u8; 32];
/// let mut fmt = Formatter::new(&mut buf);
/// fmt.add_u32(1, 300).add_str(2, "hi");
/// let len = fmt.finish()?;
///
/// let mut parser = Parser::new(&buf[..len]);
/// assert_eq!(parser.read_next(), Some(1));
/// assert_eq!(parser.read_u32(), 300);
/// assert_eq!(parser.read_next(), Some(2));
/// assert_eq!(parser.read_str(), "hi");
/// assert_eq!(parser.read_next(), None);
/// parser.finish()?;
/// # Ok::<(), tinynoise_link::Error>(())
/// ```
#[derive(Debug)]
pub struct Parser<'a> {
    buf: &'a [u8],
    pos: usize,
    end: usize,
    /// Start of the current length-delimited field.
    ptr: usize,
    /// Varint value, or the length of a length-delimited field.
    value: u64,
    wire: Option<WireType>,
    error: bool,
}

impl<'a> Parser<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            end: buf.len(),
            ptr: 0,
            value: 0,
            wire: None,
            error: false,
        }
    }

    pub fn error(&self) -> bool {
        self.error
    }

    /// [`Error::Malformed`] if any read failed.
    pub fn finish(&self) -> Result<(), Error> {
        if self.error {
            Err(Error::Malformed)
        } else {
            Ok(())
        }
    }

    /// Wire type of the field last returned by [`read_next`](Self::read_next).
    pub fn wire_type(&self) -> Option<WireType> {
        self.wire
    }

    /// Advance to the next field and return its tag.
    ///
    /// Returns `None` at the end of the current message or on malformed
    /// input, in which case the error flag is set.
    pub fn read_next(&mut self) -> Option<u8> {
        if self.error || self.pos >= self.end {
            return None;
        }
        let header = self.read_varint()?;
        if header >= 256 << 3 {
            return self.fail();
        }
        let tag = (header >> 3) as u8;
        match header & 0x07 {
            0 => {
                self.value = self.read_varint()?;
                self.wire = Some(WireType::Varint);
            }
            2 => {
                let len = self.read_varint()?;
                if len > (self.end - self.pos) as u64 {
                    return self.fail();
                }
                self.value = len;
                self.ptr = self.pos;
                self.pos += len as usize;
                self.wire = Some(WireType::LengthDelimited);
            }
            _ => return self.fail(),
        }
        Some(tag)
    }

    pub fn read_bool(&mut self) -> bool {
        self.varint().is_some_and(|v| v != 0)
    }

    pub fn read_u32(&mut self) -> u32 {
        match self.varint() {
            Some(v) => u32::try_from(v).unwrap_or_else(|_| self.fail_with(0)),
            None => 0,
        }
    }

    pub fn read_u64(&mut self) -> u64 {
        self.varint().unwrap_or(0)
    }

    pub fn read_i32(&mut self) -> i32 {
        match self.varint().map(u32::try_from) {
            Some(Ok(v)) => ((v >> 1) as i32) ^ -((v & 1) as i32),
            Some(Err(_)) => self.fail_with(0),
            None => 0,
        }
    }

    pub fn read_i64(&mut self) -> i64 {
        self.varint()
            .map(|v| ((v >> 1) as i64) ^ -((v & 1) as i64))
            .unwrap_or(0)
    }

    /// Borrow the current length-delimited field.
    pub fn read_bytes(&mut self) -> &'a [u8] {
        if self.error {
            return &[];
        }
        if self.wire != Some(WireType::LengthDelimited) {
            self.error = true;
            return &[];
        }
        let buf = self.buf;
        &buf[self.ptr..self.ptr + self.value as usize]
    }

    /// Borrow the current length-delimited field as UTF-8.
    pub fn read_str(&mut self) -> &'a str {
        let bytes = self.read_bytes();
        match core::str::from_utf8(bytes) {
            Ok(s) => s,
            Err(_) => self.fail_with(""),
        }
    }

    /// Descend into the current length-delimited field.
    ///
    /// Hand the returned boundary back to [`end_embedded`] once the
    /// embedded fields have been read.
    ///
    /// [`end_embedded`]: Self::end_embedded
    pub fn start_embedded(&mut self) -> EmbeddedEnd {
        if self.error {
            return EmbeddedEnd(0);
        }
        if self.wire != Some(WireType::LengthDelimited) {
            return self.fail_with(EmbeddedEnd(0));
        }
        let outer = EmbeddedEnd(self.end);
        self.end = self.pos;
        self.pos = self.ptr;
        self.wire = None;
        outer
    }

    /// Return to the enclosing message, skipping any unread embedded fields.
    pub fn end_embedded(&mut self, outer: EmbeddedEnd) {
        if self.error {
            return;
        }
        if outer.0 < self.end {
            self.error = true;
            return;
        }
        self.pos = self.end;
        self.end = outer.0;
        self.wire = None;
    }

    fn varint(&mut self) -> Option<u64> {
        if self.error {
            return None;
        }
        if self.wire != Some(WireType::Varint) {
            return self.fail();
        }
        Some(self.value)
    }

    /// Decode a varint of at most ten bytes ending before `end`.
    fn read_varint(&mut self) -> Option<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            if self.pos >= self.end {
                return self.fail();
            }
            let byte = self.buf[self.pos];
            self.pos += 1;
            if shift == 63 && byte > 1 {
                return self.fail();
            }
            value |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Some(value);
            }
            shift += 7;
        }
    }

    fn fail<T>(&mut self) -> Option<T> {
        self.error = true;
        None
    }

    fn fail_with<T>(&mut self, value: T) -> T {
        self.error = true;
        value
    }
}
