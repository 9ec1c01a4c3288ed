//! Byte encoding of instructions.
//!
//! Each instruction is one opcode byte, followed by a 4-byte little-endian
//! operand when the opcode's range carries one. Instructions are packed back to
//! back with no framing, so a reader that sees a partial instruction at the end
//! of a drain has to keep those bytes until the rest arrives ([`Reassembler`]).

use crate::error::{DecodeError, Error, Result};
use crate::instruction::Instruction;
use crate::opcode::shape_of;
use std::ops::Deref;

/// Longest encoded instruction: opcode plus a 4-byte operand.
pub const MAX_INSTRUCTION_LEN: usize = 5;

/// Stack-allocated encoding of a single instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoded {
    bytes: [u8; MAX_INSTRUCTION_LEN],
    len: u8,
}

impl Deref for Encoded {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

impl AsRef<[u8]> for Encoded {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

/// Encode one instruction. Fails if the variant disagrees with the opcode's range shape.
pub fn encode(instruction: &Instruction) -> Result<Encoded> {
    let opcode = instruction.opcode();
    let expected = shape_of(opcode);
    if expected != instruction.shape() {
        return Err(Error::ShapeMismatch {
            opcode,
            expected,
            found: instruction.shape(),
        });
    }

    let mut bytes = [0u8; MAX_INSTRUCTION_LEN];
    bytes[0] = opcode;
    if let Some(bits) = instruction.operand_bits() {
        bytes[1..5].copy_from_slice(&bits.to_le_bytes());
    }
    Ok(Encoded {
        bytes,
        len: instruction.encoded_len() as u8,
    })
}

/// Append the encoding of `instruction` to `out`.
pub fn encode_into(instruction: &Instruction, out: &mut Vec<u8>) -> Result<()> {
    out.extend_from_slice(&encode(instruction)?);
    Ok(())
}

/// Encode a whole sequence into a fresh buffer.
pub fn encode_all<'a, I>(instructions: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a Instruction>,
{
    let mut out = Vec::new();
    for instruction in instructions {
        encode_into(instruction, &mut out)?;
    }
    Ok(out)
}

/// Iterate the instructions in `bytes`.
///
/// A trailing partial instruction yields a single [`DecodeError::Truncated`]
/// and ends the iteration.
pub fn decode(bytes: &[u8]) -> Decoder<'_> {
    Decoder { bytes, pos: 0 }
}

/// Iterator returned by [`decode`].
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Decoder<'_> {
    /// Offset of the next undecoded byte.
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl Iterator for Decoder<'_> {
    type Item = std::result::Result<Instruction, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.bytes[self.pos..];
        let (&opcode, operand) = rest.split_first()?;
        let needed = shape_of(opcode).len();

        if needed == 0 {
            self.pos += 1;
            return Some(Ok(Instruction::from_raw(opcode, 0)));
        }
        if operand.len() < needed {
            self.pos = self.bytes.len();
            return Some(Err(DecodeError::Truncated {
                opcode,
                needed,
                available: operand.len(),
            }));
        }

        let bits = u32::from_le_bytes([operand[0], operand[1], operand[2], operand[3]]);
        self.pos += 1 + needed;
        Some(Ok(Instruction::from_raw(opcode, bits)))
    }
}

/// Length of the longest prefix of `bytes` made of whole instructions.
pub fn complete_len(bytes: &[u8]) -> usize {
    let mut pos = 0;
    while let Some(&opcode) = bytes.get(pos) {
        let len = 1 + shape_of(opcode).len();
        if pos + len > bytes.len() {
            break;
        }
        pos += len;
    }
    pos
}

/// Carries a partial instruction from one drain to the next.
///
/// Both sides drain into a fixed buffer, and a drain can stop in the middle of
/// an instruction when the ring wraps or the buffer fills. The tail is at most
/// `MAX_INSTRUCTION_LEN - 1` bytes, so it lives inline.
#[derive(Debug, Default, Clone)]
pub struct Reassembler {
    tail: [u8; MAX_INSTRUCTION_LEN - 1],
    len: usize,
}

/// Outcome of one [`Reassembler::fill`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fill {
    /// Fresh bytes pulled from the source.
    pub read: usize,
    /// Prefix of the buffer holding whole instructions.
    pub complete: usize,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes currently held back.
    pub fn pending(&self) -> usize {
        self.len
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Put the held-back bytes at the front of `buf`, let `read` fill the rest,
    /// then hold back whatever partial instruction ends the buffer.
    ///
    /// `buf` must be longer than [`MAX_INSTRUCTION_LEN`] so progress is always
    /// possible. Returns the whole-instruction prefix length of `buf`.
    pub fn fill<R>(&mut self, buf: &mut [u8], read: R) -> Fill
    where
        R: FnOnce(&mut [u8]) -> usize,
    {
        let carried = self.len;
        buf[..carried].copy_from_slice(&self.tail[..carried]);
        let read = read(&mut buf[carried..]);
        let filled = carried + read;

        let complete = complete_len(&buf[..filled]);
        let rest = filled - complete;
        self.tail[..rest].copy_from_slice(&buf[complete..filled]);
        self.len = rest;

        Fill { read, complete }
    }
}
