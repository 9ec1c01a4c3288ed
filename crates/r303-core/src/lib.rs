//! # r303 Core
//!
//! Shared building blocks for the r303 control/render bridge.
//!
//! - [`RingBuffer`]: lock-free SPSC byte ring over a fixed segment, one per direction
//! - [`Instruction`] and the [`codec`]: 1-byte opcode plus optional 4-byte operand
//! - [`OperandShape`] table: operand shape is decided by opcode range
//! - [`PatternStep`]: sequencer step packed into a u32 operand
//! - [`Bootstrap`]: the one-time handoff of kernel binary and segments
//!
//! ## Example
//!
//! ```
//! use r303_core::{codec, Instruction, Opcode, RingBuffer};
//!
//! let ring = RingBuffer::new(4096)?;
//! let mut tx = ring.producer()?;
//! let mut rx = ring.consumer()?;
//!
//! let cutoff = Instruction::f32(Opcode::SetCutoff, 2000.0);
//! assert!(tx.write_exact(&codec::encode(&cutoff)?));
//!
//! let mut buf = [0u8; 64];
//! let n = rx.read(&mut buf);
//! let decoded = codec::decode(&buf[..n]).next().unwrap()?;
//! assert_eq!(decoded, cutoff);
//! # Ok::<(), r303_core::Error>(())
//! ```

pub mod codec;
pub mod error;
pub mod instruction;
pub mod opcode;
pub mod pattern;
pub mod protocol;
pub mod ring;

pub use codec::{decode, encode, Reassembler, MAX_INSTRUCTION_LEN};
pub use error::{DecodeError, Error, Result, Role};
pub use instruction::Instruction;
pub use opcode::{shape_of, Opcode, OperandShape};
pub use pattern::PatternStep;
pub use protocol::Bootstrap;
pub use ring::{Consumer, Producer, RingBuffer, SignalWait, HEADER_BYTES};
