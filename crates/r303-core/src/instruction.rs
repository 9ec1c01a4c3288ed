//! Instruction value type.

use crate::error::Result;
use crate::opcode::{shape_of, Opcode, OperandShape};
use crate::pattern::PatternStep;

/// One decoded instruction.
///
/// The variant always agrees with [`shape_of`] for the opcode once the
/// instruction has passed through the codec. Float operands compare by bit
/// pattern so `NaN` payloads survive equality checks.
#[derive(Debug, Clone, Copy)]
pub enum Instruction {
    Bare { opcode: u8 },
    U32 { opcode: u8, operand: u32 },
    F32 { opcode: u8, operand: f32 },
}

impl Instruction {
    pub const fn bare(op: Opcode) -> Self {
        Self::Bare { opcode: op as u8 }
    }

    pub const fn u32(op: Opcode, operand: u32) -> Self {
        Self::U32 {
            opcode: op as u8,
            operand,
        }
    }

    pub const fn f32(op: Opcode, operand: f32) -> Self {
        Self::F32 {
            opcode: op as u8,
            operand,
        }
    }

    /// Build the instruction for a raw opcode and operand bits, using the opcode's range shape.
    pub fn from_raw(opcode: u8, bits: u32) -> Self {
        match shape_of(opcode) {
            OperandShape::None => Self::Bare { opcode },
            OperandShape::U32 => Self::U32 {
                opcode,
                operand: bits,
            },
            OperandShape::F32 => Self::F32 {
                opcode,
                operand: f32::from_bits(bits),
            },
        }
    }

    /// Pattern edit for one sequencer step.
    pub fn pattern_step(step: PatternStep) -> Self {
        Self::u32(Opcode::SetPatternStep, step.pack())
    }

    #[inline]
    pub const fn opcode(&self) -> u8 {
        match *self {
            Self::Bare { opcode } | Self::U32 { opcode, .. } | Self::F32 { opcode, .. } => opcode,
        }
    }

    /// Named opcode, if this one is known.
    pub fn known(&self) -> Option<Opcode> {
        Opcode::from_u8(self.opcode())
    }

    pub fn is(&self, op: Opcode) -> bool {
        self.opcode() == op as u8
    }

    /// Shape implied by the variant.
    #[inline]
    pub const fn shape(&self) -> OperandShape {
        match self {
            Self::Bare { .. } => OperandShape::None,
            Self::U32 { .. } => OperandShape::U32,
            Self::F32 { .. } => OperandShape::F32,
        }
    }

    #[inline]
    pub const fn encoded_len(&self) -> usize {
        1 + self.shape().len()
    }

    /// Raw operand bits, if any.
    pub fn operand_bits(&self) -> Option<u32> {
        match *self {
            Self::Bare { .. } => None,
            Self::U32 { operand, .. } => Some(operand),
            Self::F32 { operand, .. } => Some(operand.to_bits()),
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            Self::U32 { operand, .. } => Some(operand),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match *self {
            Self::F32 { operand, .. } => Some(operand),
            _ => None,
        }
    }

    /// Decode the operand of a [`Opcode::SetPatternStep`] instruction.
    pub fn as_pattern_step(&self) -> Option<Result<PatternStep>> {
        match *self {
            Self::U32 { opcode, operand } if opcode == Opcode::SetPatternStep as u8 => {
                Some(PatternStep::unpack(operand))
            }
            _ => None,
        }
    }
}

impl PartialEq for Instruction {
    fn eq(&self, other: &Self) -> bool {
        self.opcode() == other.opcode()
            && self.shape() == other.shape()
            && self.operand_bits() == other.operand_bits()
    }
}

impl Eq for Instruction {}
