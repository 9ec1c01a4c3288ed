//! Opcode numbering and operand shapes.
//!
//! The operand shape of an instruction is a pure function of its opcode's
//! numeric range. Unknown opcodes inside a range still decode with that
//! range's shape, so new opcodes can be added without touching the codec.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operand carried after the opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperandShape {
    None,
    U32,
    F32,
}

impl OperandShape {
    /// Encoded operand size in bytes.
    #[inline]
    pub const fn len(self) -> usize {
        match self {
            Self::None => 0,
            Self::U32 | Self::F32 => 4,
        }
    }
}

impl fmt::Display for OperandShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "empty"),
            Self::U32 => write!(f, "u32"),
            Self::F32 => write!(f, "f32"),
        }
    }
}

/// A contiguous block of opcodes sharing one operand shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeRange {
    pub first: u8,
    pub last: u8,
    pub shape: OperandShape,
    pub purpose: &'static str,
}

impl OpcodeRange {
    #[inline]
    pub const fn contains(&self, opcode: u8) -> bool {
        opcode >= self.first && opcode <= self.last
    }
}

/// Opcode ranges in ascending order. Opcodes outside every range carry no operand.
pub const OPCODE_RANGES: &[OpcodeRange] = &[
    OpcodeRange {
        first: 0,
        last: 19,
        shape: OperandShape::None,
        purpose: "control",
    },
    OpcodeRange {
        first: 20,
        last: 39,
        shape: OperandShape::U32,
        purpose: "integer parameters",
    },
    OpcodeRange {
        first: 40,
        last: 59,
        shape: OperandShape::F32,
        purpose: "float parameters",
    },
    OpcodeRange {
        first: 60,
        last: 79,
        shape: OperandShape::None,
        purpose: "kernel events",
    },
    OpcodeRange {
        first: 80,
        last: 99,
        shape: OperandShape::U32,
        purpose: "integer kernel events",
    },
    OpcodeRange {
        first: 100,
        last: 119,
        shape: OperandShape::F32,
        purpose: "float kernel events",
    },
    OpcodeRange {
        first: 120,
        last: 139,
        shape: OperandShape::U32,
        purpose: "packed structures",
    },
];

/// Operand shape for any opcode value.
pub const fn shape_of(opcode: u8) -> OperandShape {
    let mut i = 0;
    while i < OPCODE_RANGES.len() {
        if OPCODE_RANGES[i].contains(opcode) {
            return OPCODE_RANGES[i].shape;
        }
        i += 1;
    }
    OperandShape::None
}

/// Named opcodes understood by the bundled kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    Nop = 0,

    SetWaveformIndex = 20,
    SetDelayLength = 21,

    SetCutoff = 40,
    SetResonance = 41,
    SetEnvMod = 42,
    SetDecay = 43,
    SetTempo = 44,
    SetTuning = 45,
    SetAccent = 46,
    SetDistortionThreshold = 47,
    SetDistortionShape = 48,
    SetDelaySend = 49,
    SetDelayFeedback = 50,

    /// Render-to-control acknowledgement that the kernel is live.
    BootstrapFinished = 60,

    /// Render-to-control notification of the sequencer's current step.
    SetSequencerStep = 80,

    /// Control-to-render pattern edit, operand is a packed [`PatternStep`](crate::PatternStep).
    SetPatternStep = 120,
}

impl Opcode {
    pub const ALL: [Opcode; 17] = [
        Self::Nop,
        Self::SetWaveformIndex,
        Self::SetDelayLength,
        Self::SetCutoff,
        Self::SetResonance,
        Self::SetEnvMod,
        Self::SetDecay,
        Self::SetTempo,
        Self::SetTuning,
        Self::SetAccent,
        Self::SetDistortionThreshold,
        Self::SetDistortionShape,
        Self::SetDelaySend,
        Self::SetDelayFeedback,
        Self::BootstrapFinished,
        Self::SetSequencerStep,
        Self::SetPatternStep,
    ];

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| *op as u8 == value)
    }

    #[inline]
    pub const fn shape(self) -> OperandShape {
        shape_of(self as u8)
    }
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> u8 {
        op as u8
    }
}
