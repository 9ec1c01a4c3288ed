//! Sequencer pattern steps packed into a single u32 operand.
//!
//! ```text
//! bits 0..4    step index    (0..16)
//! bits 4..7    pattern index (0..8)
//! bits 8..15   pitch         (0..128, MIDI note)
//! bit  16      note on
//! bit  17      accent
//! bit  18      slide
//! bit  19      octave down
//! bit  20      octave up
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

pub const STEPS_PER_PATTERN: u8 = 16;
pub const PATTERN_COUNT: u8 = 8;
pub const MAX_PITCH: u8 = 127;

const STEP_MASK: u32 = 0x0f;
const PATTERN_SHIFT: u32 = 4;
const PATTERN_MASK: u32 = 0x07;
const PITCH_SHIFT: u32 = 8;
const PITCH_MASK: u32 = 0x7f;
const NOTE_BIT: u32 = 1 << 16;
const ACCENT_BIT: u32 = 1 << 17;
const SLIDE_BIT: u32 = 1 << 18;
const DOWN_BIT: u32 = 1 << 19;
const UP_BIT: u32 = 1 << 20;

const KNOWN_BITS: u32 = STEP_MASK
    | (PATTERN_MASK << PATTERN_SHIFT)
    | (PITCH_MASK << PITCH_SHIFT)
    | NOTE_BIT
    | ACCENT_BIT
    | SLIDE_BIT
    | DOWN_BIT
    | UP_BIT;

/// One step of one sequencer pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternStep {
    pattern: u8,
    step: u8,
    pitch: u8,
    note: bool,
    accent: bool,
    slide: bool,
    octave_down: bool,
    octave_up: bool,
}

impl PatternStep {
    /// A note-on step with no modifiers.
    pub fn new(pattern: u8, step: u8, pitch: u8) -> Result<Self> {
        if pattern >= PATTERN_COUNT {
            return Err(Error::InvalidPatternStep(format!(
                "pattern {pattern} out of range (0..{PATTERN_COUNT})"
            )));
        }
        if step >= STEPS_PER_PATTERN {
            return Err(Error::InvalidPatternStep(format!(
                "step {step} out of range (0..{STEPS_PER_PATTERN})"
            )));
        }
        if pitch > MAX_PITCH {
            return Err(Error::InvalidPatternStep(format!(
                "pitch {pitch} above {MAX_PITCH}"
            )));
        }
        Ok(Self {
            pattern,
            step,
            pitch,
            note: true,
            accent: false,
            slide: false,
            octave_down: false,
            octave_up: false,
        })
    }

    pub fn with_note(mut self, on: bool) -> Self {
        self.note = on;
        self
    }

    pub fn with_accent(mut self, on: bool) -> Self {
        self.accent = on;
        self
    }

    pub fn with_slide(mut self, on: bool) -> Self {
        self.slide = on;
        self
    }

    pub fn with_octave_down(mut self, on: bool) -> Self {
        self.octave_down = on;
        self
    }

    pub fn with_octave_up(mut self, on: bool) -> Self {
        self.octave_up = on;
        self
    }

    pub fn pattern(&self) -> u8 {
        self.pattern
    }

    pub fn step(&self) -> u8 {
        self.step
    }

    pub fn pitch(&self) -> u8 {
        self.pitch
    }

    pub fn has_note(&self) -> bool {
        self.note
    }

    pub fn has_accent(&self) -> bool {
        self.accent
    }

    pub fn has_slide(&self) -> bool {
        self.slide
    }

    pub fn octave_down(&self) -> bool {
        self.octave_down
    }

    pub fn octave_up(&self) -> bool {
        self.octave_up
    }

    pub fn pack(&self) -> u32 {
        let mut bits = u32::from(self.step)
            | (u32::from(self.pattern) << PATTERN_SHIFT)
            | (u32::from(self.pitch) << PITCH_SHIFT);
        if self.note {
            bits |= NOTE_BIT;
        }
        if self.accent {
            bits |= ACCENT_BIT;
        }
        if self.slide {
            bits |= SLIDE_BIT;
        }
        if self.octave_down {
            bits |= DOWN_BIT;
        }
        if self.octave_up {
            bits |= UP_BIT;
        }
        bits
    }

    pub fn unpack(bits: u32) -> Result<Self> {
        if bits & !KNOWN_BITS != 0 {
            return Err(Error::InvalidPatternStep(format!(
                "unknown bits set: {:#010x}",
                bits & !KNOWN_BITS
            )));
        }
        let step = (bits & STEP_MASK) as u8;
        let pattern = ((bits >> PATTERN_SHIFT) & PATTERN_MASK) as u8;
        let pitch = ((bits >> PITCH_SHIFT) & PITCH_MASK) as u8;

        Ok(Self::new(pattern, step, pitch)?
            .with_note(bits & NOTE_BIT != 0)
            .with_accent(bits & ACCENT_BIT != 0)
            .with_slide(bits & SLIDE_BIT != 0)
            .with_octave_down(bits & DOWN_BIT != 0)
            .with_octave_up(bits & UP_BIT != 0))
    }
}
