//! # r303 - Control/Render Bridge
//!
//! Drives a real-time synthesis kernel from ordinary application code.
//!
//! ## Architecture
//!
//! r303 is an umbrella crate that coordinates:
//! - **r303-core** - SPSC byte ring over shared segments, instruction codec, pattern steps
//! - **r303-render** - Render thread, per-quantum processor, kernel interface
//!
//! The control side ([`Engine`]) and the render side ([`Processor`]) share two
//! fixed segments, one per direction. Instructions are 1-byte opcodes with an
//! optional 4-byte operand, written lock-free by one side and drained by the
//! other. The render side never blocks, allocates or logs while rendering.
//!
//! ## Quick Start
//!
//! ```ignore
//! use r303::prelude::*;
//!
//! let engine = Engine::builder(factory)
//!     .kernel_path("kernel.wasm")
//!     .build()?;
//!
//! // Bootstrap: load kernel, spawn render thread, wait for acknowledgement
//! engine.initialize(|instruction| {
//!     if let Some(step) = instruction.as_u32() {
//!         println!("sequencer at step {step}");
//!     }
//! }).await?;
//!
//! engine.send_instruction(&Instruction::f32(Opcode::SetCutoff, 2000.0))?;
//! engine.toggle_start()?;
//! ```

pub use r303_core as core;
pub use r303_render as render;

pub use r303_core::{
    decode, encode, shape_of, DecodeError, Instruction, Opcode, OperandShape, PatternStep,
    MAX_INSTRUCTION_LEN,
};
pub use r303_render::{
    HostImports, Kernel, KernelFactory, OutputTap, Processor, RenderMetrics,
};

mod builder;
mod config;
mod drain;
mod engine;
mod error;
mod source;
mod stats;

pub use builder::EngineBuilder;
pub use config::EngineConfig;
pub use drain::InstructionCallback;
pub use engine::{Engine, HandshakeState};
pub use error::{Error, Result};
pub use source::KernelSource;
pub use stats::EngineMetrics;

pub mod prelude {
    // Main engine
    pub use crate::{Engine, EngineBuilder, EngineConfig, HandshakeState};

    // Instructions
    pub use crate::{Instruction, Opcode, PatternStep};

    // Kernel interface
    pub use crate::{HostImports, Kernel, KernelFactory};

    pub use crate::{Error, Result};
}
