//! Instruction delivery integration tests
//!
//! Control → kernel through the to-render segment, kernel → callback through
//! the to-control segment.

use crate::helpers::*;
use r303::prelude::*;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Control → kernel
// ---------------------------------------------------------------------------

/// A cutoff change arrives at the kernel with the identical float bits.
#[tokio::test(flavor = "multi_thread")]
async fn test_set_cutoff_reaches_kernel() {
    init_tracing();
    let factory = ProbeFactory::new();
    let probe = Arc::clone(&factory.probe);
    let engine = probe_engine(factory).autostart(true).build().unwrap();
    within(engine.initialize(|_| {})).await.unwrap();

    engine
        .send_instruction(&Instruction::f32(Opcode::SetCutoff, 2000.0))
        .unwrap();

    eventually(|| !probe.applied_with(Opcode::SetCutoff).is_empty()).await;
    let applied = probe.applied_with(Opcode::SetCutoff);
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].as_f32().unwrap().to_bits(), 2000.0f32.to_bits());
    assert_eq!(engine.stats().instructions_sent, 1);
    assert_eq!(engine.stats().bytes_sent, 5);
}

/// Mixed instructions keep their order end to end.
#[tokio::test(flavor = "multi_thread")]
async fn test_instruction_order_preserved() {
    let factory = ProbeFactory::new();
    let probe = Arc::clone(&factory.probe);
    let engine = probe_engine(factory).autostart(true).build().unwrap();
    within(engine.initialize(|_| {})).await.unwrap();

    let sent: Vec<Instruction> = (0..50)
        .map(|i| match i % 3 {
            0 => Instruction::f32(Opcode::SetResonance, i as f32 / 50.0),
            1 => Instruction::u32(Opcode::SetWaveformIndex, i % 2),
            _ => Instruction::bare(Opcode::Nop),
        })
        .collect();
    for instruction in &sent {
        engine.send_instruction(instruction).unwrap();
    }

    eventually(|| probe.applied().len() == sent.len()).await;
    assert_eq!(probe.applied(), sent);
}

/// Pattern steps sent while the kernel is still coming up are applied after
/// its initialize, in order.
#[tokio::test(flavor = "multi_thread")]
async fn test_pattern_steps_sent_before_ready() {
    let (factory, gate) = ProbeFactory::new().gated();
    let probe = Arc::clone(&factory.probe);
    let engine = Arc::new(probe_engine(factory).build().unwrap());

    let init = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.initialize(|_| {}).await }
    });
    eventually(|| engine.state() == HandshakeState::AwaitingAck).await;

    let steps: Vec<Instruction> = (0..16)
        .map(|step| {
            let step = PatternStep::new(0, step, 36 + step)
                .unwrap()
                .with_accent(step % 4 == 0);
            Instruction::pattern_step(step)
        })
        .collect();
    for instruction in &steps {
        engine.send_instruction(instruction).unwrap();
    }

    gate.send(()).unwrap();
    within(init).await.unwrap().unwrap();
    assert!(engine.toggle_start().unwrap());

    eventually(|| probe.applied().len() == 16).await;
    assert_eq!(probe.applied(), steps);
    assert_eq!(
        probe
            .applied_before_init
            .load(std::sync::atomic::Ordering::SeqCst),
        0
    );

    let decoded = probe.applied()[4].as_pattern_step().unwrap().unwrap();
    assert_eq!(decoded.step(), 4);
    assert_eq!(decoded.pitch(), 40);
    assert!(decoded.has_accent());
}

/// A full segment rejects the whole instruction instead of writing part of it.
#[tokio::test(flavor = "multi_thread")]
async fn test_saturation_is_all_or_nothing() {
    // 10 data bytes, 9 usable; the render side is suspended so nothing drains.
    let engine = probe_engine(ProbeFactory::new())
        .segment_bytes(18)
        .build()
        .unwrap();
    within(engine.initialize(|_| {})).await.unwrap();

    let cutoff = Instruction::f32(Opcode::SetCutoff, 440.0);
    engine.send_instruction(&cutoff).unwrap();

    let err = engine.send_instruction(&cutoff).unwrap_err();
    assert!(matches!(err, Error::BufferSaturated { needed: 5, free: 4 }));

    // A bare instruction still fits in what is left.
    engine
        .send_instruction(&Instruction::bare(Opcode::Nop))
        .unwrap();

    let stats = engine.stats();
    assert_eq!(stats.instructions_sent, 2);
    assert_eq!(stats.bytes_sent, 6);
    assert_eq!(stats.saturated, 1);
}

/// A batch lands whole or not at all.
#[tokio::test(flavor = "multi_thread")]
async fn test_batch_is_all_or_nothing() {
    let factory = ProbeFactory::new();
    let probe = Arc::clone(&factory.probe);
    let engine = probe_engine(factory).segment_bytes(18).build().unwrap();
    within(engine.initialize(|_| {})).await.unwrap();

    let batch = [
        Instruction::f32(Opcode::SetDecay, 0.1),
        Instruction::f32(Opcode::SetEnvMod, 0.9),
    ];
    let err = engine.send_batch(&batch).unwrap_err();
    assert!(matches!(err, Error::BufferSaturated { needed: 10, .. }));

    engine.send_batch(&batch[..1]).unwrap();
    engine.toggle_start().unwrap();
    eventually(|| probe.applied().len() == 1).await;
    assert_eq!(probe.applied(), batch[..1]);
}

/// Sending before the outbound segment exists is a state error.
#[tokio::test(flavor = "multi_thread")]
async fn test_send_before_initialize_rejected() {
    let engine = probe_engine(ProbeFactory::new()).build().unwrap();
    let err = engine
        .send_instruction(&Instruction::f32(Opcode::SetTempo, 120.0))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidState {
            state: HandshakeState::Uninitialized,
            ..
        }
    ));
}

/// An instruction whose variant contradicts its opcode range is refused before encoding.
#[tokio::test(flavor = "multi_thread")]
async fn test_shape_mismatch_rejected() {
    let engine = probe_engine(ProbeFactory::new()).build().unwrap();
    within(engine.initialize(|_| {})).await.unwrap();

    let wrong = Instruction::U32 {
        opcode: Opcode::SetCutoff as u8,
        operand: 2000,
    };
    let err = engine.send_instruction(&wrong).unwrap_err();
    assert!(matches!(
        err,
        Error::Core(r303::core::Error::ShapeMismatch { opcode: 40, .. })
    ));
    assert_eq!(engine.stats().instructions_sent, 0);
}

// ---------------------------------------------------------------------------
// Kernel → callback
// ---------------------------------------------------------------------------

/// Sequencer steps emitted by the kernel reach the callback in order.
#[tokio::test(flavor = "multi_thread")]
async fn test_callback_receives_sequencer_steps() {
    let mut factory = ProbeFactory::new();
    factory.emit_steps = true;
    let engine = probe_engine(factory).autostart(true).build().unwrap();

    let steps = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&steps);
    within(engine.initialize(move |instruction| {
        assert!(instruction.is(Opcode::SetSequencerStep));
        sink.lock().push(instruction.as_u32().unwrap());
    }))
    .await
    .unwrap();

    eventually(|| steps.lock().len() >= 32).await;
    let steps = steps.lock().clone();
    for pair in steps.windows(2) {
        assert_eq!(pair[1], (pair[0] + 1) % 16);
    }
    assert!(engine.stats().instructions_received >= 32);
}
