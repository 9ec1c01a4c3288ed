//! Bootstrap handshake integration tests
//!
//! Uninitialized → LoadingKernel → CreatingRenderThread → AwaitingAck → Ready,
//! and every way that can end in Failed instead.

use crate::helpers::*;
use r303::prelude::*;
use r303::render;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A healthy kernel brings the engine to Ready.
#[tokio::test(flavor = "multi_thread")]
async fn test_initialize_reaches_ready() {
    init_tracing();
    let engine = probe_engine(ProbeFactory::new()).build().unwrap();
    assert_eq!(engine.state(), HandshakeState::Uninitialized);

    within(engine.initialize(|_| {})).await.unwrap();

    assert!(engine.is_ready());
    assert!(engine.render_stats().is_some());
    assert_eq!(engine.stats().duplicate_acks, 0);
    engine.shutdown().await;
}

/// The kernel is loaded from disk when given a path.
#[tokio::test(flavor = "multi_thread")]
async fn test_initialize_from_kernel_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kernel.wasm");
    std::fs::write(&path, TEST_KERNEL).unwrap();

    let engine = Engine::builder(ProbeFactory::new())
        .kernel_path(&path)
        .build()
        .unwrap();
    within(engine.initialize(|_| {})).await.unwrap();
    assert!(engine.is_ready());
}

/// Initialize is valid exactly once.
#[tokio::test(flavor = "multi_thread")]
async fn test_initialize_twice_rejected() {
    let engine = probe_engine(ProbeFactory::new()).build().unwrap();
    within(engine.initialize(|_| {})).await.unwrap();

    let err = engine.initialize(|_| {}).await.unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidState {
            operation: "initialize",
            state: HandshakeState::Ready
        }
    ));
    assert!(engine.is_ready());
}

/// A second initialize racing the first is rejected without disturbing it.
#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_initialize_rejected() {
    let (factory, gate) = ProbeFactory::new().gated();
    let engine = Arc::new(probe_engine(factory).build().unwrap());

    let first = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.initialize(|_| {}).await }
    });
    eventually(|| engine.state() == HandshakeState::AwaitingAck).await;

    let err = engine.initialize(|_| {}).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }));

    gate.send(()).unwrap();
    within(first).await.unwrap().unwrap();
    assert!(engine.is_ready());
}

/// A missing kernel file fails the handshake and leaves the engine unusable.
#[tokio::test(flavor = "multi_thread")]
async fn test_missing_kernel_file_fails() {
    let engine = Engine::builder(ProbeFactory::new())
        .kernel_path("/nonexistent/r303/kernel.wasm")
        .build()
        .unwrap();

    let err = engine.initialize(|_| {}).await.unwrap_err();
    assert!(matches!(err, Error::KernelLoad { .. }));
    assert!(matches!(engine.state(), HandshakeState::Failed(_)));
    assert!(engine.render_stats().is_none());

    let err = engine
        .send_instruction(&Instruction::f32(Opcode::SetCutoff, 100.0))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }));
    assert!(engine.initialize(|_| {}).await.is_err());
}

/// A kernel that fails to instantiate is reported without waiting for the timeout.
#[tokio::test(flavor = "multi_thread")]
async fn test_instantiation_failure_is_prompt() {
    let mut factory = ProbeFactory::new();
    factory.fail = true;
    let engine = probe_engine(factory)
        .bootstrap_timeout(Duration::from_secs(30))
        .build()
        .unwrap();

    let started = Instant::now();
    let err = within(engine.initialize(|_| {})).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Render(render::Error::KernelInstantiation(_))
    ));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(matches!(engine.state(), HandshakeState::Failed(_)));
}

/// A kernel that never acknowledges trips the bootstrap timeout.
#[tokio::test(flavor = "multi_thread")]
async fn test_bootstrap_timeout() {
    let mut factory = ProbeFactory::new();
    factory.delay = Some(Duration::from_millis(300));
    let engine = probe_engine(factory)
        .bootstrap_timeout(Duration::from_millis(50))
        .build()
        .unwrap();

    let err = within(engine.initialize(|_| {})).await.unwrap_err();
    assert!(matches!(err, Error::BootstrapTimeout { timeout_ms: 50 }));

    match engine.state() {
        HandshakeState::Failed(reason) => assert!(reason.contains("50ms")),
        other => panic!("expected Failed, got {other:?}"),
    }
}

/// Extra acknowledgements are swallowed and counted, never delivered.
#[tokio::test(flavor = "multi_thread")]
async fn test_duplicate_acks_ignored() {
    let mut factory = ProbeFactory::new();
    factory.extra_acks = 3;
    let engine = probe_engine(factory).autostart(true).build().unwrap();

    let delivered = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&delivered);
    within(engine.initialize(move |i| sink.lock().push(i))).await.unwrap();

    eventually(|| engine.stats().duplicate_acks == 3).await;
    assert!(engine.is_ready());
    assert!(delivered
        .lock()
        .iter()
        .all(|i| !i.is(Opcode::BootstrapFinished)));
}

/// Build-time validation rejects unusable configurations.
#[test]
fn test_build_validates_config() {
    let err = probe_engine(ProbeFactory::new())
        .segment_bytes(8)
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));

    let err = Engine::builder(ProbeFactory::new()).build().unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

/// A configuration loaded from JSON drives the builder.
#[tokio::test(flavor = "multi_thread")]
async fn test_config_from_json() {
    let config: EngineConfig =
        serde_json::from_str(r#"{"segment_bytes": 2048, "bootstrap_timeout_ms": 1000}"#).unwrap();
    let engine = probe_engine(ProbeFactory::new())
        .config(config)
        .build()
        .unwrap();
    assert_eq!(engine.config().segment_bytes, 2048);
    assert_eq!(engine.config().program_capacity, 1024);

    within(engine.initialize(|_| {})).await.unwrap();
    assert!(engine.is_ready());
}

/// Dropping `initialize` mid-handshake fails the engine and releases the render side,
/// even if the kernel acknowledges afterwards.
#[tokio::test(flavor = "multi_thread")]
async fn test_cancelled_initialize_fails_engine() {
    let (factory, gate) = ProbeFactory::new().gated();
    let engine = Arc::new(probe_engine(factory).build().unwrap());

    let init = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.initialize(|_| {}).await }
    });
    eventually(|| engine.state() == HandshakeState::AwaitingAck).await;

    init.abort();
    assert!(within(init).await.unwrap_err().is_cancelled());
    let _ = gate.send(());

    assert!(matches!(engine.state(), HandshakeState::Failed(_)));
    assert!(engine.render_stats().is_none());

    // A late acknowledgement must not revive the engine.
    tokio::time::sleep(Duration::from_millis(100)).await;
    match engine.state() {
        HandshakeState::Failed(reason) => assert!(reason.contains("cancelled")),
        other => panic!("expected Failed, got {other:?}"),
    }
    assert!(matches!(
        engine.toggle_start().unwrap_err(),
        Error::InvalidState { .. }
    ));
    assert!(matches!(
        engine.initialize(|_| {}).await.unwrap_err(),
        Error::InvalidState { .. }
    ));
}

/// The engine is already Ready when the callback first sees an instruction.
#[tokio::test(flavor = "multi_thread")]
async fn test_callback_observes_ready() {
    let mut factory = ProbeFactory::new();
    factory.emit_steps = true;
    let engine = Arc::new(probe_engine(factory).autostart(true).build().unwrap());

    let observed = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&observed);
    let weak = Arc::downgrade(&engine);
    within(engine.initialize(move |_| {
        let ready = weak.upgrade().is_some_and(|engine| engine.is_ready());
        sink.lock().push(ready);
    }))
    .await
    .unwrap();

    eventually(|| observed.lock().len() >= 8).await;
    assert!(observed.lock().iter().all(|ready| *ready));
    engine.shutdown().await;
}

/// Timeouts beyond the millisecond range saturate instead of wrapping.
#[test]
fn test_bootstrap_timeout_saturates() {
    let engine = probe_engine(ProbeFactory::new())
        .bootstrap_timeout(Duration::MAX)
        .build()
        .unwrap();
    assert_eq!(engine.config().bootstrap_timeout_ms, u64::MAX);
}
