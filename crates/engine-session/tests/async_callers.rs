// crates/engine-session/tests/async_callers.rs
use engine_core::testing::{MockDocument, MockEngine, MockLauncher};
use engine_session::{EngineSession, Error};

const BRACKET: &str = "C:/work/bracket.sldprt";

#[tokio::test]
async fn session_calls_work_from_async_code() {
    let engine = MockEngine::new();
    engine.add_file(MockDocument::part(BRACKET));
    let session = EngineSession::new(MockLauncher::launching(engine.clone())).unwrap();

    session.connect(false, false).unwrap();
    assert_eq!(session.revision().unwrap(), "31.1.0");
    let handle = session.open_part(BRACKET, true).unwrap();
    session.close(&handle, true, true).unwrap();

    // Dropped inside the runtime: releases the engine instead of aborting.
    drop(session);
    assert!(engine.has_exited());
}

#[tokio::test]
async fn disposed_session_reports_disposed_inside_a_runtime() {
    let session = EngineSession::new(MockLauncher::new()).unwrap();
    session.connect(false, false).unwrap();
    session.dispose();

    assert!(matches!(session.revision(), Err(Error::Disposed)));
}
