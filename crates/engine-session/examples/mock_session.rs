//! Drive a session end to end against the in-memory engine.
//!
//! Run with e.g. `ENGINE_LOG=debug` to see every dispatched call.

use engine_core::testing::{MockComponent, MockDocument, MockEngine, MockLauncher};
use engine_session::{logging, EngineSession, SessionConfig};

fn main() -> anyhow::Result<()> {
    let config = SessionConfig::from_env()?;
    logging::init(&config.log_filter);

    // A tiny workspace: one assembly holding one bolt.
    let engine = MockEngine::new();
    let frame = MockDocument::assembly("C:/work/frame.sldasm");
    frame.add_child(MockComponent::new("bolt-1", "C:/work/bolt.sldprt"));
    engine.add_file(frame);
    engine.add_file(MockDocument::part("C:/work/bolt.sldprt"));

    let session = EngineSession::with_config(MockLauncher::launching(engine), config)?;
    session.connect_with_defaults()?;
    println!("engine revision {}", session.revision()?);

    let asm = session.open_assembly("C:/work/frame.sldasm", true)?;
    let bolt = session.open_part("C:/work/bolt.sldprt", true)?;

    // By handle: matches bolt-1 through its file path.
    session.translate(&asm, bolt.as_str(), 0.0, 0.0, 25.0)?;
    session.rotate_component(&asm, "bolt-1", 0.0, 0.0, std::f64::consts::FRAC_PI_4)?;
    let second = session.add_component(&asm, bolt.as_str(), 50.0, 0.0, 0.0)?;
    session.set_component_fixed(&asm, &second, true)?;

    for name in ["bolt-1", second.as_str()] {
        let t = session.get_transform(&asm, name)?;
        println!("{:<8} at ({:8.3}, {:8.3}, {:8.3})", name, t[9], t[10], t[11]);
    }

    for doc in session.documents()? {
        println!("{} {:<8} {}", doc.handle, doc.kind, doc.title);
    }

    session.close(&bolt, false, true)?;
    session.close(&asm, true, true)?;
    session.shutdown(false);
    Ok(())
}
