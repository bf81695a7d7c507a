// crates/engine-session/tests/assembly_ops.rs
use std::f64::consts::FRAC_PI_2;
use std::thread;

use engine_core::testing::{MockComponent, MockDocument, MockEngine, MockLauncher};
use engine_core::{Component, Matrix3, Operation, RigidTransform};
use engine_session::{DocumentHandle, EngineSession, Error};

const FRAME: &str = "C:/work/frame.sldasm";
const BRACKET: &str = "C:/work/Bracket.SLDPRT";
const WASHER: &str = "C:/work/washer.sldprt";

const EPS: f64 = 1e-9;

struct Fixture {
    session: EngineSession<MockLauncher>,
    engine: MockEngine,
    frame: MockDocument,
    bracket: MockDocument,
    washer: MockComponent,
    handle: DocumentHandle,
}

/// A connected session with `frame` open. `frame` holds `bracket-1`
/// (path spelled differently from the bracket file) and `washer-1`.
fn with_frame() -> Fixture {
    let engine = MockEngine::new();

    let frame = MockDocument::assembly(FRAME);
    frame.add_child(MockComponent::new("bracket-1", "c:/WORK/bracket.sldprt"));
    let washer = MockComponent::new("washer-1", WASHER);
    frame.add_child(washer.clone());
    engine.add_file(frame.clone());

    let bracket = MockDocument::part(BRACKET);
    engine.add_file(bracket.clone());
    engine.add_file(MockDocument::part(WASHER));

    let session = EngineSession::new(MockLauncher::launching(engine.clone())).unwrap();
    session.connect(false, false).unwrap();
    let handle = session.open_assembly(FRAME, true).unwrap();

    Fixture {
        session,
        engine,
        frame,
        bracket,
        washer,
        handle,
    }
}

fn rows(m: Matrix3) -> Vec<Vec<f64>> {
    m.rows().iter().map(|r| r.to_vec()).collect()
}

fn assert_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!((a - e).abs() < EPS, "index {}: {} != {} in {:?}", i, a, e, actual);
    }
}

fn assert_placement(actual: RigidTransform, expected: RigidTransform) {
    assert_close(&actual.to_array12(), &expected.to_array12());
}

#[test]
fn components_resolve_by_name_or_by_tracked_handle() {
    let fx = with_frame();

    let by_name = fx.session.resolve_component(&fx.handle, "washer-1").unwrap();
    assert_eq!(by_name.name(), "washer-1");

    // Path differs from the child's only in case.
    let part = fx.session.open_part(BRACKET, true).unwrap();
    let by_handle = fx.session.resolve_component(&fx.handle, part.as_str()).unwrap();
    assert_eq!(by_handle.name(), "bracket-1");
}

#[test]
fn unknown_reference_is_component_not_found() {
    let fx = with_frame();

    let err = fx.session.resolve_component(&fx.handle, "nut-9").unwrap_err();
    assert_eq!(err.to_string(), "component not found: nut-9");

    // A never-saved document has no path to match against.
    let part = fx.session.open_part(BRACKET, true).unwrap();
    fx.bracket.set_path(None);
    assert!(matches!(
        fx.session.resolve_component(&fx.handle, part.as_str()),
        Err(Error::ComponentNotFound(_))
    ));
}

#[test]
fn container_must_be_a_tracked_assembly() {
    let fx = with_frame();
    let part = fx.session.open_part(WASHER, true).unwrap();

    assert!(matches!(
        fx.session.resolve_component(&part, "washer-1"),
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        fx.session.resolve_component(&"nope".into(), "washer-1"),
        Err(Error::HandleNotFound(_))
    ));
    assert!(matches!(
        fx.session.resolve_component(&fx.handle, " "),
        Err(Error::Validation(_))
    ));
}

#[test]
fn get_transform_prefers_the_total_placement() {
    let fx = with_frame();
    fx.washer
        .set_local_transform(Some(RigidTransform::from_translation([1.0, 0.0, 0.0])));
    fx.washer
        .set_total_transform(Some(RigidTransform::from_translation([1.0, 2.0, 3.0])));

    let total = fx.session.get_transform(&fx.handle, "washer-1").unwrap();
    assert_close(
        &total,
        &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 2.0, 3.0],
    );

    fx.washer.set_total_transform(None);
    let local = fx.session.get_transform(&fx.handle, "washer-1").unwrap();
    assert_close(&local[9..], &[1.0, 0.0, 0.0]);

    fx.washer.set_local_transform(None);
    assert!(matches!(
        fx.session.get_transform(&fx.handle, "washer-1"),
        Err(Error::OperationFailed {
            operation: Operation::GetTransform,
            ..
        })
    ));
}

#[test]
fn translate_moves_along_parent_axes() {
    let fx = with_frame();
    // Turned a quarter about Z; the delta must not follow that turn.
    fx.washer.set_local_transform(Some(RigidTransform::new(
        Matrix3::rot_z(FRAC_PI_2),
        [1.0, 0.0, 0.0],
    )));

    fx.session.translate(&fx.handle, "washer-1", 2.0, 0.0, -1.0).unwrap();

    let placed = fx.washer.local_transform().unwrap();
    assert_placement(
        placed,
        RigidTransform::new(Matrix3::rot_z(FRAC_PI_2), [3.0, 0.0, -1.0]),
    );
}

#[test]
fn rotate_in_place_keeps_the_component_origin() {
    let fx = with_frame();
    fx.washer.set_local_transform(Some(RigidTransform::from_translation([5.0, -2.0, 4.0])));

    fx.session
        .rotate_in_place(&fx.handle, "washer-1", &rows(Matrix3::rot_z(FRAC_PI_2)))
        .unwrap();

    let placed = fx.washer.local_transform().unwrap();
    assert_placement(
        placed,
        RigidTransform::new(Matrix3::rot_z(FRAC_PI_2), [5.0, -2.0, 4.0]),
    );
}

#[test]
fn rotate_component_turns_about_the_parent_origin() {
    let fx = with_frame();
    fx.washer.set_local_transform(Some(RigidTransform::from_translation([1.0, 0.0, 0.0])));

    fx.session
        .rotate_component(&fx.handle, "washer-1", 0.0, 0.0, FRAC_PI_2)
        .unwrap();

    let placed = fx.washer.local_transform().unwrap();
    assert_placement(
        placed,
        RigidTransform::new(Matrix3::rot_z(FRAC_PI_2), [0.0, 1.0, 0.0]),
    );
}

#[test]
fn single_axis_euler_matches_the_axis_rotation() {
    let fx = with_frame();

    fx.session
        .rotate_component(&fx.handle, "washer-1", FRAC_PI_2, 0.0, 0.0)
        .unwrap();

    let placed = fx.washer.local_transform().unwrap();
    assert_placement(placed, RigidTransform::from_rotation(Matrix3::rot_x(FRAC_PI_2)));
}

#[test]
fn set_transform_is_absolute() {
    let fx = with_frame();
    let identity = rows(Matrix3::IDENTITY);

    fx.session
        .set_transform(&fx.handle, "washer-1", 4.0, 5.0, 6.0, &identity)
        .unwrap();
    fx.session
        .set_transform(&fx.handle, "washer-1", 4.0, 5.0, 6.0, &identity)
        .unwrap();

    assert_eq!(
        fx.washer.local_transform(),
        Some(RigidTransform::from_translation([4.0, 5.0, 6.0]))
    );
}

#[test]
fn malformed_input_is_rejected_before_dispatch() {
    let fx = with_frame();
    let calls_before = fx.engine.calls().len();

    let two_by_three = vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]];
    assert!(matches!(
        fx.session.rotate_in_place(&fx.handle, "washer-1", &two_by_three),
        Err(Error::Validation(_))
    ));

    let mut with_nan = rows(Matrix3::IDENTITY);
    with_nan[1][2] = f64::NAN;
    assert!(matches!(
        fx.session.set_transform(&fx.handle, "washer-1", 0.0, 0.0, 0.0, &with_nan),
        Err(Error::Validation(_))
    ));

    assert!(matches!(
        fx.session.translate(&fx.handle, "washer-1", f64::INFINITY, 0.0, 0.0),
        Err(Error::Validation(_))
    ));

    assert_eq!(fx.engine.calls().len(), calls_before);
    assert_eq!(fx.washer.local_transform(), Some(RigidTransform::IDENTITY));
}

#[test]
fn fixing_and_floating_a_component() {
    let fx = with_frame();

    fx.session.set_component_fixed(&fx.handle, "washer-1", true).unwrap();
    assert!(fx.washer.is_fixed());

    fx.session.set_component_fixed(&fx.handle, "washer-1", false).unwrap();
    assert!(!fx.washer.is_fixed());
}

#[test]
fn fixing_fails_when_the_component_cannot_be_selected() {
    let fx = with_frame();
    fx.washer.set_selectable(false);

    let err = fx
        .session
        .set_component_fixed(&fx.handle, "washer-1", true)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::OperationFailed {
            operation: Operation::Select,
            ..
        }
    ));
    assert!(!fx.washer.is_fixed());
}

#[test]
fn add_component_by_path_places_it() {
    let fx = with_frame();

    let name = fx
        .session
        .add_component(&fx.handle, WASHER, 10.0, 0.0, 0.0)
        .unwrap();
    assert_eq!(name, "washer-2");

    let added = fx.frame.child("washer-2").unwrap();
    assert_eq!(
        added.local_transform(),
        Some(RigidTransform::from_translation([10.0, 0.0, 0.0]))
    );
}

#[test]
fn add_component_by_handle_uses_the_saved_path() {
    let fx = with_frame();
    let part = fx.session.open_part(WASHER, true).unwrap();

    let name = fx
        .session
        .add_component(&fx.handle, part.as_str(), 0.0, 0.0, 5.0)
        .unwrap();

    let added = fx.frame.child(&name).unwrap();
    assert_eq!(added.path().as_deref(), Some(WASHER));
}

#[test]
fn add_component_fails_for_an_unsaved_document() {
    let fx = with_frame();
    let part = fx.session.open_part(BRACKET, true).unwrap();
    fx.bracket.set_path(None);

    let err = fx
        .session
        .add_component(&fx.handle, part.as_str(), 0.0, 0.0, 0.0)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::OperationFailed {
            operation: Operation::AddComponent,
            ..
        }
    ));
    assert_eq!(fx.frame.child_names(), vec!["bracket-1", "washer-1"]);
}

#[test]
fn add_component_reports_a_refused_insert() {
    let fx = with_frame();
    fx.frame.set_reject_inserts(true);

    assert!(matches!(
        fx.session.add_component(&fx.handle, WASHER, 0.0, 0.0, 0.0),
        Err(Error::OperationFailed {
            operation: Operation::AddComponent,
            ..
        })
    ));
}

#[test]
fn remove_component_deletes_only_that_child() {
    let fx = with_frame();

    fx.session.remove_component(&fx.handle, "washer-1").unwrap();
    assert_eq!(fx.frame.child_names(), vec!["bracket-1"]);

    assert!(matches!(
        fx.session.remove_component(&fx.handle, "washer-1"),
        Err(Error::ComponentNotFound(_))
    ));
}

#[test]
fn remove_component_tells_select_and_delete_failures_apart() {
    let fx = with_frame();

    fx.washer.set_selectable(false);
    assert!(matches!(
        fx.session.remove_component(&fx.handle, "washer-1"),
        Err(Error::OperationFailed {
            operation: Operation::Select,
            ..
        })
    ));

    fx.washer.set_selectable(true);
    fx.frame.set_delete_fails(true);
    assert!(matches!(
        fx.session.remove_component(&fx.handle, "washer-1"),
        Err(Error::OperationFailed {
            operation: Operation::Delete,
            ..
        })
    ));
    assert_eq!(fx.frame.child_names(), vec!["bracket-1", "washer-1"]);
}

#[test]
fn placement_and_selection_run_on_the_affinity_thread() {
    let fx = with_frame();

    fx.session.translate(&fx.handle, "washer-1", 1.0, 0.0, 0.0).unwrap();
    fx.session.set_component_fixed(&fx.handle, "washer-1", true).unwrap();
    let added = fx
        .session
        .add_component(&fx.handle, WASHER, 0.0, 0.0, 0.0)
        .unwrap();
    fx.session.rotate_component(&fx.handle, &added, 0.0, FRAC_PI_2, 0.0).unwrap();

    let names = fx.engine.call_names();
    assert!(names.contains(&"set_transform washer-1".to_string()));
    assert!(names.contains(&"select washer-1".to_string()));
    assert!(names.contains(&format!("set_transform {}", added)));

    let threads = fx.engine.call_threads();
    assert_eq!(threads.len(), 1);
    assert_ne!(threads[0], thread::current().id());
}

#[test]
fn component_calls_fail_once_disposed() {
    let fx = with_frame();
    fx.session.dispose();

    assert!(matches!(
        fx.session.get_transform(&fx.handle, "washer-1"),
        Err(Error::Disposed)
    ));
    assert!(matches!(
        fx.session.translate(&fx.handle, "washer-1", 1.0, 0.0, 0.0),
        Err(Error::Disposed)
    ));
}
