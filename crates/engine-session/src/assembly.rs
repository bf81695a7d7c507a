//! Component operations on assembly documents.
//!
//! Frames, for every transform operation:
//! - `set_transform`: absolute placement in the parent assembly;
//! - `translate`: delta along the parent assembly's axes;
//! - `rotate_component`: Euler rotation about the parent assembly's origin;
//! - `rotate_in_place`: rotation about the component's own origin.
//!
//! All deltas are left-multiplied onto the component's current local
//! transform.

use std::sync::Arc;

use tracing::debug;

use engine_core::{
    resolve_component, Component, Document, DocumentHandle, EngineLauncher, Error, Matrix3,
    Operation, Result, RigidTransform,
};

use crate::shared::{ComponentOf, DocOf, SessionCore};
use crate::session::{require_non_empty, EngineSession};

impl<L: EngineLauncher> SessionCore<L> {
    /// Resolve `reference` inside the assembly `container` and run `op`
    /// with both, on the affinity thread.
    fn with_component<T, F>(
        self: &Arc<Self>,
        container: &DocumentHandle,
        reference: &str,
        op: F,
    ) -> Result<T>
    where
        F: FnOnce(&DocOf<L>, ComponentOf<L>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        require_non_empty("component reference", reference)?;
        let container = container.clone();
        let reference = reference.to_string();

        self.with_engine(move |_, documents| {
            let documents = &*documents;
            let assembly = documents.resolve_assembly(container.as_str())?;
            let component = resolve_component(assembly, &reference, documents)?;
            op(assembly, component)
        })
    }
}

impl<L: EngineLauncher> EngineSession<L> {
    /// The child of `container` that `reference` names (by name, or by
    /// tracked handle of the file it instantiates).
    pub fn resolve_component(
        &self,
        container: &DocumentHandle,
        reference: &str,
    ) -> Result<ComponentOf<L>> {
        self.core
            .with_component(container, reference, |_, component| Ok(component))
    }

    /// Current placement as 12 values: rotation row-major, then translation.
    ///
    /// Prefers the total transform (including enclosing assemblies) and
    /// falls back to the local one.
    pub fn get_transform(&self, container: &DocumentHandle, reference: &str) -> Result<[f64; 12]> {
        self.core.with_component(container, reference, |_, component| {
            component
                .total_transform()
                .or_else(|| component.transform())
                .map(|t| t.to_array12())
                .ok_or_else(|| {
                    Error::failed(
                        Operation::GetTransform,
                        format!("component {} has no transform", component.name()),
                    )
                })
        })
    }

    /// Replace the placement outright (not composed with the current one).
    pub fn set_transform(
        &self,
        container: &DocumentHandle,
        reference: &str,
        x: f64,
        y: f64,
        z: f64,
        rotation: &[Vec<f64>],
    ) -> Result<()> {
        let rotation = Matrix3::from_rows(rotation)?;
        let translation = finite_vector("translation", [x, y, z])?;
        let placement = RigidTransform::new(rotation, translation);

        self.core.with_component(container, reference, move |_, component| {
            assign(&component, placement)
        })
    }

    /// Move by `(dx, dy, dz)` along the parent assembly's axes.
    pub fn translate(
        &self,
        container: &DocumentHandle,
        reference: &str,
        dx: f64,
        dy: f64,
        dz: f64,
    ) -> Result<()> {
        let delta = finite_vector("translation delta", [dx, dy, dz])?;

        self.core.with_component(container, reference, move |_, component| {
            let current = local_transform(&component)?;
            assign(&component, current.translated(delta))
        })
    }

    /// Rotate about the component's own origin; its position is unchanged.
    pub fn rotate_in_place(
        &self,
        container: &DocumentHandle,
        reference: &str,
        rotation: &[Vec<f64>],
    ) -> Result<()> {
        let rotation = Matrix3::from_rows(rotation)?;

        self.core.with_component(container, reference, move |_, component| {
            let current = local_transform(&component)?;
            assign(&component, current.rotated_in_place(rotation))
        })
    }

    /// Rotate by Euler angles (radians), `R = Rz(rz)·Ry(ry)·Rx(rx)`, about
    /// the parent assembly's origin.
    pub fn rotate_component(
        &self,
        container: &DocumentHandle,
        reference: &str,
        rx: f64,
        ry: f64,
        rz: f64,
    ) -> Result<()> {
        let [rx, ry, rz] = finite_vector("rotation angles", [rx, ry, rz])?;
        let rotation = Matrix3::from_euler(rx, ry, rz);

        self.core.with_component(container, reference, move |_, component| {
            let current = local_transform(&component)?;
            assign(&component, current.rotated_about_origin(rotation))
        })
    }

    /// Fix (`true`) or float (`false`) a component.
    pub fn set_component_fixed(
        &self,
        container: &DocumentHandle,
        reference: &str,
        fixed: bool,
    ) -> Result<()> {
        self.core.with_component(container, reference, move |assembly, component| {
            select_only(assembly, &component)?;
            assembly
                .set_selected_fixed(fixed)
                .map_err(|f| Error::engine(Operation::SetFixed, f))?;
            debug!(component = %component.name(), fixed, "changed fixed state");
            Ok(())
        })
    }

    /// Insert a part at `(x, y, z)` and return the new component's name.
    ///
    /// `part_ref` is a tracked handle (its saved path is used) or a literal
    /// file path.
    pub fn add_component(
        &self,
        container: &DocumentHandle,
        part_ref: &str,
        x: f64,
        y: f64,
        z: f64,
    ) -> Result<String> {
        require_non_empty("part reference", part_ref)?;
        let position = finite_vector("position", [x, y, z])?;
        let container = container.clone();
        let part_ref = part_ref.to_string();

        self.core.with_engine(move |_, documents| {
            let documents = &*documents;
            let assembly = documents.resolve_assembly(container.as_str())?;

            let path = if documents.contains(&part_ref) {
                documents
                    .resolve(&part_ref)?
                    .document
                    .path()
                    .filter(|p| !p.trim().is_empty())
                    .ok_or_else(|| {
                        Error::failed(
                            Operation::AddComponent,
                            format!("document {} has no saved path; save it first", part_ref),
                        )
                    })?
            } else {
                part_ref
            };

            let component = assembly.add_component(&path, position).ok_or_else(|| {
                Error::failed(Operation::AddComponent, format!("engine did not insert {}", path))
            })?;

            let name = component.name();
            debug!(%container, %path, %name, "added component");
            Ok(name)
        })
    }

    /// Delete a component from its assembly.
    pub fn remove_component(&self, container: &DocumentHandle, reference: &str) -> Result<()> {
        self.core.with_component(container, reference, |assembly, component| {
            select_only(assembly, &component)?;
            if !assembly.delete_selection() {
                return Err(Error::failed(
                    Operation::Delete,
                    format!("could not delete {}", component.name()),
                ));
            }
            debug!(component = %component.name(), "removed component");
            Ok(())
        })
    }
}

/// Clear the selection and select just `component`.
fn select_only<D: Document>(assembly: &D, component: &D::Component) -> Result<()> {
    assembly.clear_selection();
    if !component.select(false) {
        return Err(Error::failed(
            Operation::Select,
            format!("could not select {}", component.name()),
        ));
    }
    Ok(())
}

fn local_transform<C: Component>(component: &C) -> Result<RigidTransform> {
    component.transform().ok_or_else(|| {
        Error::failed(
            Operation::GetTransform,
            format!("component {} has no transform", component.name()),
        )
    })
}

fn assign<C: Component>(component: &C, placement: RigidTransform) -> Result<()> {
    component
        .set_transform(placement)
        .map_err(|f| Error::engine(Operation::SetTransform, f))?;
    debug!(component = %component.name(), translation = ?placement.translation, "placed component");
    Ok(())
}

fn finite_vector(what: &str, v: [f64; 3]) -> Result<[f64; 3]> {
    if v.iter().all(|c| c.is_finite()) {
        Ok(v)
    } else {
        Err(Error::Validation(format!("{} must be finite, got {:?}", what, v)))
    }
}
