//! JSON Patch (RFC 6902) operations describing a pod mutation.
//!
//! Appending to an array that does not exist yet fails when the API server
//! applies the patch, so the first element added to an empty array creates
//! the whole array at `base`. Later elements go to `base/-`.

use crate::annotations::Annotations;
use json_patch::{AddOperation, PatchOperation, RemoveOperation};
use k8s_openapi::api::core::v1::{Container, Volume, VolumeMount};
use serde::Serialize;
use serde_json::Value;

pub const ANNOTATIONS_PATH: &str = "/metadata/annotations";

pub fn add(path: impl Into<String>, value: Value) -> PatchOperation {
    PatchOperation::Add(AddOperation {
        path: path.into(),
        value,
    })
}

pub fn remove(path: impl Into<String>) -> PatchOperation {
    PatchOperation::Remove(RemoveOperation { path: path.into() })
}

/// Escapes a JSON Pointer reference token (RFC 6901). `~` must be handled
/// before `/`.
pub fn escape_json_pointer(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

fn append<T: Serialize>(
    target_empty: bool,
    items: &[T],
    base: &str,
) -> Result<Vec<PatchOperation>, serde_json::Error> {
    let mut first = target_empty;
    items
        .iter()
        .map(|item| -> Result<PatchOperation, serde_json::Error> {
            if std::mem::take(&mut first) {
                Ok(add(base, serde_json::to_value(std::slice::from_ref(item))?))
            } else {
                Ok(add(format!("{}/-", base), serde_json::to_value(item)?))
            }
        })
        .collect()
}

/// Like [`append`], but the items end up in front of the existing ones, in
/// their given order.
fn prepend<T: Serialize>(
    target_empty: bool,
    items: &[T],
    base: &str,
) -> Result<Vec<PatchOperation>, serde_json::Error> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| -> Result<PatchOperation, serde_json::Error> {
            if target_empty && i == 0 {
                Ok(add(base, serde_json::to_value(std::slice::from_ref(item))?))
            } else {
                Ok(add(format!("{}/{}", base, i), serde_json::to_value(item)?))
            }
        })
        .collect()
}

pub fn add_volumes(
    target: &[Volume],
    volumes: &[Volume],
    base: &str,
) -> Result<Vec<PatchOperation>, serde_json::Error> {
    append(target.is_empty(), volumes, base)
}

pub fn add_volume_mounts(
    target: &[VolumeMount],
    mounts: &[VolumeMount],
    base: &str,
) -> Result<Vec<PatchOperation>, serde_json::Error> {
    append(target.is_empty(), mounts, base)
}

pub fn add_containers(
    target: &[Container],
    containers: &[Container],
    base: &str,
) -> Result<Vec<PatchOperation>, serde_json::Error> {
    append(target.is_empty(), containers, base)
}

pub fn prepend_containers(
    target: &[Container],
    containers: &[Container],
    base: &str,
) -> Result<Vec<PatchOperation>, serde_json::Error> {
    prepend(target.is_empty(), containers, base)
}

/// Adds (or overwrites) `annotations` on an object whose current
/// annotations are `target`.
pub fn update_annotations(target: &Annotations, annotations: &Annotations) -> Vec<PatchOperation> {
    if target.is_empty() {
        let map = annotations
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        return vec![add(ANNOTATIONS_PATH, Value::Object(map))];
    }
    annotations
        .iter()
        .map(|(k, v)| {
            add(
                format!("{}/{}", ANNOTATIONS_PATH, escape_json_pointer(k)),
                Value::String(v.clone()),
            )
        })
        .collect()
}
