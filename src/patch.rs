//! RFC 6902 JSON Patch operations for resource updates
//!
//! Terraform updates are expressed as a list of patch operations diffed from
//! the prior and planned state, then applied through the dynamic client.
//! Only mutable metadata (labels, annotations) is patchable; replica and
//! policy changes force replacement at plan time.

use serde::Serialize;
use serde_json::Value;

use crate::{Error, Result};

/// A single JSON Patch operation
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    /// Add a value at the given path
    Add {
        /// JSON pointer to the target location
        path: String,
        /// Value to add
        value: Value,
    },
    /// Replace the value at the given path
    Replace {
        /// JSON pointer to the target location
        path: String,
        /// Replacement value
        value: Value,
    },
    /// Remove the value at the given path
    Remove {
        /// JSON pointer to the target location
        path: String,
    },
}

/// Marshal operations into the patch representation the client applies.
/// A marshaling failure here is fatal and surfaces as an apply error.
pub fn to_json_patch(ops: &[PatchOperation]) -> Result<json_patch::Patch> {
    let value = serde_json::to_value(ops).map_err(|e| Error::serialization(e.to_string()))?;
    serde_json::from_value(value)
        .map_err(|e| Error::serialization(format!("failed to marshal update operations: {e}")))
}

/// Escape a map key for use in a JSON pointer (RFC 6901: `~` then `/`)
pub fn escape_json_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

/// Diff one string map (labels or annotations) between old and new state,
/// appending the patch operations needed to reconcile the live object.
pub fn diff_string_map(
    path: &str,
    old: Option<&Value>,
    new: Option<&Value>,
    ops: &mut Vec<PatchOperation>,
) {
    let empty = serde_json::Map::new();
    let old_map = old.and_then(Value::as_object).unwrap_or(&empty);
    let new_map = new.and_then(Value::as_object).unwrap_or(&empty);

    if old_map == new_map {
        return;
    }

    // The map didn't exist on the object yet: add it wholesale so per-key
    // adds don't fail against a missing parent.
    if old_map.is_empty() {
        ops.push(PatchOperation::Add {
            path: path.to_string(),
            value: Value::Object(new_map.clone()),
        });
        return;
    }

    if new_map.is_empty() {
        ops.push(PatchOperation::Remove {
            path: path.to_string(),
        });
        return;
    }

    for (key, old_value) in old_map {
        let escaped = escape_json_pointer(key);
        match new_map.get(key) {
            None => ops.push(PatchOperation::Remove {
                path: format!("{path}/{escaped}"),
            }),
            Some(new_value) if new_value != old_value => ops.push(PatchOperation::Replace {
                path: format!("{path}/{escaped}"),
                value: new_value.clone(),
            }),
            Some(_) => {}
        }
    }

    for (key, new_value) in new_map {
        if !old_map.contains_key(key) {
            ops.push(PatchOperation::Add {
                path: format!("{path}/{}", escape_json_pointer(key)),
                value: new_value.clone(),
            });
        }
    }
}

/// Build the metadata patch operations between two metadata blocks
/// (the first element of each state's `metadata` list).
pub fn metadata_patch_ops(old_meta: &Value, new_meta: &Value) -> Vec<PatchOperation> {
    let mut ops = Vec::new();
    diff_string_map(
        "/metadata/labels",
        old_meta.get("labels"),
        new_meta.get("labels"),
        &mut ops,
    );
    diff_string_map(
        "/metadata/annotations",
        old_meta.get("annotations"),
        new_meta.get("annotations"),
        &mut ops,
    );
    ops
}
