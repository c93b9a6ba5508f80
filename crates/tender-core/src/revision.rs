//! # Revisions
//!
//! Every save of a tender appends a [`Revision`] whose `changes` turn the
//! new plain document back into the previous one.
//!
//! ```text
//!   previous ──── save ────► current
//!       ▲                       │
//!       └──── revert(changes) ──┘
//! ```
//!
//! Changes are JSON-patch operations (`add`, `remove`, `replace`) with
//! JSON-pointer paths. Arrays are compared by index.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::time::Timestamp;

// =============================================================================
// Patch Operations
// =============================================================================

/// One JSON-patch operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    Add { path: String, value: JsonValue },
    Remove { path: String },
    Replace { path: String, value: JsonValue },
}

impl PatchOp {
    pub fn path(&self) -> &str {
        match self {
            PatchOp::Add { path, .. } | PatchOp::Remove { path } | PatchOp::Replace { path, .. } => {
                path
            }
        }
    }
}

fn escape(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn unescape(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// Operations that turn `from` into `to`.
pub fn diff(from: &JsonValue, to: &JsonValue) -> Vec<PatchOp> {
    let mut ops = Vec::new();
    diff_into(&mut ops, String::new(), from, to);
    ops
}

fn diff_into(ops: &mut Vec<PatchOp>, path: String, from: &JsonValue, to: &JsonValue) {
    match (from, to) {
        (JsonValue::Object(old), JsonValue::Object(new)) => diff_objects(ops, &path, old, new),
        (JsonValue::Array(old), JsonValue::Array(new)) => {
            let common = old.len().min(new.len());
            for index in 0..common {
                diff_into(ops, format!("{}/{}", path, index), &old[index], &new[index]);
            }
            for index in (common..old.len()).rev() {
                ops.push(PatchOp::Remove {
                    path: format!("{}/{}", path, index),
                });
            }
            for (index, value) in new.iter().enumerate().skip(common) {
                ops.push(PatchOp::Add {
                    path: format!("{}/{}", path, index),
                    value: value.clone(),
                });
            }
        }
        _ if from != to => ops.push(PatchOp::Replace {
            path,
            value: to.clone(),
        }),
        _ => {}
    }
}

fn diff_objects(
    ops: &mut Vec<PatchOp>,
    path: &str,
    old: &Map<String, JsonValue>,
    new: &Map<String, JsonValue>,
) {
    for (key, value) in old {
        let child = format!("{}/{}", path, escape(key));
        match new.get(key) {
            Some(next) => diff_into(ops, child, value, next),
            None => ops.push(PatchOp::Remove { path: child }),
        }
    }
    for (key, value) in new {
        if !old.contains_key(key) {
            ops.push(PatchOp::Add {
                path: format!("{}/{}", path, escape(key)),
                value: value.clone(),
            });
        }
    }
}

/// Applies `ops` to a copy of `document`.
///
/// ## Errors
/// A message naming the first path that does not exist.
pub fn apply(document: &JsonValue, ops: &[PatchOp]) -> Result<JsonValue, String> {
    let mut result = document.clone();
    for op in ops {
        apply_one(&mut result, op)?;
    }
    Ok(result)
}

fn apply_one(document: &mut JsonValue, op: &PatchOp) -> Result<(), String> {
    let path = op.path();
    if path.is_empty() {
        match op {
            PatchOp::Add { value, .. } | PatchOp::Replace { value, .. } => *document = value.clone(),
            PatchOp::Remove { .. } => *document = JsonValue::Null,
        }
        return Ok(());
    }

    let (parent_path, last) = path.rsplit_once('/').ok_or_else(|| format!("invalid path {}", path))?;
    let last = unescape(last);
    let parent = if parent_path.is_empty() {
        Some(&mut *document)
    } else {
        document.pointer_mut(parent_path)
    };
    let parent = parent.ok_or_else(|| format!("path {} does not exist", parent_path))?;

    match (parent, op) {
        (JsonValue::Object(object), PatchOp::Add { value, .. } | PatchOp::Replace { value, .. }) => {
            object.insert(last, value.clone());
        }
        (JsonValue::Object(object), PatchOp::Remove { .. }) => {
            object
                .remove(&last)
                .ok_or_else(|| format!("path {} does not exist", path))?;
        }
        (JsonValue::Array(array), op) => {
            let index: usize = if last == "-" {
                array.len()
            } else {
                last.parse().map_err(|_| format!("invalid index in {}", path))?
            };
            match op {
                PatchOp::Add { value, .. } if index <= array.len() => array.insert(index, value.clone()),
                PatchOp::Replace { value, .. } if index < array.len() => array[index] = value.clone(),
                PatchOp::Remove { .. } if index < array.len() => {
                    array.remove(index);
                }
                _ => return Err(format!("path {} does not exist", path)),
            }
        }
        _ => return Err(format!("path {} does not exist", path)),
    }
    Ok(())
}

// =============================================================================
// Revision
// =============================================================================

/// One entry of a tender's change history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Revision {
    pub author: String,
    #[serde(with = "crate::time::iso")]
    pub date: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(default)]
    pub changes: Vec<PatchOp>,
}

impl Revision {
    pub fn new(author: &str, date: Timestamp, changes: Vec<PatchOp>) -> Self {
        Revision {
            author: author.to_string(),
            date,
            rev: None,
            changes,
        }
    }

    /// Records the step from `previous` to `current`.
    ///
    /// Returns `None` when nothing changed.
    pub fn between(
        author: &str,
        date: Timestamp,
        previous: &JsonValue,
        current: &JsonValue,
    ) -> Option<Self> {
        let changes = diff(current, previous);
        if changes.is_empty() {
            return None;
        }
        Some(Self::new(author, date, changes))
    }

    /// Rebuilds the document as it was before this revision.
    pub fn revert(&self, current: &JsonValue) -> Result<JsonValue, String> {
        apply(current, &self.changes)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
