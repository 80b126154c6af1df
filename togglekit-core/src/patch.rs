// Copyright 2025 Togglekit Contributors (https://github.com/togglekit)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Structural diffs over variant lists.
//!
//! [`diff`] compares two lists positionally after the incoming one has been
//! canonically ordered and run through weight redistribution, and emits a
//! JSON Patch style operation sequence (RFC 6902 pointers). Applying the
//! sequence in order with [`apply`] rewrites the old list into the new one.
//! An empty sequence means the update is a no-op and nothing should be
//! persisted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TogglekitError};
use crate::variant::{canonical_sort, Variant};
use crate::weights::normalize;

/// Ordered operation sequence produced by [`diff`].
pub type VariantPatch = Vec<PatchOp>;

/// A single structural operation addressed by JSON pointer.
///
/// `move` never comes out of [`diff`], but patches submitted by API callers
/// may carry it and [`apply`] honors it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Move { from: String, path: String },
}

/// Computes the operation sequence that rewrites `old` into the canonical
/// form of `new`.
///
/// `new` is sorted into canonical order and redistributed first, mirroring
/// exactly what persistence would store. Resubmitting stored content
/// therefore diffs as empty, regardless of the order the caller listed the
/// entries in.
pub fn diff(old: &[Variant], new: &[Variant]) -> Result<VariantPatch> {
    let mut next = new.to_vec();
    canonical_sort(&mut next);
    let next = normalize(&next)?;

    let old_doc = to_document(old)?;
    let new_doc = to_document(&next)?;

    let mut ops = Vec::new();
    diff_value(&old_doc, &new_doc, "", &mut ops);
    Ok(ops)
}

/// Applies an operation sequence to a variant list.
///
/// The list is lifted into a JSON document, each operation is applied in
/// order, and the result is decoded back. A pointer that cannot be
/// resolved, or a result that is no longer a variant list, fails with
/// [`TogglekitError::InvalidPatch`] and leaves the input untouched.
pub fn apply(variants: &[Variant], patch: &[PatchOp]) -> Result<Vec<Variant>> {
    let mut doc = to_document(variants)?;
    for op in patch {
        apply_op(&mut doc, op)?;
    }
    serde_json::from_value(doc).map_err(|e| {
        TogglekitError::InvalidPatch(format!("patched document is not a variant list: {e}"))
    })
}

fn to_document(variants: &[Variant]) -> Result<Value> {
    serde_json::to_value(variants).map_err(|e| {
        TogglekitError::InvalidPatch(format!("variant list is not representable as JSON: {e}"))
    })
}

/// Recursive positional diff. Object fields compare per key, arrays per
/// index with appends and tail removals, everything else by equality.
/// Removals inside arrays are emitted highest index first so earlier ops
/// never shift the targets of later ones.
fn diff_value(old: &Value, new: &Value, path: &str, ops: &mut Vec<PatchOp>) {
    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            for (key, old_entry) in old_map {
                let child = format!("{path}/{}", escape_token(key));
                match new_map.get(key) {
                    Some(new_entry) => diff_value(old_entry, new_entry, &child, ops),
                    None => ops.push(PatchOp::Remove { path: child }),
                }
            }
            for (key, new_entry) in new_map {
                if !old_map.contains_key(key) {
                    ops.push(PatchOp::Add {
                        path: format!("{path}/{}", escape_token(key)),
                        value: new_entry.clone(),
                    });
                }
            }
        }
        (Value::Array(old_items), Value::Array(new_items)) => {
            for (index, (old_item, new_item)) in old_items.iter().zip(new_items).enumerate() {
                diff_value(old_item, new_item, &format!("{path}/{index}"), ops);
            }
            let shared = old_items.len().min(new_items.len());
            for (index, new_item) in new_items.iter().enumerate().skip(shared) {
                ops.push(PatchOp::Add {
                    path: format!("{path}/{index}"),
                    value: new_item.clone(),
                });
            }
            for index in (shared..old_items.len()).rev() {
                ops.push(PatchOp::Remove {
                    path: format!("{path}/{index}"),
                });
            }
        }
        _ => {
            if old != new {
                ops.push(PatchOp::Replace {
                    path: path.to_string(),
                    value: new.clone(),
                });
            }
        }
    }
}

fn apply_op(doc: &mut Value, op: &PatchOp) -> Result<()> {
    match op {
        PatchOp::Add { path, value } => insert(doc, path, value.clone()),
        PatchOp::Remove { path } => remove(doc, path).map(|_| ()),
        PatchOp::Replace { path, value } => {
            let tokens = parse_pointer(path)?;
            let target = resolve(doc, &tokens, path)?;
            *target = value.clone();
            Ok(())
        }
        PatchOp::Move { from, path } => {
            let value = remove(doc, from)?;
            insert(doc, path, value)
        }
    }
}

fn insert(doc: &mut Value, path: &str, value: Value) -> Result<()> {
    let tokens = parse_pointer(path)?;
    let (last, parents) = match tokens.split_last() {
        Some(split) => split,
        None => {
            *doc = value;
            return Ok(());
        }
    };
    let parent = resolve(doc, parents, path)?;
    match parent {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        Value::Array(items) => {
            let index = if last == "-" {
                items.len()
            } else {
                array_index(last, path)?
            };
            if index > items.len() {
                return Err(TogglekitError::InvalidPatch(format!(
                    "\"{path}\" is past the end of the list (len {})",
                    items.len()
                )));
            }
            items.insert(index, value);
            Ok(())
        }
        _ => Err(TogglekitError::InvalidPatch(format!(
            "\"{path}\" does not point into an object or array"
        ))),
    }
}

fn remove(doc: &mut Value, path: &str) -> Result<Value> {
    let tokens = parse_pointer(path)?;
    let (last, parents) = tokens.split_last().ok_or_else(|| {
        TogglekitError::InvalidPatch("cannot remove the whole document".to_string())
    })?;
    let parent = resolve(doc, parents, path)?;
    match parent {
        Value::Object(map) => map.remove(last.as_str()).ok_or_else(|| {
            TogglekitError::InvalidPatch(format!("\"{path}\" does not exist"))
        }),
        Value::Array(items) => {
            let index = array_index(last, path)?;
            if index >= items.len() {
                return Err(TogglekitError::InvalidPatch(format!(
                    "\"{path}\" is past the end of the list (len {})",
                    items.len()
                )));
            }
            Ok(items.remove(index))
        }
        _ => Err(TogglekitError::InvalidPatch(format!(
            "\"{path}\" does not point into an object or array"
        ))),
    }
}

/// Walks `tokens` down to a mutable reference inside `doc`. Every token
/// must resolve; `full` is only used for error messages.
fn resolve<'a>(doc: &'a mut Value, tokens: &[String], full: &str) -> Result<&'a mut Value> {
    let mut current = doc;
    for token in tokens {
        current = match current {
            Value::Object(map) => map.get_mut(token.as_str()).ok_or_else(|| {
                TogglekitError::InvalidPatch(format!("\"{full}\" does not exist"))
            })?,
            Value::Array(items) => {
                let index = array_index(token, full)?;
                items.get_mut(index).ok_or_else(|| {
                    TogglekitError::InvalidPatch(format!("\"{full}\" does not exist"))
                })?
            }
            _ => {
                return Err(TogglekitError::InvalidPatch(format!(
                    "\"{full}\" does not point into an object or array"
                )))
            }
        };
    }
    Ok(current)
}

fn parse_pointer(path: &str) -> Result<Vec<String>> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let rest = path.strip_prefix('/').ok_or_else(|| {
        TogglekitError::InvalidPatch(format!("pointer \"{path}\" must start with '/'"))
    })?;
    Ok(rest.split('/').map(unescape_token).collect())
}

fn array_index(token: &str, full: &str) -> Result<usize> {
    token.parse::<usize>().map_err(|_| {
        TogglekitError::InvalidPatch(format!("\"{full}\" does not address an array slot"))
    })
}

fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}
