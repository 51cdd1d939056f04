// normalize.rs — Argument and output-parameter record repair and editing
//
// Turns loosely-shaped wire records into complete `Argument` / `OutputParam`
// values, and provides the copy-on-write list edits the editing surface
// performs (patch, move, remove, add). Every edit returns a new list; the
// input slice is never modified.
//
// Preconditions: none. Any JSON shape the wire types accept is repaired.
// Postconditions: every argument has a unique id, a mode, a typed payload and
//                 a cached type; every output has an id, a name and a kind.
// Failure modes: out-of-range indices yield `EditError::IndexOutOfRange`
//                (logged at warn level); the caller keeps its list unchanged.
// Side effects: none beyond logging.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;

use crate::diag::{codes, Diagnostic, Location};
use crate::graph::{ArgMode, ArgSource, Argument, ArtifactKind, NodeId, OutputParam, TypeTag};
use crate::id::IdAllocator;

// ── Errors ──────────────────────────────────────────────────────────────────

/// A rejected edit. The list or snapshot the edit targeted is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("index {index} is out of range for {what} list of length {len}")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },
    #[error("no node with id '{0}'")]
    UnknownNode(NodeId),
}

// ── Wire records ────────────────────────────────────────────────────────────

/// An argument as the editing surface sends it: every field optional, all
/// mode payloads side by side.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawArgument {
    pub id: Option<String>,
    pub name: Option<String>,
    pub mode: Option<String>,
    pub value: Option<Value>,
    pub key: Option<String>,
    pub node_id: Option<String>,
    pub output_name: Option<String>,
    #[serde(rename = "type")]
    pub ty: Option<String>,
}

/// An output parameter as the editing surface sends it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawOutput {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ty: Option<String>,
}

/// Render a JSON scalar as the raw string the literal formatter expects.
pub fn value_to_raw(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn non_empty(s: Option<&String>) -> Option<String> {
    s.filter(|s| !s.is_empty()).cloned()
}

// ── Normalization ───────────────────────────────────────────────────────────

/// Normalized records plus the repairs that were made.
#[derive(Debug, Default)]
pub struct Normalized<T> {
    pub items: Vec<T>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Complete and repair an argument list.
///
/// Missing or duplicated ids are replaced with fresh ones, a missing mode
/// becomes `literal`, and payload fields default to typed empties. `at`
/// locates the owning node in any diagnostics produced.
pub fn normalize_arguments(
    raw: &[RawArgument],
    ids: &mut IdAllocator,
    at: &Location,
) -> Normalized<Argument> {
    let mut taken: HashSet<String> = raw.iter().filter_map(|a| non_empty(a.id.as_ref())).collect();
    let mut seen: HashSet<String> = HashSet::new();
    let mut diagnostics = Vec::new();
    let mut items = Vec::with_capacity(raw.len());

    for (idx, r) in raw.iter().enumerate() {
        let loc = Location {
            arg_index: Some(idx),
            ..at.clone()
        };

        let id = match non_empty(r.id.as_ref()) {
            Some(id) if seen.contains(&id) => {
                let fresh = ids.alloc_arg(&taken);
                tracing::warn!(old = %id, new = %fresh, "duplicate argument id regenerated");
                diagnostics.push(
                    Diagnostic::warning(
                        loc.clone(),
                        format!("duplicate argument id '{}' replaced with '{}'", id, fresh),
                    )
                    .with_code(codes::W0501),
                );
                fresh
            }
            Some(id) => id,
            None => ids.alloc_arg(&taken),
        };
        taken.insert(id.clone());
        seen.insert(id.clone());

        let mode = match r.mode.as_deref() {
            None | Some("") => ArgMode::Literal,
            Some(m) => ArgMode::parse(m).unwrap_or_else(|| {
                diagnostics.push(
                    Diagnostic::warning(
                        loc.clone(),
                        format!("unknown argument mode '{}', treated as literal", m),
                    )
                    .with_code(codes::W0500),
                );
                ArgMode::Literal
            }),
        };

        let source = match mode {
            ArgMode::Literal => ArgSource::Literal {
                value: r.value.as_ref().map(value_to_raw).unwrap_or_default(),
            },
            ArgMode::Pipeline => ArgSource::Pipeline {
                key: r.key.clone().unwrap_or_default(),
            },
            ArgMode::Node => ArgSource::Node {
                node_id: NodeId(r.node_id.clone().unwrap_or_default()),
                output_name: non_empty(r.output_name.as_ref()),
            },
        };

        items.push(Argument {
            id,
            name: r.name.clone().unwrap_or_default(),
            source,
            ty: non_empty(r.ty.as_ref())
                .map(|t| TypeTag::parse(&t))
                .unwrap_or_default(),
        });
    }

    Normalized { items, diagnostics }
}

/// Complete an output-parameter list: fresh ids where missing or repeated,
/// default kind `Output[Dataset]`.
pub fn normalize_outputs(
    raw: &[RawOutput],
    ids: &mut IdAllocator,
    at: &Location,
) -> Normalized<OutputParam> {
    let mut taken: HashSet<String> = raw.iter().filter_map(|o| non_empty(o.id.as_ref())).collect();
    let mut seen: HashSet<String> = HashSet::new();
    let mut diagnostics = Vec::new();
    let mut items = Vec::with_capacity(raw.len());

    for r in raw {
        let id = match non_empty(r.id.as_ref()) {
            Some(id) if seen.contains(&id) => {
                let fresh = ids.alloc_output(&taken);
                tracing::warn!(old = %id, new = %fresh, "duplicate output id regenerated");
                diagnostics.push(
                    Diagnostic::warning(
                        at.clone(),
                        format!("duplicate output id '{}' replaced with '{}'", id, fresh),
                    )
                    .with_code(codes::W0502),
                );
                fresh
            }
            Some(id) => id,
            None => ids.alloc_output(&taken),
        };
        taken.insert(id.clone());
        seen.insert(id.clone());
        items.push(OutputParam {
            id,
            name: r.name.clone().unwrap_or_default(),
            kind: non_empty(r.ty.as_ref())
                .map(|t| TypeTag::parse(&t))
                .unwrap_or(TypeTag::Output(ArtifactKind::Dataset)),
        });
    }

    Normalized { items, diagnostics }
}

// ── Patches ─────────────────────────────────────────────────────────────────

/// Partial update of one argument. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArgumentPatch {
    pub name: Option<String>,
    pub mode: Option<ArgMode>,
    pub value: Option<String>,
    pub key: Option<String>,
    pub node_id: Option<NodeId>,
    /// `Some("")` clears the output name.
    pub output_name: Option<String>,
    #[serde(rename = "type")]
    pub ty: Option<TypeTag>,
}

impl ArgumentPatch {
    pub fn mode(mode: ArgMode) -> Self {
        ArgumentPatch {
            mode: Some(mode),
            ..Default::default()
        }
    }
}

/// Partial update of one output parameter.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputPatch {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<TypeTag>,
}

/// Merge `patch` into `arg`.
///
/// Switching mode discards the previous payload; the cached type is kept
/// for type synchronization to refresh. Payload fields that do not belong
/// to the resulting mode are ignored.
pub fn apply_patch(arg: &Argument, patch: &ArgumentPatch) -> Argument {
    let mut next = arg.clone();
    if let Some(name) = &patch.name {
        next.name = name.clone();
    }
    if let Some(mode) = patch.mode {
        if mode != arg.mode() {
            next.source = ArgSource::empty(mode);
        }
    }
    match &mut next.source {
        ArgSource::Literal { value } => {
            if let Some(v) = &patch.value {
                *value = v.clone();
            }
        }
        ArgSource::Pipeline { key } => {
            if let Some(k) = &patch.key {
                *key = k.clone();
            }
        }
        ArgSource::Node {
            node_id,
            output_name,
        } => {
            if let Some(id) = &patch.node_id {
                *node_id = id.clone();
            }
            if let Some(out) = &patch.output_name {
                *output_name = if out.is_empty() { None } else { Some(out.clone()) };
            }
        }
    }
    if let Some(ty) = &patch.ty {
        next.ty = ty.clone();
    }
    next
}

// ── List edits ──────────────────────────────────────────────────────────────

/// Names the list kind in `EditError`s and log lines.
pub trait ListEntry: Clone {
    const KIND: &'static str;
}

impl ListEntry for Argument {
    const KIND: &'static str = "argument";
}

impl ListEntry for OutputParam {
    const KIND: &'static str = "output";
}

fn check_index<T: ListEntry>(list: &[T], index: usize) -> Result<(), EditError> {
    if index < list.len() {
        return Ok(());
    }
    tracing::warn!(kind = T::KIND, index, len = list.len(), "edit index out of range; ignored");
    Err(EditError::IndexOutOfRange {
        what: T::KIND,
        index,
        len: list.len(),
    })
}

/// Return a copy of `list` with `list[index]` patched.
pub fn patch_argument(
    list: &[Argument],
    index: usize,
    patch: &ArgumentPatch,
) -> Result<Vec<Argument>, EditError> {
    check_index(list, index)?;
    let mut next = list.to_vec();
    next[index] = apply_patch(&list[index], patch);
    Ok(next)
}

/// Return a copy of `list` with `list[index]` patched.
pub fn patch_output(
    list: &[OutputParam],
    index: usize,
    patch: &OutputPatch,
) -> Result<Vec<OutputParam>, EditError> {
    check_index(list, index)?;
    let mut next = list.to_vec();
    if let Some(name) = &patch.name {
        next[index].name = name.clone();
    }
    if let Some(kind) = &patch.kind {
        next[index].kind = kind.clone();
    }
    Ok(next)
}

/// Return a copy of `list` with the entry at `from` moved to position `to`.
pub fn move_entry<T: ListEntry>(list: &[T], from: usize, to: usize) -> Result<Vec<T>, EditError> {
    check_index(list, from)?;
    check_index(list, to)?;
    let mut next = list.to_vec();
    let item = next.remove(from);
    next.insert(to, item);
    Ok(next)
}

/// Return a copy of `list` without the entry at `index`.
pub fn remove_entry<T: ListEntry>(list: &[T], index: usize) -> Result<Vec<T>, EditError> {
    check_index(list, index)?;
    let mut next = list.to_vec();
    next.remove(index);
    Ok(next)
}

/// First `{prefix}{n}` (n ≥ 1) not present in `names`.
fn first_free_name<'a>(prefix: &str, names: impl Iterator<Item = &'a str>) -> String {
    let used: HashSet<&str> = names.collect();
    (1..)
        .map(|n| format!("{}{}", prefix, n))
        .find(|candidate| !used.contains(candidate.as_str()))
        .unwrap_or_else(|| prefix.to_string())
}

/// Return a copy of `list` with a fresh literal `str` argument appended,
/// named `argN` for the first unused N.
pub fn add_argument(list: &[Argument], ids: &mut IdAllocator) -> Vec<Argument> {
    let taken: HashSet<String> = list.iter().map(|a| a.id.clone()).collect();
    let name = first_free_name("arg", list.iter().map(|a| a.name.as_str()));
    let mut next = list.to_vec();
    next.push(Argument {
        id: ids.alloc_arg(&taken),
        name,
        source: ArgSource::empty(ArgMode::Literal),
        ty: TypeTag::default(),
    });
    next
}

/// Return a copy of `list` with a fresh `Output[Dataset]` output appended,
/// named `outputN` for the first unused N.
pub fn add_output(list: &[OutputParam], ids: &mut IdAllocator) -> Vec<OutputParam> {
    let taken: HashSet<String> = list.iter().map(|o| o.id.clone()).collect();
    let name = first_free_name("output", list.iter().map(|o| o.name.as_str()));
    let mut next = list.to_vec();
    next.push(OutputParam {
        id: ids.alloc_output(&taken),
        name,
        kind: TypeTag::Output(ArtifactKind::Dataset),
    });
    next
}

// ── Tests ───────────────────────────────────────────────────────────────────
