//! Mixin composition
//!
//! Folds a parent's resolved table and an ordered list of mixins into a new
//! table with exactly one entry per name. Conflicts are settled here, never at
//! call time:
//! - later entries replace earlier ones
//! - a method replacing an earlier method links to it as its super
//! - concatenated keys append list values, merged keys shallow-merge maps
//!
//! The derived [`ClassIndex`] answers the questions the access layer and the
//! observer engine ask on every mutation: which observers watch a key, which
//! computed keys depend on it, and whether fallback hooks exist.

use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::class::{INIT, SET_UNKNOWN_PROPERTY, UNKNOWN_PROPERTY};
use crate::method::MethodLink;
use crate::mixin::{ComputedProperty, Mixin, MixinId, ObserverCallback, Property};
use crate::properties::Properties;
use crate::value::Value;
use crate::{ObjectError, ObjectResult};

/// A resolved class table entry
#[derive(Clone, Debug)]
pub enum Entry {
    /// Data default
    Data(Value),
    /// Method with its super chain
    Method(Rc<MethodLink>),
    /// Computed property
    Computed(Rc<ComputedProperty>),
    /// Observer declaration
    Observer(Rc<ObserverEntry>),
}

/// Observer declaration with expanded paths
#[derive(Debug)]
pub struct ObserverEntry {
    pub(crate) name: String,
    pub(crate) paths: Vec<String>,
    pub(crate) callback: ObserverCallback,
}

impl ObserverEntry {
    /// Entry name in the class table
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Expanded dependent key paths
    pub fn paths(&self) -> &[String] {
        &self.paths
    }
}

/// Output of a composition pass
#[derive(Debug, Default)]
pub(crate) struct Composition {
    pub(crate) applied: Vec<MixinId>,
    pub(crate) table: IndexMap<String, Entry>,
    pub(crate) concatenated: FxHashSet<String>,
    pub(crate) merged: FxHashSet<String>,
}

/// Lookup structures derived from a resolved table
#[derive(Debug, Default)]
pub(crate) struct ClassIndex {
    /// Root key -> observers watching it, in table order
    pub(crate) observers: FxHashMap<String, Vec<Rc<ObserverEntry>>>,
    /// Root key -> computed keys that depend on it
    pub(crate) dependents: FxHashMap<String, Vec<String>>,
    pub(crate) unknown_property: Option<Rc<MethodLink>>,
    pub(crate) set_unknown_property: Option<Rc<MethodLink>>,
    pub(crate) init_overridden: bool,
}

/// Compose `mixins` on top of `base` (the parent's composition, if any)
pub(crate) fn compose(base: Option<&Composition>, mixins: &[Mixin]) -> ObjectResult<Composition> {
    let mut out = match base {
        Some(base) => Composition {
            applied: base.applied.clone(),
            table: base.table.clone(),
            concatenated: base.concatenated.clone(),
            merged: base.merged.clone(),
        },
        None => Composition::default(),
    };

    let mut order = Vec::new();
    for mixin in mixins {
        mixin.flatten_into(&mut order);
    }

    for mixin in order {
        if out.applied.contains(&mixin.id()) {
            tracing::debug!(mixin = ?mixin.name(), "mixin already applied, skipping");
            continue;
        }
        out.applied.push(mixin.id());
        out.concatenated.extend(mixin.concatenated_keys().iter().cloned());
        out.merged.extend(mixin.merged_keys().iter().cloned());

        for (name, property) in mixin.entries() {
            let entry = resolve_entry(&out, name, property)?;
            out.table.insert(name.to_string(), entry);
        }
    }

    Ok(out)
}

fn resolve_entry(out: &Composition, name: &str, property: &Property) -> ObjectResult<Entry> {
    let previous = out.table.get(name);
    let entry = match property {
        Property::Value(value) => {
            let base = match previous {
                Some(Entry::Data(base)) => base.clone(),
                _ => Value::Undefined,
            };
            if out.concatenated.contains(name) {
                Entry::Data(concat_values(&base, value))
            } else if out.merged.contains(name) {
                Entry::Data(merge_values(&base, value))
            } else {
                Entry::Data(value.clone())
            }
        }
        Property::Method(method) => {
            let next = match previous {
                Some(Entry::Method(link)) => Some(link.clone()),
                _ => None,
            };
            Entry::Method(MethodLink::new(name, method.clone(), next))
        }
        Property::Computed(computed) => {
            for key in computed.dependent_keys() {
                expand_properties(key)?;
            }
            Entry::Computed(Rc::new(computed.clone()))
        }
        Property::Observer { paths, callback } => {
            if paths.is_empty() {
                return Err(ObjectError::InvalidDeclaration {
                    name: name.to_string(),
                    reason: "observer declares no dependent keys".to_string(),
                });
            }
            let mut expanded = Vec::new();
            for path in paths {
                for key in expand_properties(path)? {
                    if !expanded.contains(&key) {
                        expanded.push(key);
                    }
                }
            }
            Entry::Observer(Rc::new(ObserverEntry {
                name: name.to_string(),
                paths: expanded,
                callback: callback.clone(),
            }))
        }
    };
    Ok(entry)
}

/// Build lookup structures for a resolved table
pub(crate) fn build_index(table: &IndexMap<String, Entry>) -> ObjectResult<ClassIndex> {
    let mut index = ClassIndex::default();

    for (name, entry) in table {
        match entry {
            Entry::Observer(observer) => {
                for path in &observer.paths {
                    let watchers = index.observers.entry(root_key(path).to_string()).or_default();
                    if !watchers.iter().any(|w| Rc::ptr_eq(w, observer)) {
                        watchers.push(observer.clone());
                    }
                }
            }
            Entry::Computed(computed) => {
                for key in computed.dependent_keys() {
                    for path in expand_properties(key)? {
                        let dependents = index.dependents.entry(root_key(&path).to_string()).or_default();
                        if !dependents.contains(name) {
                            dependents.push(name.clone());
                        }
                    }
                }
            }
            Entry::Data(_) | Entry::Method(_) => {}
        }
    }

    index.unknown_property = method_link(table, UNKNOWN_PROPERTY);
    index.set_unknown_property = method_link(table, SET_UNKNOWN_PROPERTY);
    index.init_overridden = match table.get(INIT) {
        Some(Entry::Method(link)) => link.depth() > 1,
        Some(_) => true,
        None => false,
    };

    Ok(index)
}

fn method_link(table: &IndexMap<String, Entry>, name: &str) -> Option<Rc<MethodLink>> {
    match table.get(name) {
        Some(Entry::Method(link)) => Some(link.clone()),
        _ => None,
    }
}

/// First segment of a dependent key path
pub fn root_key(path: &str) -> &str {
    path.split('.').next().unwrap_or(path)
}

/// Expand brace groups in a dependent key: `a.{b,c}.d` -> `a.b.d`, `a.c.d`.
/// Nested or unbalanced braces, spaces and empty segments are rejected.
pub fn expand_properties(pattern: &str) -> ObjectResult<Vec<String>> {
    let invalid = || ObjectError::InvalidDependentKey(pattern.to_string());
    if pattern.is_empty() || pattern.contains(char::is_whitespace) {
        return Err(invalid());
    }

    let mut results = vec![String::new()];
    let mut rest = pattern;
    while let Some(open) = rest.find('{') {
        let prefix = &rest[..open];
        if prefix.contains('}') {
            return Err(invalid());
        }
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(invalid)?;
        let body = &after[..close];
        if body.contains('{') {
            return Err(invalid());
        }
        let options: Vec<&str> = body.split(',').collect();
        if options.iter().any(|o| o.is_empty()) {
            return Err(invalid());
        }
        let next: Vec<String> = results
            .iter()
            .flat_map(|r| options.iter().map(move |o| format!("{}{}{}", r, prefix, o)))
            .collect();
        results = next;
        rest = &after[close + 1..];
    }
    if rest.contains('}') {
        return Err(invalid());
    }
    for result in &mut results {
        result.push_str(rest);
    }
    if results.iter().any(|r| r.split('.').any(str::is_empty)) {
        return Err(invalid());
    }
    Ok(results)
}

/// Concatenate `value` onto `base`; scalars become single items, nullish adds nothing
pub(crate) fn concat_values(base: &Value, value: &Value) -> Value {
    let mut items = Vec::new();
    for part in [base, value] {
        match part {
            Value::List(list) => items.extend(list.iter().cloned()),
            Value::Undefined | Value::Null => {}
            other => items.push(other.clone()),
        }
    }
    Value::from(items)
}

/// Shallow-merge map `value` over map `base`; anything else replaces
pub(crate) fn merge_values(base: &Value, value: &Value) -> Value {
    match (base, value) {
        (Value::Map(base), Value::Map(over)) => Value::map(base.merged(over)),
        (Value::Undefined | Value::Null, Value::Map(over)) => Value::map(Properties::clone(over)),
        _ => value.clone(),
    }
}
