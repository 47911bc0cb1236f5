//! Observer notification engine
//!
//! Delivery is synchronous: `set` returns only after every affected observer
//! ran. On every `notify` the class's dependent-key graph is walked from the
//! mutated key (each key visited once, so cycles terminate) and the cached
//! values of the computed keys reached are dropped right away, batch or not.
//! Only observer calls wait for the end of a change batch. A delivery pass
//! then calls each distinct (registration key, callback) pair watching a
//! dirty key exactly once, class observers first, then per-instance ones.
//!
//! A pair whose callback is still running further up the stack is skipped,
//! which breaks notification cycles without raising.

use std::collections::VecDeque;

use indexmap::IndexSet;
use rustc_hash::FxHashSet;

use crate::compose::{expand_properties, root_key};
use crate::instance::Instance;
use crate::meta::ObserverRegistration;
use crate::mixin::ObserverCallback;
use crate::ObjectResult;

/// Register `callback` on `path` for this instance only. Brace groups in the
/// path are expanded; the registration key stays the path as written.
pub fn add_observer(instance: &Instance, path: &str, callback: ObserverCallback) -> ObjectResult<()> {
    let expanded = expand_properties(path)?;
    let mut meta = instance.meta_mut();
    for key in expanded {
        meta.observers.push(ObserverRegistration {
            key: path.to_string(),
            root: root_key(&key).to_string(),
            callback: callback.clone(),
        });
    }
    Ok(())
}

/// Remove every registration of `callback` under `path`. Returns whether any
/// registration was removed.
pub fn remove_observer(instance: &Instance, path: &str, callback: &ObserverCallback) -> bool {
    let mut meta = instance.meta_mut();
    let before = meta.observers.len();
    meta.observers
        .retain(|registration| !(registration.key == path && registration.callback.ptr_eq(callback)));
    meta.observers.len() != before
}

/// Announce that `key` changed. Inside a change batch the key is queued and
/// delivered when the outermost batch ends.
pub fn notify(instance: &Instance, key: &str) -> ObjectResult<()> {
    invalidate_dependents(instance, key);
    {
        let mut meta = instance.meta_mut();
        if meta.change_depth > 0 {
            meta.pending.insert(key.to_string());
            return Ok(());
        }
    }
    deliver(instance, &[key.to_string()])
}

/// Open a change batch
pub fn begin_property_changes(instance: &Instance) {
    instance.meta_mut().change_depth += 1;
}

/// Close a change batch; closing the outermost one flushes queued keys
pub fn end_property_changes(instance: &Instance) -> ObjectResult<()> {
    let pending = {
        let mut meta = instance.meta_mut();
        meta.change_depth = meta.change_depth.saturating_sub(1);
        if meta.change_depth > 0 || meta.pending.is_empty() {
            return Ok(());
        }
        std::mem::take(&mut meta.pending)
    };
    let keys: Vec<String> = pending.into_iter().collect();
    deliver(instance, &keys)
}

/// Run `f` inside a change batch. The batch is closed even when `f` fails;
/// the error from `f` takes precedence.
pub fn change_properties<T, F>(instance: &Instance, f: F) -> ObjectResult<T>
where
    F: FnOnce() -> ObjectResult<T>,
{
    begin_property_changes(instance);
    let result = f();
    let flushed = end_property_changes(instance);
    let value = result?;
    flushed?;
    Ok(value)
}

/// Keys affected by a change to `changed`, the changed keys first
fn dirty_keys(instance: &Instance, changed: &[String]) -> IndexSet<String> {
    let dependents = &instance.class().index().dependents;
    let mut dirty: IndexSet<String> = changed.iter().cloned().collect();
    let mut queue: VecDeque<String> = changed.iter().cloned().collect();

    while let Some(key) = queue.pop_front() {
        if let Some(next) = dependents.get(root_key(&key)) {
            for dependent in next {
                if dirty.insert(dependent.clone()) {
                    queue.push_back(dependent.clone());
                }
            }
        }
    }
    dirty
}

/// Drop cached values of every computed key reachable from `key`
fn invalidate_dependents(instance: &Instance, key: &str) {
    let dirty = dirty_keys(instance, &[key.to_string()]);
    let mut meta = instance.meta_mut();
    for dependent in dirty.iter().skip(1) {
        meta.computed_cache.remove(dependent);
    }
}

struct Delivery {
    registration: String,
    trigger: String,
    callback: ObserverCallback,
}

fn deliver(instance: &Instance, changed: &[String]) -> ObjectResult<()> {
    let dirty = dirty_keys(instance, changed);
    let index = instance.class().index();
    let registrations = instance.meta().observers.clone();
    let mut seen: FxHashSet<(String, usize)> = FxHashSet::default();
    let mut deliveries = Vec::new();

    for key in &dirty {
        let root = root_key(key);
        let class_observers = index.observers.get(root).into_iter().flatten();
        let class_pairs = class_observers.map(|entry| (&entry.name, &entry.callback));
        let instance_pairs = registrations
            .iter()
            .filter(|registration| registration.root == root)
            .map(|registration| (&registration.key, &registration.callback));

        for (registration, callback) in class_pairs.chain(instance_pairs) {
            if seen.insert((registration.clone(), callback.identity())) {
                deliveries.push(Delivery {
                    registration: registration.clone(),
                    trigger: key.clone(),
                    callback: callback.clone(),
                });
            }
        }
    }

    tracing::trace!(
        keys = ?changed,
        dirty = dirty.len(),
        observers = deliveries.len(),
        "delivering notifications"
    );

    for delivery in deliveries {
        let pair = (delivery.registration, delivery.callback.identity());
        if !instance.meta_mut().in_flight.insert(pair.clone()) {
            tracing::debug!(
                observer = %pair.0,
                key = %delivery.trigger,
                "observer already running, breaking cycle"
            );
            continue;
        }
        let result = delivery.callback.invoke(instance, &delivery.trigger);
        instance.meta_mut().in_flight.remove(&pair);
        result?;
    }
    Ok(())
}
