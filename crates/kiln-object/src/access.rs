//! Uniform property access
//!
//! Every read and write of an instance property goes through [`get`] and
//! [`set`]. Reads resolve in a fixed order: own storage, then the class entry
//! (data default, computed getter, method), then the `unknownProperty`
//! fallback. The fallback is consulted the same way for every key and every
//! caller; nothing about the key's shape or the call site is special-cased.

use crate::class::INIT;
use crate::compose::Entry;
use crate::instance::Instance;
use crate::mixin::ComputedProperty;
use crate::observer;
use crate::properties::Properties;
use crate::value::Value;
use crate::{ObjectError, ObjectResult};

/// Read `key`
pub fn get(instance: &Instance, key: &str) -> ObjectResult<Value> {
    if let Some(value) = instance.read_own(key) {
        return Ok(value);
    }

    let class = instance.class();
    match class.entry(key) {
        Some(Entry::Data(value)) => Ok(value.clone()),
        Some(Entry::Computed(computed)) => {
            let computed = computed.clone();
            read_computed(instance, key, &computed)
        }
        Some(Entry::Method(link)) => Ok(Value::Method(link.body().clone())),
        Some(Entry::Observer(_)) => Ok(Value::Undefined),
        None => match &class.index().unknown_property {
            Some(hook) => {
                let hook = hook.clone();
                hook.invoke(instance, &[Value::string(key)])
            }
            None => Ok(Value::Undefined),
        },
    }
}

fn read_computed(instance: &Instance, key: &str, computed: &ComputedProperty) -> ObjectResult<Value> {
    if computed.is_volatile() {
        return computed.compute(instance, key);
    }

    let cached = instance.meta().computed_cache.get(key).cloned();
    if let Some(value) = cached {
        return Ok(value);
    }

    let value = computed.compute(instance, key)?;
    instance
        .meta_mut()
        .computed_cache
        .insert(key.to_string(), value.clone());
    Ok(value)
}

/// Write `key`, then notify observers. Returns the value actually stored.
pub fn set(instance: &Instance, key: &str, value: Value) -> ObjectResult<Value> {
    let class = instance.class();
    let stored = match class.entry(key) {
        Some(Entry::Computed(computed)) => {
            let computed = computed.clone();
            write_computed(instance, key, &computed, value)?
        }
        Some(Entry::Method(_)) if key == INIT => {
            return Err(ObjectError::ReservedKey { key: key.to_string() });
        }
        None if !instance.has_own_property(key) => match &class.index().set_unknown_property {
            Some(hook) => {
                let hook = hook.clone();
                return hook.invoke(instance, &[Value::string(key), value]);
            }
            None => {
                instance.write_own(key, value.clone());
                value
            }
        },
        _ => {
            instance.write_own(key, value.clone());
            value
        }
    };

    observer::notify(instance, key)?;
    Ok(stored)
}

fn write_computed(
    instance: &Instance,
    key: &str,
    computed: &ComputedProperty,
    value: Value,
) -> ObjectResult<Value> {
    if computed.is_read_only() {
        return Err(ObjectError::ReadOnly { key: key.to_string() });
    }

    match computed.setter() {
        Some(setter) => {
            let setter = setter.clone();
            let result = setter(instance, key, value)?;
            if !computed.is_volatile() {
                instance
                    .meta_mut()
                    .computed_cache
                    .insert(key.to_string(), result.clone());
            }
            Ok(result)
        }
        None => {
            // The assigned value shadows the getter from now on
            instance.meta_mut().computed_cache.remove(key);
            instance.write_own(key, value.clone());
            Ok(value)
        }
    }
}

/// Follow a dotted path through objects and maps. Stops at the first nullish
/// or non-container segment with `Undefined`.
pub fn get_path(instance: &Instance, path: &str) -> ObjectResult<Value> {
    let mut segments = path.split('.');
    let first = segments.next().unwrap_or(path);
    let mut current = get(instance, first)?;

    for segment in segments {
        current = match &current {
            Value::Object(object) => get(object, segment)?,
            Value::Map(map) => map.get(segment).cloned().unwrap_or_default(),
            _ => return Ok(Value::Undefined),
        };
    }
    Ok(current)
}

/// Read several keys at once
pub fn get_properties<I, S>(instance: &Instance, keys: I) -> ObjectResult<Properties>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = Properties::new();
    for key in keys {
        let key = key.as_ref();
        out.insert(key, get(instance, key)?);
    }
    Ok(out)
}

/// Write several keys in one change batch; observers fire once per key at the end
pub fn set_properties(instance: &Instance, props: Properties) -> ObjectResult<()> {
    observer::change_properties(instance, || {
        for (key, value) in props {
            set(instance, &key, value)?;
        }
        Ok(())
    })
}

/// Own enumerable keys in assignment order
pub fn keys(instance: &Instance) -> Vec<String> {
    instance.own_keys()
}
