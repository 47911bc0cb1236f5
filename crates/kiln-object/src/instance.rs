//! Live object instances
//!
//! An [`Instance`] is a cheap, shared handle. Its backing storage holds only
//! keys that were explicitly assigned, in assignment order, so the own-key
//! listing is exactly what `create` and `set` wrote. Class defaults, methods
//! and meta never appear there.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::class::{Class, TO_STRING};
use crate::compose::Entry;
use crate::meta::Meta;
use crate::value::Value;
use crate::{ObjectError, ObjectResult};

/// Unique identifier for an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(u64);

impl InstanceId {
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        InstanceId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

struct InstanceInner {
    id: InstanceId,
    class: Class,
    storage: RefCell<IndexMap<String, Value>>,
    meta: RefCell<Meta>,
}

/// Shared handle to a live object
#[derive(Clone)]
pub struct Instance(Rc<InstanceInner>);

impl Instance {
    pub(crate) fn alloc(class: Class) -> Self {
        Instance(Rc::new(InstanceInner {
            id: InstanceId::next(),
            class,
            storage: RefCell::new(IndexMap::new()),
            meta: RefCell::new(Meta::new()),
        }))
    }

    /// Unique id
    pub fn id(&self) -> InstanceId {
        self.0.id
    }

    /// Guid string: configured prefix followed by the id
    pub fn guid(&self) -> String {
        format!("{}{}", self.0.class.config().guid_prefix, self.0.id.as_u64())
    }

    /// The class this instance was created from
    pub fn class(&self) -> &Class {
        &self.0.class
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Own enumerable keys in assignment order
    pub fn own_keys(&self) -> Vec<String> {
        self.0.storage.borrow().keys().cloned().collect()
    }

    /// Whether `key` was explicitly assigned
    pub fn has_own_property(&self, key: &str) -> bool {
        self.0.storage.borrow().contains_key(key)
    }

    pub(crate) fn read_own(&self, key: &str) -> Option<Value> {
        self.0.storage.borrow().get(key).cloned()
    }

    pub(crate) fn write_own(&self, key: &str, value: Value) {
        let mut storage = self.0.storage.borrow_mut();
        match storage.get_mut(key) {
            Some(slot) => *slot = value,
            None => {
                storage.insert(key.to_string(), value);
            }
        }
    }

    pub(crate) fn meta(&self) -> Ref<'_, Meta> {
        self.0.meta.borrow()
    }

    pub(crate) fn meta_mut(&self) -> RefMut<'_, Meta> {
        self.0.meta.borrow_mut()
    }

    /// Whether creation has not finished yet
    pub fn is_initializing(&self) -> bool {
        self.meta().initializing
    }

    /// Whether a computed value is cached for `key`
    pub fn is_cached(&self, key: &str) -> bool {
        self.meta().computed_cache.contains_key(key)
    }

    /// Number of per-instance observer registrations (expanded paths)
    pub fn observer_count(&self) -> usize {
        self.meta().observers.len()
    }

    /// Whether a change batch is open
    pub fn in_change_batch(&self) -> bool {
        self.meta().change_depth > 0
    }

    /// Whether this instance's class is `class` or a subclass of it
    pub fn is_instance_of(&self, class: &Class) -> bool {
        class.detect(&self.0.class)
    }

    /// Whether `send(name)` would find a method
    pub fn responds_to(&self, name: &str) -> bool {
        matches!(self.read_own(name), Some(Value::Method(_)))
            || matches!(self.0.class.entry(name), Some(Entry::Method(_)))
    }

    /// Invoke a method. An own `Method` value shadows the class chain.
    pub fn send(&self, name: &str, args: &[Value]) -> ObjectResult<Value> {
        if let Some(Value::Method(method)) = self.read_own(name) {
            return method.call(self, args);
        }
        match self.0.class.entry(name) {
            Some(Entry::Method(link)) => {
                let link = link.clone();
                link.invoke(self, args)
            }
            _ => Err(ObjectError::NoSuchMethod {
                class: self.0.class.display_name().to_string(),
                name: name.to_string(),
            }),
        }
    }

    /// `<ClassName:guid>`, built on first request and kept in meta
    pub fn default_description(&self) -> String {
        if let Some(description) = &self.meta().description {
            return description.to_string();
        }
        let description: Rc<str> =
            Rc::from(format!("<{}:{}>", self.0.class.display_name(), self.guid()));
        self.meta_mut().description = Some(description.clone());
        description.to_string()
    }

    /// Resolve the `toString` hook, propagating errors raised by an override.
    /// A hook returning an object yields the default description.
    pub fn try_describe(&self) -> ObjectResult<String> {
        Ok(match self.send(TO_STRING, &[])? {
            Value::String(s) => s.to_string(),
            Value::Object(_) => self.default_description(),
            other => other.to_string(),
        })
    }

    /// Infallible [`try_describe`](Self::try_describe) used by `Display`.
    /// A failing `toString` hook is logged and replaced by the default
    /// description.
    pub fn describe(&self) -> String {
        self.try_describe().unwrap_or_else(|err| {
            tracing::debug!(class = %self.0.class.display_name(), %err, "toString failed");
            self.default_description()
        })
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.0.class.display_name())
            .field("id", &self.0.id.as_u64())
            .field("keys", &self.own_keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixin::{ComputedProperty, Mixin, ObserverCallback};
    use crate::properties::Properties;

    #[test]
    fn test_own_keys_follow_assignment_order() {
        let obj = Class::core_object()
            .create_with(Properties::new().with("b", 1).with("a", 2))
            .unwrap();
        assert_eq!(obj.own_keys(), vec!["b", "a"]);
        assert!(obj.has_own_property("a"));
        assert!(!obj.has_own_property(TO_STRING));
    }

    #[test]
    fn test_to_string_is_not_materialized() {
        let obj = Class::core_object()
            .create_with(Properties::new().with("firstName", "Foo").with("lastName", "Bar"))
            .unwrap();

        let first = obj.to_string();
        let second = obj.describe();
        assert_eq!(first, second);
        assert!(first.starts_with("<CoreObject:kiln"));
        assert!(!obj.has_own_property(TO_STRING));
        assert_eq!(obj.own_keys(), vec!["firstName", "lastName"]);
    }

    #[test]
    fn test_to_string_override() {
        let class = Class::core_object()
            .extend_named(
                "Named",
                [Mixin::builder()
                    .method(TO_STRING, |call| {
                        let base = call.super_forward()?;
                        Ok(Value::string(format!("{} (custom)", base)))
                    })
                    .build()],
            )
            .unwrap();
        let obj = class.create().unwrap();
        assert_eq!(obj.to_string(), format!("<Named:{}> (custom)", obj.guid()));
    }

    #[test]
    fn test_failing_to_string_falls_back() {
        let class = Class::core_object()
            .extend_named(
                "Broken",
                [Mixin::builder()
                    .method(TO_STRING, |_| Err(ObjectError::callback("no description")))
                    .build()],
            )
            .unwrap();
        let obj = class.create().unwrap();

        assert!(matches!(
            obj.try_describe(),
            Err(ObjectError::Callback(ref message)) if message == "no description"
        ));
        assert_eq!(obj.describe(), format!("<Broken:{}>", obj.guid()));
        assert_eq!(obj.to_string(), obj.default_description());
    }

    #[test]
    fn test_state_accessors() {
        let class = Class::core_object()
            .extend([Mixin::builder()
                .value("firstName", "Tom")
                .computed(
                    "shout",
                    ComputedProperty::new(|this, _| {
                        Ok(Value::string(format!("{}!", crate::access::get(this, "firstName")?)))
                    })
                    .depends_on(["firstName"]),
                )
                .build()])
            .unwrap();
        let obj = class.create().unwrap();
        assert!(!obj.is_cached("shout"));
        assert_eq!(obj.observer_count(), 0);

        crate::access::get(&obj, "shout").unwrap();
        assert!(obj.is_cached("shout"));

        crate::observer::add_observer(&obj, "{firstName,shout}", ObserverCallback::new(|_, _| Ok(())))
            .unwrap();
        assert_eq!(obj.observer_count(), 2);

        crate::observer::change_properties(&obj, || {
            assert!(obj.in_change_batch());
            crate::access::set(&obj, "firstName", Value::from("Yehuda"))?;
            assert!(!obj.is_cached("shout"));
            Ok(())
        })
        .unwrap();
        assert!(!obj.in_change_batch());
    }

    #[test]
    fn test_send_unknown_method() {
        let obj = Class::core_object().create().unwrap();
        assert!(matches!(
            obj.send("fly", &[]),
            Err(ObjectError::NoSuchMethod { ref name, .. }) if name == "fly"
        ));
        assert!(obj.responds_to(TO_STRING));
        assert!(!obj.responds_to("fly"));
    }

    #[test]
    fn test_instance_of() {
        let parent = Class::core_object().extend([]).unwrap();
        let child = parent.extend([]).unwrap();
        let obj = child.create().unwrap();

        assert!(obj.is_instance_of(&parent));
        assert!(obj.is_instance_of(&Class::core_object()));
        assert!(!parent.create().unwrap().is_instance_of(&child));
    }
}
