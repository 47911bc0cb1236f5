//! Mixins: named, immutable bags of class entries
//!
//! A mixin holds data defaults, methods, computed properties and observer
//! declarations, and may include other mixins. Mixins are built once with
//! [`MixinBuilder`] and never change afterwards; every mixin carries a
//! process-unique [`MixinId`] the composer uses to apply it at most once per
//! class chain.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::class::{Class, SET_UNKNOWN_PROPERTY, UNKNOWN_PROPERTY};
use crate::instance::Instance;
use crate::method::{Call, Method};
use crate::value::Value;
use crate::ObjectResult;

/// Unique identifier for a mixin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MixinId(u64);

impl MixinId {
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        MixinId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Observer callback signature: receiver and the key that changed
pub type ObserverFn = dyn Fn(&Instance, &str) -> ObjectResult<()>;

/// Shared observer callback, compared by identity
#[derive(Clone)]
pub struct ObserverCallback(Rc<ObserverFn>);

impl ObserverCallback {
    /// Wrap a closure
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Instance, &str) -> ObjectResult<()> + 'static,
    {
        ObserverCallback(Rc::new(callback))
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &ObserverCallback) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn invoke(&self, receiver: &Instance, key: &str) -> ObjectResult<()> {
        (self.0)(receiver, key)
    }
}

impl fmt::Debug for ObserverCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObserverCallback({:#x})", self.identity())
    }
}

/// Computed getter signature
pub type ComputedGetter = dyn Fn(&Instance, &str) -> ObjectResult<Value>;

/// Computed setter signature; the returned value is what `set` reports and caches
pub type ComputedSetter = dyn Fn(&Instance, &str, Value) -> ObjectResult<Value>;

/// Getter/setter pair used in place of raw storage for one key
#[derive(Clone)]
pub struct ComputedProperty {
    getter: Rc<ComputedGetter>,
    setter: Option<Rc<ComputedSetter>>,
    dependent_keys: Vec<String>,
    volatile: bool,
    read_only: bool,
}

impl ComputedProperty {
    /// Create a cached computed property
    pub fn new<F>(getter: F) -> Self
    where
        F: Fn(&Instance, &str) -> ObjectResult<Value> + 'static,
    {
        Self {
            getter: Rc::new(getter),
            setter: None,
            dependent_keys: Vec::new(),
            volatile: false,
            read_only: false,
        }
    }

    /// Declare dependent key paths (brace expansion allowed)
    pub fn depends_on<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependent_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Attach a setter
    pub fn with_setter<F>(mut self, setter: F) -> Self
    where
        F: Fn(&Instance, &str, Value) -> ObjectResult<Value> + 'static,
    {
        self.setter = Some(Rc::new(setter));
        self
    }

    /// Never cache: the getter runs on every read
    pub fn volatile(mut self) -> Self {
        self.volatile = true;
        self
    }

    /// Reject writes
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Declared dependent key paths, unexpanded
    pub fn dependent_keys(&self) -> &[String] {
        &self.dependent_keys
    }

    /// Whether reads bypass the cache
    pub fn is_volatile(&self) -> bool {
        self.volatile
    }

    /// Whether writes are rejected
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Whether a setter is attached
    pub fn has_setter(&self) -> bool {
        self.setter.is_some()
    }

    pub(crate) fn compute(&self, receiver: &Instance, key: &str) -> ObjectResult<Value> {
        (self.getter)(receiver, key)
    }

    pub(crate) fn setter(&self) -> Option<&Rc<ComputedSetter>> {
        self.setter.as_ref()
    }
}

impl fmt::Debug for ComputedProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedProperty")
            .field("dependent_keys", &self.dependent_keys)
            .field("volatile", &self.volatile)
            .field("read_only", &self.read_only)
            .field("has_setter", &self.setter.is_some())
            .finish()
    }
}

/// A single mixin entry
#[derive(Clone, Debug)]
pub enum Property {
    /// Data default
    Value(Value),
    /// Method (may call super)
    Method(Method),
    /// Computed property
    Computed(ComputedProperty),
    /// Observer on one or more dependent key paths
    Observer {
        /// Dependent key paths, unexpanded
        paths: Vec<String>,
        /// Callback
        callback: ObserverCallback,
    },
}

struct MixinInner {
    id: MixinId,
    name: Option<String>,
    includes: Vec<Mixin>,
    entries: IndexMap<String, Property>,
    concatenated: Vec<String>,
    merged: Vec<String>,
}

/// Immutable bag of class entries
#[derive(Clone)]
pub struct Mixin(Rc<MixinInner>);

impl Mixin {
    /// Start building a mixin
    pub fn builder() -> MixinBuilder {
        MixinBuilder::default()
    }

    /// Unique id
    pub fn id(&self) -> MixinId {
        self.0.id
    }

    /// Optional display name
    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    /// Directly included mixins
    pub fn includes(&self) -> &[Mixin] {
        &self.0.includes
    }

    /// Own entries in declaration order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Property)> {
        self.0.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Look up an own entry
    pub fn entry(&self, name: &str) -> Option<&Property> {
        self.0.entries.get(name)
    }

    /// Keys this mixin declares as concatenated
    pub fn concatenated_keys(&self) -> &[String] {
        &self.0.concatenated
    }

    /// Keys this mixin declares as merged
    pub fn merged_keys(&self) -> &[String] {
        &self.0.merged
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Mixin) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Flatten into application order: includes depth-first, then self.
    /// Each mixin appears once.
    pub fn flatten(&self) -> Vec<Mixin> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    pub(crate) fn flatten_into(&self, out: &mut Vec<Mixin>) {
        if out.iter().any(|m| m.id() == self.id()) {
            return;
        }
        for include in &self.0.includes {
            include.flatten_into(out);
        }
        out.push(self.clone());
    }

    /// Whether this mixin was applied anywhere in `class`'s chain
    pub fn applies_to(&self, class: &Class) -> bool {
        class.has_mixin(self.id())
    }

    /// Whether this mixin was applied to `instance`'s class
    pub fn detect(&self, instance: &Instance) -> bool {
        self.applies_to(instance.class())
    }
}

impl fmt::Debug for Mixin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mixin")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("entries", &self.0.entries.keys().collect::<Vec<_>>())
            .field("includes", &self.0.includes.len())
            .finish()
    }
}

/// Builder for [`Mixin`]
#[derive(Default)]
pub struct MixinBuilder {
    name: Option<String>,
    includes: Vec<Mixin>,
    entries: IndexMap<String, Property>,
    concatenated: Vec<String>,
    merged: Vec<String>,
}

impl MixinBuilder {
    /// Set the display name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Include another mixin; includes apply before this mixin's own entries
    pub fn include(mut self, mixin: &Mixin) -> Self {
        self.includes.push(mixin.clone());
        self
    }

    /// Add a raw entry
    pub fn property(mut self, name: impl Into<String>, property: Property) -> Self {
        self.entries.insert(name.into(), property);
        self
    }

    /// Add a data default
    pub fn value(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.property(name, Property::Value(value.into()))
    }

    /// Add a method
    pub fn method<F>(self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Call<'_>) -> ObjectResult<Value> + 'static,
    {
        self.property(name, Property::Method(Method::new(body)))
    }

    /// Add a computed property
    pub fn computed(self, name: impl Into<String>, computed: ComputedProperty) -> Self {
        self.property(name, Property::Computed(computed))
    }

    /// Add an observer on dependent key paths
    pub fn observer<I, S, F>(self, name: impl Into<String>, paths: I, callback: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Instance, &str) -> ObjectResult<()> + 'static,
    {
        self.property(
            name,
            Property::Observer {
                paths: paths.into_iter().map(Into::into).collect(),
                callback: ObserverCallback::new(callback),
            },
        )
    }

    /// Declare the fallback invoked for keys nothing else defines
    pub fn unknown_property<F>(self, hook: F) -> Self
    where
        F: Fn(&Instance, &str) -> ObjectResult<Value> + 'static,
    {
        self.method(UNKNOWN_PROPERTY, move |call| {
            let key = key_arg(call);
            hook(call.this(), &key)
        })
    }

    /// Declare the fallback invoked when setting keys nothing else defines
    pub fn set_unknown_property<F>(self, hook: F) -> Self
    where
        F: Fn(&Instance, &str, Value) -> ObjectResult<Value> + 'static,
    {
        self.method(SET_UNKNOWN_PROPERTY, move |call| {
            let key = key_arg(call);
            hook(call.this(), &key, call.arg(1))
        })
    }

    /// Mark a key whose list values concatenate across the chain
    pub fn concatenated(mut self, key: impl Into<String>) -> Self {
        self.concatenated.push(key.into());
        self
    }

    /// Mark a key whose map values shallow-merge across the chain
    pub fn merged(mut self, key: impl Into<String>) -> Self {
        self.merged.push(key.into());
        self
    }

    /// Freeze the mixin
    pub fn build(self) -> Mixin {
        Mixin(Rc::new(MixinInner {
            id: MixinId::next(),
            name: self.name,
            includes: self.includes,
            entries: self.entries,
            concatenated: self.concatenated,
            merged: self.merged,
        }))
    }
}

fn key_arg(call: &Call<'_>) -> String {
    match call.arg(0) {
        Value::String(s) => s.to_string(),
        other => other.to_string(),
    }
}
