//! Class definitions and the creation protocol
//!
//! A [`Class`] is a shared handle to an immutable [`ClassDefinition`]. New
//! classes only come from [`Class::extend`]; instances only come from
//! [`Class::create`] / [`Class::create_with`]. Creation runs in a fixed order:
//!
//! 1. allocate storage and meta
//! 2. move the owner out of the property hash into meta
//! 3. run the `constructor` chain (owner readable, no properties yet)
//! 4. apply each hash entry through [`access::set`]
//! 5. run the `init` chain, which must reach the root `init`
//!
//! [`Class::allocate`] is the raw allocator. Handing it positional arguments is
//! rejected, since those would be silently dropped.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::access;
use crate::compose::{build_index, compose, concat_values, merge_values, ClassIndex, Composition, Entry};
use crate::config::{InitialObserverDelivery, ObjectModelConfig};
use crate::instance::Instance;
use crate::method::{Method, MethodLink};
use crate::mixin::{Mixin, MixinId};
use crate::observer;
use crate::owner::Owner;
use crate::properties::Properties;
use crate::value::Value;
use crate::{ObjectError, ObjectResult};

/// Lifecycle hook run after the property hash is applied
pub const INIT: &str = "init";

/// Lifecycle hook run after the owner is attached, before the property hash
pub const CONSTRUCTOR: &str = "constructor";

/// String conversion hook
pub const TO_STRING: &str = "toString";

/// Fallback hook for reads of undefined keys
pub const UNKNOWN_PROPERTY: &str = "unknownProperty";

/// Fallback hook for writes of undefined keys
pub const SET_UNKNOWN_PROPERTY: &str = "setUnknownProperty";

const ROOT_NAME: &str = "CoreObject";

thread_local! {
    static CORE_OBJECT: Class = Class::root(ObjectModelConfig::default());
}

/// Unique identifier for a class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(u64);

impl ClassId {
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        ClassId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Immutable composed class
pub struct ClassDefinition {
    id: ClassId,
    name: Option<String>,
    parent: Option<Class>,
    composition: Composition,
    index: ClassIndex,
    config: Rc<ObjectModelConfig>,
}

/// Shared handle to a class definition
#[derive(Clone)]
pub struct Class(Rc<ClassDefinition>);

impl Class {
    /// The per-thread root class with default configuration
    pub fn core_object() -> Class {
        CORE_OBJECT.with(Class::clone)
    }

    /// Create a new root class carrying `config`; subclasses inherit it
    pub fn root(config: ObjectModelConfig) -> Class {
        let mut table = IndexMap::new();
        let root_methods = [
            (CONSTRUCTOR, Method::new(|_| Ok(Value::Undefined))),
            (
                INIT,
                Method::new(|call| {
                    call.this().meta_mut().root_init_ran = true;
                    Ok(Value::Undefined)
                }),
            ),
            (
                TO_STRING,
                Method::new(|call| Ok(Value::from(call.this().default_description()))),
            ),
        ];
        for (name, body) in root_methods {
            table.insert(name.to_string(), Entry::Method(MethodLink::new(name, body, None)));
        }

        Class(Rc::new(ClassDefinition {
            id: ClassId::next(),
            name: Some(ROOT_NAME.to_string()),
            parent: None,
            composition: Composition {
                table,
                ..Composition::default()
            },
            index: ClassIndex::default(),
            config: Rc::new(config),
        }))
    }

    /// Compose an anonymous subclass
    pub fn extend<I>(&self, mixins: I) -> ObjectResult<Class>
    where
        I: IntoIterator<Item = Mixin>,
    {
        self.derive(None, mixins.into_iter().collect())
    }

    /// Compose a named subclass
    pub fn extend_named<I>(&self, name: impl Into<String>, mixins: I) -> ObjectResult<Class>
    where
        I: IntoIterator<Item = Mixin>,
    {
        self.derive(Some(name.into()), mixins.into_iter().collect())
    }

    fn derive(&self, name: Option<String>, mixins: Vec<Mixin>) -> ObjectResult<Class> {
        let composition = compose(Some(&self.0.composition), &mixins)?;
        let index = build_index(&composition.table)?;
        let class = Class(Rc::new(ClassDefinition {
            id: ClassId::next(),
            name,
            parent: Some(self.clone()),
            composition,
            index,
            config: self.0.config.clone(),
        }));
        tracing::debug!(
            class = %class.display_name(),
            mixins = mixins.len(),
            entries = class.0.composition.table.len(),
            "composed class"
        );
        Ok(class)
    }

    /// Create an instance with no initial properties
    pub fn create(&self) -> ObjectResult<Instance> {
        self.create_with(Properties::new())
    }

    /// Create an instance from an initial property hash
    pub fn create_with(&self, props: Properties) -> ObjectResult<Instance> {
        let instance = self.instantiate(props.owner_slot().cloned())?;

        if self.0.config.initial_observers == InitialObserverDelivery::Coalesced {
            observer::change_properties(&instance, || self.apply_initial(&instance, props))?;
        } else {
            self.apply_initial(&instance, props)?;
        }

        if let Some(Entry::Method(init)) = self.entry(INIT) {
            let init = init.clone();
            init.invoke(&instance, &[])?;
            if self.0.config.require_init_super && !instance.meta().root_init_ran {
                return Err(ObjectError::InitSuperNotCalled {
                    class: self.display_name().to_string(),
                });
            }
        }

        instance.meta_mut().initializing = false;
        tracing::debug!(class = %self.display_name(), guid = %instance.guid(), "created instance");
        Ok(instance)
    }

    /// Raw allocation. Positional arguments are rejected; use `create`.
    /// With no arguments the bare allocation is returned: no owner, no
    /// properties, `init` not run.
    pub fn allocate(&self, args: &[Value]) -> ObjectResult<Instance> {
        if !args.is_empty() {
            return Err(ObjectError::InvalidConstruction {
                class: self.display_name().to_string(),
                arg_count: args.len(),
            });
        }
        self.instantiate(None)
    }

    fn instantiate(&self, owner: Option<Owner>) -> ObjectResult<Instance> {
        let instance = Instance::alloc(self.clone());
        if let Some(owner) = owner {
            instance.meta_mut().owner = Some(owner);
        }
        if let Some(Entry::Method(constructor)) = self.entry(CONSTRUCTOR) {
            let constructor = constructor.clone();
            constructor.invoke(&instance, &[])?;
        }
        Ok(instance)
    }

    fn apply_initial(&self, instance: &Instance, props: Properties) -> ObjectResult<()> {
        for (key, value) in props {
            let value = if self.0.composition.concatenated.contains(&key) {
                concat_values(&self.default_value(&key), &value)
            } else if self.0.composition.merged.contains(&key) {
                merge_values(&self.default_value(&key), &value)
            } else {
                value
            };
            access::set(instance, &key, value)?;
        }
        Ok(())
    }

    fn default_value(&self, key: &str) -> Value {
        match self.entry(key) {
            Some(Entry::Data(value)) => value.clone(),
            _ => Value::Undefined,
        }
    }

    /// Unique id
    pub fn id(&self) -> ClassId {
        self.0.id
    }

    /// Declared name
    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    /// Declared name, or `(unknown)`
    pub fn display_name(&self) -> &str {
        self.name().unwrap_or("(unknown)")
    }

    /// Parent class
    pub fn superclass(&self) -> Option<&Class> {
        self.0.parent.as_ref()
    }

    /// Configuration inherited from the root
    pub fn config(&self) -> &ObjectModelConfig {
        &self.0.config
    }

    /// Resolved entry for `name`
    pub fn entry(&self, name: &str) -> Option<&Entry> {
        self.0.composition.table.get(name)
    }

    /// Resolved entry names in table order
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.0.composition.table.keys().map(String::as_str)
    }

    /// Mixins applied anywhere in the chain, in application order
    pub fn applied_mixins(&self) -> &[MixinId] {
        &self.0.composition.applied
    }

    /// Whether `mixin` was applied anywhere in the chain
    pub fn has_mixin(&self, mixin: MixinId) -> bool {
        self.0.composition.applied.contains(&mixin)
    }

    /// Whether `init` is overridden below the root
    pub fn is_init_overridden(&self) -> bool {
        self.0.index.init_overridden
    }

    /// Whether reads of undefined keys go to a fallback hook
    pub fn has_unknown_property(&self) -> bool {
        self.0.index.unknown_property.is_some()
    }

    /// Whether `other` is this class or one of its subclasses
    pub fn detect(&self, other: &Class) -> bool {
        let mut current = Some(other);
        while let Some(class) = current {
            if class.ptr_eq(self) {
                return true;
            }
            current = class.superclass();
        }
        false
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Class) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn index(&self) -> &ClassIndex {
        &self.0.index
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("entries", &self.0.composition.table.len())
            .field("mixins", &self.0.composition.applied.len())
            .finish()
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_core_object_is_shared() {
        let a = Class::core_object();
        let b = Class::core_object();
        assert!(a.ptr_eq(&b));
        assert_eq!(a.name(), Some("CoreObject"));
        assert!(a.superclass().is_none());
        assert!(!a.is_init_overridden());
    }

    #[test]
    fn test_extend_links_parent() {
        let base = Class::core_object();
        let child = base.extend_named("Child", [Mixin::builder().value("x", 1).build()]).unwrap();
        let grandchild = child.extend([]).unwrap();

        assert!(base.detect(&grandchild));
        assert!(child.detect(&grandchild));
        assert!(!grandchild.detect(&child));
        assert_eq!(grandchild.display_name(), "(unknown)");
        assert!(grandchild.entry("x").is_some());
    }

    #[test]
    fn test_allocate_rejects_arguments() {
        let class = Class::core_object();
        let err = class.allocate(&[Value::map(Properties::new().with("firstName", "Stef"))]).unwrap_err();
        assert!(err.to_string().contains("instead of `.create()`"));

        let bare = class.allocate(&[]).unwrap();
        assert!(bare.own_keys().is_empty());
        assert!(bare.is_initializing());
    }

    #[test]
    fn test_lifecycle_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (c_log, i_log) = (log.clone(), log.clone());
        let class = Class::core_object()
            .extend([Mixin::builder()
                .method(CONSTRUCTOR, move |call| {
                    call.super_forward()?;
                    let seen = access::get(call.this(), "name")?;
                    c_log.borrow_mut().push(format!("constructor:{}", seen));
                    Ok(Value::Undefined)
                })
                .method(INIT, move |call| {
                    call.super_forward()?;
                    let seen = access::get(call.this(), "name")?;
                    i_log.borrow_mut().push(format!("init:{}", seen));
                    Ok(Value::Undefined)
                })
                .build()])
            .unwrap();

        assert!(class.is_init_overridden());
        let obj = class.create_with(Properties::new().with("name", "kiln")).unwrap();
        assert_eq!(*log.borrow(), vec!["constructor:undefined", "init:kiln"]);
        assert!(!obj.is_initializing());
    }

    #[test]
    fn test_init_without_super_fails() {
        let class = Class::core_object()
            .extend_named("Lazy", [Mixin::builder().method(INIT, |_| Ok(Value::Undefined)).build()])
            .unwrap();
        assert!(matches!(
            class.create(),
            Err(ObjectError::InitSuperNotCalled { ref class }) if class == "Lazy"
        ));

        let relaxed = Class::root(ObjectModelConfig {
            require_init_super: false,
            ..ObjectModelConfig::default()
        })
        .extend([Mixin::builder().method(INIT, |_| Ok(Value::Undefined)).build()])
        .unwrap();
        assert!(relaxed.create().is_ok());
    }
}
