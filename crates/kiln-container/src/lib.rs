//! Kiln Container
//!
//! Registration and lookup of objects by `type:name`. The container is the
//! owner handed to every object it instantiates, so those objects can reach
//! back into it through [`kiln_object::get_owner`] and [`Container::from_owner`].
//!
//! Two kinds of registrations exist:
//! - values, returned from `lookup` exactly as registered
//! - factories (classes), created on lookup with the container attached as
//!   owner and cached when registered as singletons
//!
//! # Example
//!
//! ```rust,ignore
//! use kiln_container::{Container, Registration, RegisterOptions};
//!
//! let container = Container::new();
//! container.register("service:store", Registration::Factory(store_class), RegisterOptions::default())?;
//! let store = container.lookup("service:store")?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use kiln_object::{Class, Instance, ObjectError, Owner, Properties, Value};
use rustc_hash::FxHashMap;

/// Container errors
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// Name is not of the form `type:name`
    #[error("invalid registration name `{0}`: expected `type:name`")]
    InvalidName(String),

    /// Name is already taken
    #[error("`{0}` is already registered")]
    AlreadyRegistered(String),

    /// Options that make no sense for the registration
    #[error("invalid options for `{name}`: {reason}")]
    InvalidOptions {
        /// Registration name
        name: String,
        /// What is wrong with them
        reason: String,
    },

    /// Instantiating a factory failed
    #[error(transparent)]
    Object(#[from] ObjectError),
}

/// Container result
pub type ContainerResult<T> = Result<T, ContainerError>;

/// What a name resolves to
#[derive(Debug, Clone)]
pub enum Registration {
    /// A ready value, returned as-is
    Value(Value),
    /// A class instantiated on lookup
    Factory(Class),
}

impl From<Instance> for Registration {
    fn from(instance: Instance) -> Self {
        Registration::Value(Value::Object(instance))
    }
}

impl From<Class> for Registration {
    fn from(class: Class) -> Self {
        Registration::Factory(class)
    }
}

/// Registration options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterOptions {
    /// Create factories on lookup (default: true). Must be false for values.
    pub instantiate: bool,
    /// Cache the created instance (default: true)
    pub singleton: bool,
}

impl Default for RegisterOptions {
    fn default() -> Self {
        Self {
            instantiate: true,
            singleton: true,
        }
    }
}

impl RegisterOptions {
    /// Options for a value returned as-is
    pub fn value() -> Self {
        Self {
            instantiate: false,
            singleton: true,
        }
    }

    /// Options for a factory creating a fresh instance per lookup
    pub fn transient() -> Self {
        Self {
            instantiate: true,
            singleton: false,
        }
    }
}

struct Entry {
    registration: Registration,
    options: RegisterOptions,
}

struct ContainerInner {
    registrations: RefCell<FxHashMap<String, Entry>>,
    cache: RefCell<FxHashMap<String, Value>>,
    /// Built once so every instance this container creates shares one owner
    owner: Owner,
}

/// Non-owning back reference stored inside an [`Owner`]
struct ContainerRef(Weak<ContainerInner>);

/// Shared handle to a container
#[derive(Clone)]
pub struct Container(Rc<ContainerInner>);

impl Container {
    /// Create an empty container
    pub fn new() -> Self {
        Container(Rc::new_cyclic(|inner| ContainerInner {
            registrations: RefCell::new(FxHashMap::default()),
            cache: RefCell::new(FxHashMap::default()),
            owner: Owner::new(ContainerRef(inner.clone())),
        }))
    }

    /// Register `registration` under `name`
    pub fn register(
        &self,
        name: &str,
        registration: impl Into<Registration>,
        options: RegisterOptions,
    ) -> ContainerResult<()> {
        validate_name(name)?;
        let registration = registration.into();
        if let Registration::Value(_) = &registration {
            if options.instantiate {
                return Err(ContainerError::InvalidOptions {
                    name: name.to_string(),
                    reason: "values cannot be instantiated; register with `instantiate: false`"
                        .to_string(),
                });
            }
        }

        let mut registrations = self.0.registrations.borrow_mut();
        if registrations.contains_key(name) {
            return Err(ContainerError::AlreadyRegistered(name.to_string()));
        }
        tracing::debug!(
            name,
            factory = matches!(registration, Registration::Factory(_)),
            instantiate = options.instantiate,
            singleton = options.singleton,
            "registered"
        );
        registrations.insert(name.to_string(), Entry { registration, options });
        Ok(())
    }

    /// Remove a registration and anything cached for it
    pub fn unregister(&self, name: &str) -> bool {
        self.0.cache.borrow_mut().remove(name);
        self.0.registrations.borrow_mut().remove(name).is_some()
    }

    /// Whether `name` is registered
    pub fn has_registration(&self, name: &str) -> bool {
        self.0.registrations.borrow().contains_key(name)
    }

    /// Class registered under `name`, if it is a factory
    pub fn factory_for(&self, name: &str) -> Option<Class> {
        match self.0.registrations.borrow().get(name) {
            Some(Entry {
                registration: Registration::Factory(class),
                ..
            }) => Some(class.clone()),
            _ => None,
        }
    }

    /// Resolve `name`. Unregistered names resolve to `None`.
    pub fn lookup(&self, name: &str) -> ContainerResult<Option<Value>> {
        validate_name(name)?;
        if let Some(cached) = self.0.cache.borrow().get(name) {
            return Ok(Some(cached.clone()));
        }

        let (registration, options) = match self.0.registrations.borrow().get(name) {
            Some(entry) => (entry.registration.clone(), entry.options),
            None => return Ok(None),
        };

        let value = match registration {
            Registration::Value(value) => value,
            Registration::Factory(class) if options.instantiate => {
                let props = Properties::new().with_owner(self.owner());
                Value::Object(class.create_with(props)?)
            }
            Registration::Factory(_) => {
                return Err(ContainerError::InvalidOptions {
                    name: name.to_string(),
                    reason: "factory registered with `instantiate: false`; use `factory_for`"
                        .to_string(),
                })
            }
        };

        if options.singleton {
            self.0
                .cache
                .borrow_mut()
                .insert(name.to_string(), value.clone());
        }
        Ok(Some(value))
    }

    /// The owner token attached to everything this container creates. It
    /// points back at the container without keeping it alive, and every call
    /// returns the same token.
    pub fn owner(&self) -> Owner {
        self.0.owner.clone()
    }

    /// Recover the container behind an owner token, if it is still alive
    pub fn from_owner(owner: &Owner) -> Option<Container> {
        owner
            .downcast_ref::<ContainerRef>()
            .and_then(|handle| handle.0.upgrade())
            .map(Container)
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Container) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("registrations", &self.0.registrations.borrow().len())
            .field("cached", &self.0.cache.borrow().len())
            .finish()
    }
}

fn validate_name(name: &str) -> ContainerResult<()> {
    match name.split_once(':') {
        Some((kind, rest)) if !kind.is_empty() && !rest.is_empty() && !rest.contains(':') => Ok(()),
        _ => Err(ContainerError::InvalidName(name.to_string())),
    }
}
