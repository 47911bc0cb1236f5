//! Kiln Object Model
//!
//! This crate provides the base object model for class/mixin based components:
//! - Mixins and the composer that folds them into immutable class definitions
//! - The class factory (`extend` / `create`) and its initialization protocol
//! - Uniform property access with computed properties and fallback hooks
//! - Synchronous observers with dependent keys and change batching
//! - Owner attachment primitives for external lookup services
//!
//! # Example
//!
//! ```rust,ignore
//! use kiln_object::{access, Class, Mixin, Properties, Value};
//!
//! let Person = Class::core_object().extend_named(
//!     "Person",
//!     [Mixin::builder()
//!         .value("name", Value::Null)
//!         .observer("nameChanged", ["name"], |_this, _key| Ok(()))
//!         .build()],
//! )?;
//!
//! let person = Person.create_with(Properties::new().with("name", "Tomster"))?;
//! assert_eq!(access::get(&person, "name")?, Value::from("Tomster"));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod access;
pub mod class;
pub mod class_registry;
pub mod compose;
pub mod config;
pub mod instance;
mod meta;
pub mod method;
pub mod mixin;
pub mod observer;
pub mod owner;
pub mod properties;
pub mod value;

pub use access::{get, get_path, get_properties, keys, set, set_properties};
pub use class::{Class, ClassDefinition, ClassId, CONSTRUCTOR, INIT, TO_STRING};
pub use class_registry::ClassRegistry;
pub use config::{InitialObserverDelivery, ObjectModelConfig};
pub use instance::{Instance, InstanceId};
pub use method::{Call, Method};
pub use mixin::{ComputedProperty, Mixin, MixinBuilder, MixinId, ObserverCallback, Property};
pub use observer::{add_observer, change_properties, notify, remove_observer};
pub use owner::{get_owner, set_owner, Owner, OwnerTarget};
pub use properties::Properties;
pub use value::{Opaque, Value};

/// Object model errors
#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    /// Raw allocation was called with positional arguments
    #[error(
        "`{class}` was constructed with {arg_count} positional argument(s). You may have either \
         used `new` instead of `.create()`, or passed arguments to the raw allocator; \
         use `{class}.create()` to build instances"
    )]
    InvalidConstruction {
        /// Class being allocated
        class: String,
        /// Number of rejected positional arguments
        arg_count: usize,
    },

    /// An `init` override never reached the root `init`
    #[error("`{class}` overrides `init` without calling super; the root `init` never ran")]
    InitSuperNotCalled {
        /// Class being created
        class: String,
    },

    /// Method dispatch found nothing under the name
    #[error("`{class}` has no method `{name}`")]
    NoSuchMethod {
        /// Receiver class
        class: String,
        /// Requested method
        name: String,
    },

    /// A super value was required but no earlier definition exists
    #[error("`{name}` has no super implementation to call")]
    MissingSuper {
        /// Method name
        name: String,
    },

    /// Write to a read-only computed property
    #[error("cannot set read-only computed property `{key}`")]
    ReadOnly {
        /// Property key
        key: String,
    },

    /// Write of the reserved lifecycle hook name as data
    #[error("`{key}` is a lifecycle hook and cannot be assigned as data")]
    ReservedKey {
        /// Property key
        key: String,
    },

    /// A different owner was attached to an instance that already has one
    #[error("instance already has an owner attached")]
    OwnerAlreadyAttached,

    /// Malformed mixin entry
    #[error("invalid declaration `{name}`: {reason}")]
    InvalidDeclaration {
        /// Entry name
        name: String,
        /// What is wrong with it
        reason: String,
    },

    /// Malformed dependent key path
    #[error("invalid dependent key `{0}`")]
    InvalidDependentKey(String),

    /// Failure raised by user code (methods, hooks, observers)
    #[error("{0}")]
    Callback(String),

    /// Configuration could not be parsed
    #[error("invalid object model config: {0}")]
    Config(#[from] toml::de::Error),
}

impl ObjectError {
    /// Build a user-code failure
    pub fn callback(message: impl Into<String>) -> Self {
        ObjectError::Callback(message.into())
    }
}

/// Object model result
pub type ObjectResult<T> = Result<T, ObjectError>;
