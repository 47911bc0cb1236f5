//! Owner attachment primitives
//!
//! An owner is an opaque capability token handed in by an external lookup
//! service. The object model stores it and gives it back; it never looks
//! inside. Owners compare by identity.
//!
//! Owners can be attached to:
//! - an [`Instance`], where the association lives in its meta and is fixed
//!   once set
//! - a [`Properties`] hash, so `create` can move it into the new instance
//!   before anything else runs

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::instance::Instance;
use crate::properties::Properties;
use crate::{ObjectError, ObjectResult};

/// Opaque owner token
#[derive(Clone)]
pub struct Owner(Rc<dyn Any>);

impl Owner {
    /// Wrap a host value as an owner
    pub fn new<T: Any>(value: T) -> Self {
        Owner(Rc::new(value))
    }

    /// Use an existing shared value as the owner
    pub fn from_rc<T: Any>(value: Rc<T>) -> Self {
        Owner(value)
    }

    /// Borrow the wrapped value if it has type `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Owner) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Owner {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Owner({:p})", Rc::as_ptr(&self.0))
    }
}

/// Anything an owner can be attached to
pub trait OwnerTarget {
    /// Read the attached owner
    fn owner(&self) -> Option<Owner>;

    /// Attach an owner
    fn attach_owner(&mut self, owner: Owner) -> ObjectResult<()>;
}

impl OwnerTarget for Properties {
    fn owner(&self) -> Option<Owner> {
        self.owner_slot().cloned()
    }

    fn attach_owner(&mut self, owner: Owner) -> ObjectResult<()> {
        self.set_owner_slot(owner);
        Ok(())
    }
}

impl OwnerTarget for Instance {
    // Reads meta directly; unknownProperty is never consulted.
    fn owner(&self) -> Option<Owner> {
        self.meta().owner.clone()
    }

    fn attach_owner(&mut self, owner: Owner) -> ObjectResult<()> {
        let mut meta = self.meta_mut();
        match &meta.owner {
            Some(existing) if existing.ptr_eq(&owner) => Ok(()),
            Some(_) => Err(ObjectError::OwnerAlreadyAttached),
            None => {
                meta.owner = Some(owner);
                Ok(())
            }
        }
    }
}

/// Attach `owner` to `target`
pub fn set_owner<T: OwnerTarget + ?Sized>(target: &mut T, owner: Owner) -> ObjectResult<()> {
    target.attach_owner(owner)
}

/// Read the owner attached to `target`
pub fn get_owner<T: OwnerTarget + ?Sized>(target: &T) -> Option<Owner> {
    target.owner()
}
