//! Per-instance bookkeeping
//!
//! Meta is the hidden block behind every instance: the owner association,
//! lifecycle flags, observer registrations, cached computed values, the lazily
//! built description, and the state the observer engine needs for batching
//! and cycle breaking. None of it is visible as a property.

use std::rc::Rc;

use indexmap::IndexSet;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::mixin::ObserverCallback;
use crate::owner::Owner;
use crate::value::Value;

/// An observer registered on one instance
#[derive(Debug, Clone)]
pub(crate) struct ObserverRegistration {
    /// Path as registered; identifies the registration for coalescing
    pub(crate) key: String,
    /// Root segment of one expanded path
    pub(crate) root: String,
    pub(crate) callback: ObserverCallback,
}

/// Hidden per-instance state
#[derive(Debug, Default)]
pub(crate) struct Meta {
    pub(crate) owner: Option<Owner>,
    pub(crate) initializing: bool,
    pub(crate) root_init_ran: bool,
    pub(crate) observers: Vec<ObserverRegistration>,
    pub(crate) computed_cache: FxHashMap<String, Value>,
    pub(crate) description: Option<Rc<str>>,
    pub(crate) change_depth: usize,
    pub(crate) pending: IndexSet<String>,
    pub(crate) in_flight: FxHashSet<(String, usize)>,
}

impl Meta {
    pub(crate) fn new() -> Self {
        Self {
            initializing: true,
            ..Self::default()
        }
    }
}
