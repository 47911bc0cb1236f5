//! Dynamic value representation
//!
//! Every property slot, method argument and return holds a [`Value`].
//! `Undefined` is the absent marker: reading a key nothing defines yields it,
//! and a class may also declare it explicitly as a default.
//!
//! Equality is structural for scalars, lists and plain maps, and by identity
//! for instances, methods and opaque tokens.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::instance::Instance;
use crate::method::Method;
use crate::properties::Properties;

/// Dynamic value
#[derive(Clone, Default)]
pub enum Value {
    /// Absent marker
    #[default]
    Undefined,
    /// Explicit null
    Null,
    /// Boolean
    Bool(bool),
    /// Number (all numerics are f64)
    Number(f64),
    /// Immutable string
    String(Rc<str>),
    /// Immutable list
    List(Rc<Vec<Value>>),
    /// Plain data object
    Map(Rc<Properties>),
    /// Live object instance
    Object(Instance),
    /// Callable
    Method(Method),
    /// Opaque host token
    Opaque(Opaque),
}

impl Value {
    /// Create the absent marker
    #[inline]
    pub const fn undefined() -> Self {
        Value::Undefined
    }

    /// Create a null value
    #[inline]
    pub const fn null() -> Self {
        Value::Null
    }

    /// Create a boolean value
    #[inline]
    pub const fn bool(b: bool) -> Self {
        Value::Bool(b)
    }

    /// Create a number value
    #[inline]
    pub const fn number(n: f64) -> Self {
        Value::Number(n)
    }

    /// Create a string value
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Rc::from(s.as_ref()))
    }

    /// Create a list value
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(Rc::new(items.into_iter().collect()))
    }

    /// Create a plain map value
    pub fn map(props: Properties) -> Self {
        Value::Map(Rc::new(props))
    }

    /// Check for the absent marker
    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Check for null
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check for null or undefined
    #[inline]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined)
    }

    /// JS-style truthiness
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Extract boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract number value
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Borrow string contents
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow list items
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Borrow map entries
    pub fn as_map(&self) -> Option<&Properties> {
        match self {
            Value::Map(props) => Some(props),
            _ => None,
        }
    }

    /// Borrow the instance
    pub fn as_object(&self) -> Option<&Instance> {
        match self {
            Value::Object(instance) => Some(instance),
            _ => None,
        }
    }

    /// Borrow the callable
    pub fn as_method(&self) -> Option<&Method> {
        match self {
            Value::Method(method) => Some(method),
            _ => None,
        }
    }

    /// Short type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
            Value::Method(_) => "method",
            Value::Opaque(_) => "opaque",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Method(a), Value::Method(b)) => a.ptr_eq(b),
            (Value::Opaque(a), Value::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

fn format_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        write!(f, "NaN")
    } else if n.is_infinite() {
        write!(f, "{}Infinity", if n < 0.0 { "-" } else { "" })
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => format_number(*n, f),
            Value::String(s) => write!(f, "{}", s),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    if !item.is_nullish() {
                        write!(f, "{}", item)?;
                    }
                }
                Ok(())
            }
            Value::Map(_) => write!(f, "[object Object]"),
            Value::Object(instance) => write!(f, "{}", instance),
            Value::Method(_) => write!(f, "[method]"),
            Value::Opaque(_) => write!(f, "[opaque]"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "bool({})", b),
            Value::Number(n) => write!(f, "number({})", n),
            Value::String(s) => write!(f, "string({:?})", s),
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Map(props) => write!(f, "{:?}", props),
            Value::Object(instance) => write!(f, "{:?}", instance),
            Value::Method(_) => write!(f, "method"),
            Value::Opaque(_) => write!(f, "opaque"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Instance> for Value {
    fn from(instance: Instance) -> Self {
        Value::Object(instance)
    }
}

impl From<Method> for Value {
    fn from(method: Method) -> Self {
        Value::Method(method)
    }
}

impl From<Properties> for Value {
    fn from(props: Properties) -> Self {
        Value::map(props)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(Rc::new(items))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Opaque host token, compared by identity
#[derive(Clone)]
pub struct Opaque(Rc<dyn Any>);

impl Opaque {
    /// Wrap a host value
    pub fn new<T: Any>(value: T) -> Self {
        Opaque(Rc::new(value))
    }

    /// Borrow the wrapped value if it has type `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Opaque) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({:p})", Rc::as_ptr(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_truthiness() {
        assert!(!Value::undefined().is_truthy());
        assert!(!Value::null().is_truthy());
        assert!(!Value::bool(false).is_truthy());
        assert!(Value::bool(true).is_truthy());
        assert!(!Value::number(0.0).is_truthy());
        assert!(!Value::number(f64::NAN).is_truthy());
        assert!(Value::number(-1.0).is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(Value::string("x").is_truthy());
        assert!(Value::list([]).is_truthy());
    }

    #[test]
    fn test_value_display() {
        assert_eq!(format!("{}", Value::undefined()), "undefined");
        assert_eq!(format!("{}", Value::null()), "null");
        assert_eq!(format!("{}", Value::bool(true)), "true");
        assert_eq!(format!("{}", Value::number(42.0)), "42");
        assert_eq!(format!("{}", Value::number(-2.5)), "-2.5");
        assert_eq!(format!("{}", Value::number(f64::INFINITY)), "Infinity");
        assert_eq!(format!("{}", Value::string("hi")), "hi");
        assert_eq!(
            format!("{}", Value::list([Value::from(1), Value::Null, Value::from("a")])),
            "1,,a"
        );
        assert_eq!(format!("{}", Value::map(Properties::new())), "[object Object]");
    }

    #[test]
    fn test_value_debug() {
        assert_eq!(format!("{:?}", Value::null()), "null");
        assert_eq!(format!("{:?}", Value::bool(true)), "bool(true)");
        assert_eq!(format!("{:?}", Value::string("a")), "string(\"a\")");
    }

    #[test]
    fn test_value_equality() {
        assert_eq!(Value::undefined(), Value::default());
        assert_eq!(Value::from("a"), Value::string("a"));
        assert_eq!(Value::from(1), Value::number(1.0));
        assert_ne!(Value::null(), Value::undefined());
        assert_ne!(Value::from(0), Value::bool(false));
        assert_eq!(
            Value::list([Value::from(1), Value::from(2)]),
            Value::list([Value::from(1), Value::from(2)])
        );
        assert_eq!(
            Value::map(Properties::new().with("id", 1)),
            Value::map(Properties::new().with("id", 1))
        );
    }

    #[test]
    fn test_opaque_identity() {
        let a = Opaque::new(5u8);
        let b = Opaque::new(5u8);
        assert_eq!(Value::Opaque(a.clone()), Value::Opaque(a.clone()));
        assert_ne!(Value::Opaque(a.clone()), Value::Opaque(b));
        assert_eq!(a.downcast_ref::<u8>(), Some(&5));
        assert_eq!(a.downcast_ref::<u16>(), None);
    }

    #[test]
    fn test_option_into_value() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::from("x"));
    }
}
