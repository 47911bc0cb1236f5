//! Methods and super chaining
//!
//! A [`Method`] is a shared callable. When the composer folds a method over an
//! earlier method of the same name it produces a [`MethodLink`] pointing at the
//! earlier link, so a body can reach its "super" through [`Call`] without any
//! lookup at call time.

use std::fmt;
use std::rc::Rc;

use crate::instance::Instance;
use crate::value::Value;
use crate::{ObjectError, ObjectResult};

/// Method body signature
pub type MethodFn = dyn Fn(&Call<'_>) -> ObjectResult<Value>;

/// Shared callable
#[derive(Clone)]
pub struct Method(Rc<MethodFn>);

impl Method {
    /// Wrap a closure as a method
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&Call<'_>) -> ObjectResult<Value> + 'static,
    {
        Method(Rc::new(body))
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Method) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Invoke unbound: there is no super to reach
    pub fn call(&self, receiver: &Instance, args: &[Value]) -> ObjectResult<Value> {
        let call = Call {
            receiver,
            args,
            name: "",
            next: None,
        };
        (self.0)(&call)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Method({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// One resolved definition in a method's override chain
pub struct MethodLink {
    name: Rc<str>,
    body: Method,
    next: Option<Rc<MethodLink>>,
}

impl MethodLink {
    pub(crate) fn new(name: &str, body: Method, next: Option<Rc<MethodLink>>) -> Rc<Self> {
        Rc::new(MethodLink {
            name: Rc::from(name),
            body,
            next,
        })
    }

    /// Method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The callable at this link
    pub fn body(&self) -> &Method {
        &self.body
    }

    /// Number of definitions in the chain, this one included
    pub fn depth(&self) -> usize {
        1 + self.next.as_ref().map_or(0, |next| next.depth())
    }

    pub(crate) fn invoke(&self, receiver: &Instance, args: &[Value]) -> ObjectResult<Value> {
        let call = Call {
            receiver,
            args,
            name: &self.name,
            next: self.next.as_ref(),
        };
        (self.body.0)(&call)
    }
}

impl fmt::Debug for MethodLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodLink")
            .field("name", &self.name)
            .field("depth", &self.depth())
            .finish()
    }
}

/// Invocation context handed to a method body
pub struct Call<'a> {
    receiver: &'a Instance,
    args: &'a [Value],
    name: &'a str,
    next: Option<&'a Rc<MethodLink>>,
}

impl<'a> Call<'a> {
    /// The receiver
    pub fn this(&self) -> &'a Instance {
        self.receiver
    }

    /// All arguments
    pub fn args(&self) -> &'a [Value] {
        self.args
    }

    /// Argument at `index`, or `Undefined` when missing
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or_default()
    }

    /// Name the method was resolved under (empty for unbound calls)
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Whether an earlier definition exists
    pub fn has_super(&self) -> bool {
        self.next.is_some()
    }

    /// Call the earlier definition; inert (returns `Undefined`) when there is none
    pub fn super_call(&self, args: &[Value]) -> ObjectResult<Value> {
        match self.next {
            Some(link) => link.invoke(self.receiver, args),
            None => Ok(Value::Undefined),
        }
    }

    /// Call the earlier definition with this call's own arguments
    pub fn super_forward(&self) -> ObjectResult<Value> {
        self.super_call(self.args)
    }

    /// Call the earlier definition when its result is required
    pub fn super_value(&self, args: &[Value]) -> ObjectResult<Value> {
        match self.next {
            Some(link) => link.invoke(self.receiver, args),
            None => Err(ObjectError::MissingSuper {
                name: self.name.to_string(),
            }),
        }
    }
}
