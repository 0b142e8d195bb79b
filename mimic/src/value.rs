// vim: tw=80
//! Type-erased argument and return values.
use std::{
    any::{self, type_name},
    fmt,
    sync::Arc
};

use downcast::{downcast, Any};

use crate::{MethodId, MockError};

/// A value that can be passed as an argument to a mock method.
///
/// It is implemented for every `PartialEq + Debug + Send + Sync + 'static`
/// type.  Arguments are captured by value, so methods taking references should
/// pass owned copies (`name.to_owned()`).
pub trait ArgValue: Any + fmt::Debug + Send + Sync {
    /// Compare with another, possibly differently typed, argument.
    fn eq_value(&self, other: &dyn ArgValue) -> bool;
}
downcast!(dyn ArgValue);

impl<T> ArgValue for T
    where T: PartialEq + fmt::Debug + Send + Sync + 'static
{
    fn eq_value(&self, other: &dyn ArgValue) -> bool {
        other.downcast_ref::<T>()
            .map(|o| self == o)
            .unwrap_or(false)
    }
}

/// One captured argument of an [`Invocation`](crate::Invocation).
pub type Arg = Arc<dyn ArgValue>;

/// Capture a single argument.  See also [`args!`](crate::args!).
pub fn arg<T: ArgValue>(value: T) -> Arg {
    Arc::new(value)
}

/// Build the argument list for [`MockHandle::call`](crate::MockHandle::call).
///
/// # Examples
/// ```
/// # use mimic::*;
/// let a = args![1u32, "x".to_owned()];
/// assert_eq!(a.len(), 2);
/// ```
#[macro_export]
macro_rules! args {
    ($($e:expr),* $(,)?) => {
        ::std::vec![$($crate::arg($e)),*]
    };
}

/// What an intercepted call should produce.
pub enum Reply {
    /// Nothing was stubbed: the method returns its type's default value.
    Default,
    /// A stubbed return value.
    Value(Box<dyn any::Any + Send>),
    /// A stubbed failure.  The call panics with this payload.
    Throw(Box<dyn any::Any + Send>)
}

impl Reply {
    /// Convert into the mock method's return type.
    ///
    /// A `Throw` reply resumes unwinding with its payload, which is how a
    /// stubbed "exception" surfaces in Rust.
    pub fn into_value<R>(self, method: MethodId) -> Result<R, MockError>
        where R: Default + 'static
    {
        match self {
            Reply::Default => Ok(R::default()),
            Reply::Value(v) => v.downcast::<R>()
                .map(|b| *b)
                .map_err(|_| MockError::ReturnType {
                    method,
                    expected: type_name::<R>()
                }),
            Reply::Throw(payload) => std::panic::resume_unwind(payload)
        }
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Default => f.write_str("Default"),
            Reply::Value(_) => f.write_str("Value(..)"),
            Reply::Throw(_) => f.write_str("Throw(..)")
        }
    }
}

#[cfg(test)]
mod t {
    use super::*;

    #[test]
    fn eq_value_same_type() {
        let a = arg(5u32);
        let b = arg(5u32);
        let c = arg(6u32);
        assert!(a.eq_value(&*b));
        assert!(!a.eq_value(&*c));
    }

    #[test]
    fn eq_value_different_type() {
        let a = arg(5u32);
        let b = arg(5u64);
        assert!(!a.eq_value(&*b));
    }

    #[test]
    fn downcast_arg() {
        let a = arg("alice".to_owned());
        assert_eq!(a.downcast_ref::<String>().unwrap(), "alice");
        assert!(a.downcast_ref::<u32>().is_err());
    }

    #[test]
    fn default_reply() {
        let r: u32 = Reply::Default.into_value(MethodId::new("foo")).unwrap();
        assert_eq!(r, 0);
    }

    #[test]
    fn wrong_return_type() {
        let reply = Reply::Value(Box::new(5i64));
        let e = reply.into_value::<u32>(MethodId::new("foo")).unwrap_err();
        assert!(matches!(e, MockError::ReturnType{..}));
    }
}
