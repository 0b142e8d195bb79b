// vim: tw=80
//! Argument matchers and the stack they are pushed onto before a call.
use std::{
    any::type_name,
    fmt,
    marker::PhantomData,
    mem
};

use predicates::prelude::*;
use predicates_tree::CaseTreeExt;

use crate::{Arg, ArgValue, Invocation, MethodId, MockError};

/// A typed predicate with its argument type erased.
trait ErasedPredicate: Send {
    fn eval(&self, arg: &dyn ArgValue) -> bool;

    /// Explain why `arg` was rejected, or `None` if it is accepted.
    fn explain(&self, arg: &dyn ArgValue) -> Option<String>;

    fn describe(&self) -> String;
}

struct Typed<T, P> {
    pred: P,
    // fn(&T) keeps Typed Send regardless of T
    _t: PhantomData<fn(&T)>
}

impl<T, P> ErasedPredicate for Typed<T, P>
    where T: ArgValue, P: Predicate<T> + Send
{
    fn eval(&self, arg: &dyn ArgValue) -> bool {
        arg.downcast_ref::<T>()
            .map(|v| self.pred.eval(v))
            .unwrap_or(false)
    }

    fn explain(&self, arg: &dyn ArgValue) -> Option<String> {
        match arg.downcast_ref::<T>() {
            Ok(v) => self.pred.find_case(false, v)
                .map(|case| case.tree().to_string()),
            Err(_) => Some(format!("expected an argument of type {}",
                                   type_name::<T>()))
        }
    }

    fn describe(&self) -> String {
        self.pred.to_string()
    }
}

enum Kind {
    Literal(Arg),
    Pred(Box<dyn ErasedPredicate>)
}

/// Accepts or rejects a single argument of an invocation.
///
/// Matchers are built from any [`Predicate`] over the argument's concrete
/// type, or from a literal value compared by equality.  An argument of a
/// different type than the matcher expects never matches.
pub struct ArgMatcher(Kind);

impl ArgMatcher {
    /// Match arguments of type `T` with a [`Predicate`].
    ///
    /// # Examples
    /// ```
    /// # use mimic::*;
    /// let m = ArgMatcher::new::<u32, _>(predicate::lt(10u32));
    /// assert!(m.matches(&*arg(5u32)));
    /// assert!(!m.matches(&*arg(50u32)));
    /// ```
    pub fn new<T, P>(pred: P) -> Self
        where T: ArgValue, P: Predicate<T> + Send + 'static
    {
        ArgMatcher(Kind::Pred(Box::new(Typed { pred, _t: PhantomData })))
    }

    /// Match arguments equal to an already captured one.
    pub fn literal(value: Arg) -> Self {
        ArgMatcher(Kind::Literal(value))
    }

    pub fn matches(&self, arg: &dyn ArgValue) -> bool {
        match &self.0 {
            Kind::Literal(v) => v.eq_value(arg),
            Kind::Pred(p) => p.eval(arg)
        }
    }

    /// Explain a rejection, or `None` if `arg` matches.
    pub fn explain(&self, arg: &dyn ArgValue) -> Option<String> {
        match &self.0 {
            Kind::Literal(v) if v.eq_value(arg) => None,
            Kind::Literal(v) => Some(format!("expected {v:?}, got {arg:?}")),
            Kind::Pred(p) => p.explain(arg)
        }
    }
}

impl fmt::Debug for ArgMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Kind::Literal(v) => write!(f, "{v:?}"),
            Kind::Pred(p) => write!(f, "<{}>", p.describe())
        }
    }
}

/// Match any argument of type `T`.
pub fn any<T: ArgValue>() -> ArgMatcher {
    ArgMatcher::new::<T, _>(predicate::always())
}

/// Match arguments equal to `value`.
pub fn eq<T: ArgValue + PartialEq>(value: T) -> ArgMatcher {
    ArgMatcher::new::<T, _>(predicate::eq(value))
}

/// Match arguments for which `f` returns true.
pub fn function<T, F>(f: F) -> ArgMatcher
    where T: ArgValue, F: Fn(&T) -> bool + Send + 'static
{
    ArgMatcher::new::<T, _>(predicate::function(f))
}

/// A method plus one matcher per argument.
///
/// This is what a stub registers and what a verification counts.
#[derive(Debug)]
pub struct Pattern {
    method: MethodId,
    matchers: Vec<ArgMatcher>
}

impl Pattern {
    pub fn new(method: MethodId, matchers: Vec<ArgMatcher>) -> Self {
        Pattern { method, matchers }
    }

    pub fn method(&self) -> MethodId {
        self.method
    }

    pub fn matchers(&self) -> &[ArgMatcher] {
        &self.matchers
    }

    pub fn matches(&self, inv: &Invocation) -> bool {
        inv.method() == self.method &&
            inv.args().len() == self.matchers.len() &&
            self.matchers.iter()
                .zip(inv.args())
                .all(|(m, a)| m.matches(&**a))
    }

    /// Why each argument of `inv` was rejected.  Empty if `inv` matches.
    pub fn explain(&self, inv: &Invocation) -> Vec<String> {
        if inv.args().len() != self.matchers.len() {
            return vec![format!("expected {} arguments, got {}",
                                self.matchers.len(), inv.args().len())];
        }
        self.matchers.iter()
            .zip(inv.args())
            .enumerate()
            .filter_map(|(i, (m, a))| m.explain(&**a)
                        .map(|why| format!("argument {i}: {why}")))
            .collect()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.method)?;
        for (i, m) in self.matchers.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{m:?}")?;
        }
        f.write_str(")")
    }
}

/// Matchers pushed ahead of the call that will use them.
///
/// Every invocation drains the whole stack, so nothing pushed for one call can
/// leak into the next one.
#[derive(Debug, Default)]
pub struct ArgumentMatcherStack {
    pushed: Vec<ArgMatcher>
}

impl ArgumentMatcherStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, matcher: ArgMatcher) {
        self.pushed.push(matcher);
    }

    pub fn len(&self) -> usize {
        self.pushed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pushed.is_empty()
    }

    pub fn clear(&mut self) {
        self.pushed.clear();
    }

    /// Take the matchers for a call of `method` with `args`.
    ///
    /// With nothing pushed, each argument is matched by equality.  Otherwise
    /// there must be exactly one matcher per argument.  The stack is empty
    /// afterwards either way.
    pub fn drain_for_invocation(&mut self, method: MethodId, args: &[Arg])
        -> Result<Vec<ArgMatcher>, MockError>
    {
        let pushed = mem::take(&mut self.pushed);
        match pushed.len() {
            0 => Ok(args.iter().cloned().map(ArgMatcher::literal).collect()),
            n if n == args.len() => Ok(pushed),
            n => Err(MockError::MatcherArity {
                method,
                expected: args.len(),
                pushed: n
            })
        }
    }
}

#[cfg(test)]
mod t {
    use super::*;
    use crate::arg;

    const FOO: MethodId = MethodId::new("foo");

    #[test]
    fn literals_when_nothing_pushed() {
        let mut stack = ArgumentMatcherStack::new();
        let args = vec![arg(1u32), arg("x".to_owned())];
        let matchers = stack.drain_for_invocation(FOO, &args).unwrap();
        assert_eq!(matchers.len(), 2);
        assert!(matchers[0].matches(&*arg(1u32)));
        assert!(!matchers[0].matches(&*arg(2u32)));
        assert!(matchers[1].matches(&*arg("x".to_owned())));
    }

    #[test]
    fn exact_count() {
        let mut stack = ArgumentMatcherStack::new();
        stack.push(any::<u32>());
        stack.push(eq(5u32));
        let args = vec![arg(1u32), arg(2u32)];
        let matchers = stack.drain_for_invocation(FOO, &args).unwrap();
        assert!(matchers[0].matches(&*arg(99u32)));
        assert!(matchers[1].matches(&*arg(5u32)));
        assert!(stack.is_empty());
    }

    #[test]
    fn arity_mismatch_clears_stack() {
        let mut stack = ArgumentMatcherStack::new();
        stack.push(any::<u32>());
        let args = vec![arg(1u32), arg(2u32), arg(3u32)];
        let e = stack.drain_for_invocation(FOO, &args).unwrap_err();
        assert!(matches!(e,
            MockError::MatcherArity{expected: 3, pushed: 1, ..}));
        assert!(stack.is_empty());
    }

    #[test]
    fn too_many_matchers() {
        let mut stack = ArgumentMatcherStack::new();
        stack.push(any::<u32>());
        stack.push(any::<u32>());
        let args = vec![arg(1u32)];
        assert!(stack.drain_for_invocation(FOO, &args).is_err());
        assert!(stack.is_empty());
    }

    #[test]
    fn type_mismatch_never_matches() {
        let m = any::<u32>();
        assert!(!m.matches(&*arg(1u64)));
        let why = m.explain(&*arg(1u64)).unwrap();
        assert!(why.contains("u32"), "{why}");
    }

    #[test]
    fn explain_predicate() {
        let m = ArgMatcher::new::<u32, _>(predicate::gt(10u32));
        assert_eq!(m.explain(&*arg(11u32)), None);
        assert!(m.explain(&*arg(3u32)).is_some());
    }

    #[test]
    fn function_matcher() {
        let m = function(|s: &String| s.starts_with('a'));
        assert!(m.matches(&*arg("alice".to_owned())));
        assert!(!m.matches(&*arg("bob".to_owned())));
    }
}
