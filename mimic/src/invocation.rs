// vim: tw=80
//! Recorded calls and the per-mock log that holds them.
use std::{
    collections::HashSet,
    fmt,
    slice,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering}
    }
};

use crate::{Arg, ArgValue, Location, Pattern, stubbing::StubbingRecord};

/// Identifies one mock object.  Unique within the process.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MockId(u64);

impl MockId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        MockId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for MockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mock#{}", self.0)
    }
}

/// Names a method of a mock.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct MethodId(&'static str);

impl MethodId {
    pub const fn new(name: &'static str) -> Self {
        MethodId(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl From<&'static str> for MethodId {
    fn from(name: &'static str) -> Self {
        MethodId(name)
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// One call made to a mock.  Immutable once recorded.
#[derive(Debug)]
pub struct Invocation {
    mock: MockId,
    mock_name: Arc<str>,
    method: MethodId,
    args: Vec<Arg>,
    seq: u64,
    location: Location
}

impl Invocation {
    pub(crate) fn new(mock: MockId, mock_name: Arc<str>, method: MethodId,
                      args: Vec<Arg>, seq: u64, location: Location) -> Self
    {
        Invocation { mock, mock_name, method, args, seq, location }
    }

    pub fn mock(&self) -> MockId {
        self.mock
    }

    pub fn mock_name(&self) -> &str {
        &self.mock_name
    }

    pub fn method(&self) -> MethodId {
        self.method
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// The `i`th argument, if it exists and has type `T`.
    ///
    /// Mostly useful inside [`then_answer`](crate::StubBuilder::then_answer).
    pub fn arg<T: ArgValue>(&self, i: usize) -> Option<&T> {
        self.args.get(i)?.downcast_ref::<T>().ok()
    }

    /// Position in the session-wide call order.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn location(&self) -> Location {
        self.location
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.method)?;
        for (i, a) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{a:?}")?;
        }
        f.write_str(")")
    }
}

/// Everything one mock has seen: its calls, in order, and its stubs.
#[derive(Default)]
pub struct InvocationContainer {
    log: Vec<Arc<Invocation>>,
    verified: HashSet<u64>,
    pub(crate) stubs: Vec<StubbingRecord>
}

impl InvocationContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, inv: Arc<Invocation>) {
        self.log.push(inv);
    }

    /// The recorded calls accepted by `pattern`, oldest first.
    ///
    /// The returned iterator can be cloned to restart the scan.
    pub fn query<'a>(&'a self, pattern: &'a Pattern) -> Query<'a> {
        Query { inner: self.log.iter(), pattern }
    }

    pub fn invocations(&self) -> &[Arc<Invocation>] {
        &self.log
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn is_verified(&self, seq: u64) -> bool {
        self.verified.contains(&seq)
    }

    pub(crate) fn mark_verified(&mut self, seq: u64) {
        self.verified.insert(seq);
    }

    /// Calls that no successful verification has counted yet.
    pub fn unverified(&self) -> impl Iterator<Item = &Arc<Invocation>> + '_ {
        self.log.iter().filter(move |inv| !self.is_verified(inv.seq()))
    }

    /// Forget every call, but keep the stubs.
    pub fn clear_invocations(&mut self) {
        self.log.clear();
        self.verified.clear();
    }

    /// Forget every call and every stub.
    pub fn reset(&mut self) {
        self.clear_invocations();
        self.stubs.clear();
    }
}

impl fmt::Debug for InvocationContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContainer")
            .field("log", &self.log)
            .field("verified", &self.verified)
            .field("stubs", &self.stubs.len())
            .finish()
    }
}

/// Iterator returned by [`InvocationContainer::query`].
#[derive(Clone)]
pub struct Query<'a> {
    inner: slice::Iter<'a, Arc<Invocation>>,
    pattern: &'a Pattern
}

impl<'a> Iterator for Query<'a> {
    type Item = &'a Arc<Invocation>;

    fn next(&mut self) -> Option<Self::Item> {
        let pattern = self.pattern;
        self.inner.find(|inv| pattern.matches(inv))
    }
}
