// vim: tw=80
//! Canned answers for call patterns.
//!
//! Stubs are scanned newest first: when two stubs accept the same call, the
//! one registered last wins.
use std::{
    any::Any,
    fmt,
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicU64, Ordering}
    }
};

use fragile::Fragile;

use crate::{
    Invocation,
    InvocationContainer,
    Location,
    Pattern,
    Reply,
    session::lock
};

type AnswerFn = Box<dyn FnMut(&Invocation) -> Box<dyn Any + Send> + Send>;
type ValueFn = Box<dyn Fn() -> Box<dyn Any + Send> + Send + Sync>;

/// What a stubbed call does.
pub enum Answer {
    /// Return a clone of a constant
    Return(ValueFn),
    /// Compute the return value from the invocation
    Call(Mutex<AnswerFn>),
    /// Panic with a clone of a payload
    Throw(ValueFn),
    /// Return the type's default value
    Default
}

impl Answer {
    /// Produce the reply for `inv`.  Must be called without holding any engine
    /// lock, since an answer closure may call other mocks.
    pub fn reply(&self, inv: &Invocation) -> Reply {
        match self {
            Answer::Return(f) => Reply::Value(f()),
            Answer::Call(f) => {
                let mut guard = lock(f);
                Reply::Value((*guard)(inv))
            },
            Answer::Throw(f) => Reply::Throw(f()),
            Answer::Default => Reply::Default
        }
    }
}

impl fmt::Debug for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Return(_) => f.write_str("Return"),
            Answer::Call(_) => f.write_str("Call"),
            Answer::Throw(_) => f.write_str("Throw"),
            Answer::Default => f.write_str("Default")
        }
    }
}

/// Identifies a registered stub within its mock.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct StubId(u64);

/// A pattern and the answers it gives, in order.
#[derive(Debug)]
pub struct StubbingRecord {
    id: StubId,
    pattern: Pattern,
    answers: Vec<Arc<Answer>>,
    /// How many times this stub has answered
    cursor: usize,
    location: Location
}

impl StubbingRecord {
    fn new(pattern: Pattern, location: Location) -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        let id = StubId(NEXT.fetch_add(1, Ordering::Relaxed));
        StubbingRecord {
            id,
            pattern,
            answers: Vec::new(),
            cursor: 0,
            location
        }
    }

    pub fn id(&self) -> StubId {
        self.id
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn location(&self) -> Location {
        self.location
    }

    /// The answer for the next call.  Once the sequence is used up, the last
    /// answer repeats.
    fn next_answer(&mut self) -> Option<Arc<Answer>> {
        let last = self.answers.len().checked_sub(1)?;
        let answer = self.answers[self.cursor.min(last)].clone();
        self.cursor = self.cursor.saturating_add(1);
        Some(answer)
    }
}

/// Register a stub for `pattern` on a mock.  It starts with no answers, so
/// until some are added it answers with the default value.
pub fn register(container: &mut InvocationContainer, pattern: Pattern,
                location: Location) -> StubId
{
    debug_event!(method = %pattern.method(), %location, "registering stub");
    let record = StubbingRecord::new(pattern, location);
    let id = record.id;
    container.stubs.push(record);
    id
}

/// Find the answer for a real call, advancing the chosen stub's sequence.
///
/// `None` means that no stub accepts the call, or that the newest one that
/// does has no answers; either way the caller returns the default value.
pub fn resolve(container: &mut InvocationContainer, inv: &Invocation)
    -> Option<Arc<Answer>>
{
    let record = container.stubs.iter_mut()
        .rev()
        .find(|r| r.pattern.matches(inv))?;
    trace_event!(method = %inv.method(), stub = %record.location,
                 "resolved stub");
    record.next_answer()
}

/// Adds answers to a freshly registered stub.
///
/// Each `then_*` call appends one answer.  Successive calls of the stubbed
/// method use successive answers, and the last one repeats forever.
///
/// # Examples
/// ```
/// # use mimic::*;
/// let session = Session::new();
/// let mock = session.mock("counter");
/// session.stub(location!(), || mock.call::<u32>("next", args![]))
///     .unwrap()
///     .then_return(1u32)
///     .then_return(2u32);
/// assert_eq!(1, mock.call::<u32>("next", args![]));
/// assert_eq!(2, mock.call::<u32>("next", args![]));
/// assert_eq!(2, mock.call::<u32>("next", args![]));
/// ```
pub struct StubBuilder {
    container: Arc<Mutex<InvocationContainer>>,
    id: StubId
}

impl StubBuilder {
    pub(crate) fn new(container: Arc<Mutex<InvocationContainer>>, id: StubId)
        -> Self
    {
        StubBuilder { container, id }
    }

    pub fn id(&self) -> StubId {
        self.id
    }

    fn push(self, answer: Answer) -> Self {
        {
            let mut guard = lock(&self.container);
            // The mock may have been reset since the stub was registered
            if let Some(r) = guard.stubs.iter_mut().find(|r| r.id == self.id) {
                r.answers.push(Arc::new(answer));
            }
        }
        self
    }

    /// Return a constant value.
    ///
    /// The type must be exactly the mock method's return type, so numeric
    /// literals usually need a suffix: `then_return(42u32)`.
    pub fn then_return<T>(self, value: T) -> Self
        where T: Clone + Send + Sync + 'static
    {
        let f = move || -> Box<dyn Any + Send> { Box::new(value.clone()) };
        self.push(Answer::Return(Box::new(f)))
    }

    /// Compute the return value with a closure that receives the invocation.
    pub fn then_answer<T, F>(self, mut f: F) -> Self
        where T: Send + 'static,
              F: FnMut(&Invocation) -> T + Send + 'static
    {
        let f = move |inv: &Invocation| -> Box<dyn Any + Send> {
            Box::new(f(inv))
        };
        self.push(Answer::Call(Mutex::new(Box::new(f))))
    }

    /// Single-threaded version of [`then_answer`](#method.then_answer).  Can
    /// be used when the closure isn't `Send`.
    ///
    /// It is a runtime error to call the mock method from a different thread
    /// than the one that registered this answer.
    pub fn then_answer_st<T, F>(self, f: F) -> Self
        where T: Send + 'static,
              F: FnMut(&Invocation) -> T + 'static
    {
        let mut fragile = Fragile::new(f);
        let f = move |inv: &Invocation| -> Box<dyn Any + Send> {
            Box::new((fragile.get_mut())(inv))
        };
        self.push(Answer::Call(Mutex::new(Box::new(f))))
    }

    /// Make the call panic with `payload`, the way a real collaborator would
    /// fail.
    pub fn then_throw<E>(self, payload: E) -> Self
        where E: Clone + Send + Sync + 'static
    {
        let f = move || -> Box<dyn Any + Send> { Box::new(payload.clone()) };
        self.push(Answer::Throw(Box::new(f)))
    }

    /// Return the default value, as an unstubbed call would.
    pub fn then_default(self) -> Self {
        self.push(Answer::Default)
    }
}

impl fmt::Debug for StubBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StubBuilder").field("id", &self.id).finish()
    }
}
