// vim: tw=80
//! The test context that stubbing and verification run in.
use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
        atomic::{AtomicU64, Ordering}
    },
    thread::{self, ThreadId}
};

use crate::{
    Arg,
    ArgMatcher,
    ArgumentMatcherStack,
    Invocation,
    InvocationContainer,
    Location,
    MethodId,
    MockError,
    MockId,
    MockingProgress,
    Pattern,
    Reply,
    StubBuilder,
    VerificationMode,
    progress::InvocationRole,
    stubbing,
    verification
};

/// Lock a mutex, ignoring poison.  A panicking answer must not wedge every
/// later assertion.
pub(crate) fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What the call consumed by an armed stub or verification produced.
enum Captured {
    Stub(StubBuilder),
    Verified,
    Failed(MockError)
}

#[derive(Default)]
struct SessionState {
    progress: MockingProgress,
    /// Each thread pushes matchers for its own next call
    matchers: HashMap<ThreadId, ArgumentMatcherStack>,
    captured: Option<Captured>
}

impl SessionState {
    fn matchers(&mut self) -> &mut ArgumentMatcherStack {
        self.matchers.entry(thread::current().id()).or_default()
    }

    fn take_matchers(&mut self) -> ArgumentMatcherStack {
        self.matchers.remove(&thread::current().id()).unwrap_or_default()
    }

    fn matcher_count(&self) -> usize {
        self.matchers.values().map(ArgumentMatcherStack::len).sum()
    }
}

#[derive(Default)]
struct SessionInner {
    state: Mutex<SessionState>,
    next_seq: AtomicU64
}

/// One test's worth of mocking state.
///
/// A `Session` owns the stub/verify transaction state and the argument matcher
/// stacks.  Every mock created from it shares them, and sequence numbers of
/// calls to those mocks are ordered across all of them.  Tests that run
/// concurrently should each create their own.
///
/// A session may still be shared with threads spawned by the code under test.
/// Stubbing and verification belong to the thread that started them: calls
/// made by other threads meanwhile are plain calls, and matchers are only ever
/// used by a call on the thread that pushed them.
///
/// Cloning a `Session` yields another handle to the same state.
///
/// # Examples
/// ```
/// # use mimic::*;
/// trait Greeter {
///     fn greet(&self, name: &str) -> String;
/// }
///
/// struct MockGreeter(MockHandle);
///
/// impl Mock for MockGreeter {
///     fn mock_handle(&self) -> &MockHandle {
///         &self.0
///     }
/// }
///
/// impl Greeter for MockGreeter {
///     #[track_caller]
///     fn greet(&self, name: &str) -> String {
///         self.0.call("greet", args![name.to_owned()])
///     }
/// }
///
/// let session = Session::new();
/// let greeter = MockGreeter(session.mock("greeter"));
/// session.stub(location!(), || greeter.greet("alice"))
///     .unwrap()
///     .then_return("hi alice".to_owned());
///
/// assert_eq!(greeter.greet("alice"), "hi alice");
/// assert_eq!(greeter.greet("bob"), "");
///
/// session.verify(&greeter, once(), location!(), |g| g.greet("alice"))
///     .unwrap();
/// session.verify(&greeter, never(), location!(), |g| g.greet("carol"))
///     .unwrap();
/// ```
#[derive(Clone, Default)]
pub struct Session {
    inner: Arc<SessionInner>
}

/// Disarms a transaction whose closure unwound before calling a mock.
struct Disarm<'a>(&'a Session);

impl Drop for Disarm<'_> {
    fn drop(&mut self) {
        let mut state = self.0.state();
        state.progress.reset();
        state.captured = None;
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        lock(&self.inner.state)
    }

    /// Create a new mock belonging to this session.  `name` only appears in
    /// error messages.
    pub fn mock(&self, name: &str) -> MockHandle {
        let id = MockId::next();
        debug_event!(%id, name, "created mock");
        MockHandle {
            id,
            name: name.into(),
            container: Arc::default(),
            session: self.clone()
        }
    }

    /// Push a matcher for this thread's next call.  There must be one per
    /// argument of that call, or none at all.
    pub fn push_matcher(&self, matcher: ArgMatcher) {
        self.state().matchers().push(matcher);
    }

    /// Push one matcher per argument of the next call.
    ///
    /// # Examples
    /// ```
    /// # use mimic::*;
    /// let session = Session::new();
    /// let mock = session.mock("m");
    /// session.stub(location!(), || {
    ///     session.matching([any::<u32>(), eq(2u32)]);
    ///     mock.call::<u32>("add", args![0u32, 0u32])
    /// }).unwrap().then_return(42u32);
    /// assert_eq!(42, mock.call::<u32>("add", args![7u32, 2u32]));
    /// assert_eq!(0, mock.call::<u32>("add", args![7u32, 3u32]));
    /// ```
    pub fn matching<I>(&self, matchers: I)
        where I: IntoIterator<Item = ArgMatcher>
    {
        let mut state = self.state();
        let stack = state.matchers();
        for m in matchers {
            stack.push(m);
        }
    }

    /// How many matchers this thread pushed that are waiting for a call.
    pub fn pending_matchers(&self) -> usize {
        self.state().matchers.get(&thread::current().id())
            .map_or(0, ArgumentMatcherStack::len)
    }

    /// Is a stub or verification armed and waiting for its call?
    pub fn is_pending(&self) -> bool {
        !self.state().progress.is_idle()
    }

    /// Stub the first mock call that `call` makes.
    ///
    /// `call`'s own return value is meaningless and is discarded.  Add answers
    /// to the returned builder; until then the stubbed call returns the default
    /// value.
    pub fn stub<F, R>(&self, location: Location, call: F)
        -> Result<StubBuilder, MockError>
        where F: FnOnce() -> R
    {
        self.state().progress.begin_stub(location)?;
        {
            let _disarm = Disarm(self);
            let _ = call();
            let mut state = self.state();
            if !state.progress.is_idle() {
                return Err(MockError::UnfinishedStubbing { location });
            }
            match state.captured.take() {
                Some(Captured::Stub(builder)) => Ok(builder),
                Some(Captured::Failed(e)) => Err(e),
                Some(Captured::Verified) | None =>
                    Err(MockError::UnfinishedStubbing { location })
            }
        }
    }

    /// Verify `mock` against the first call that `call` makes on it.
    ///
    /// `call` receives the mock as the proxy to make the call through.  The
    /// call is not recorded as an interaction.  `mock` must belong to this
    /// session.
    pub fn verify<M, F, R>(&self, mock: &M, mode: VerificationMode,
                           location: Location, call: F)
        -> Result<(), MockError>
        where M: Mock + ?Sized, F: FnOnce(&M) -> R
    {
        let handle = mock.mock_handle();
        if !Arc::ptr_eq(&handle.session.inner, &self.inner) {
            return Err(MockError::ForeignMock {
                location,
                mock: handle.name.to_string()
            });
        }
        self.state().progress.begin_verify(mode, location, handle.id())?;
        {
            let _disarm = Disarm(self);
            let _ = call(mock);
            let mut state = self.state();
            if !state.progress.is_idle() {
                return Err(MockError::UnfinishedVerification { location });
            }
            match state.captured.take() {
                Some(Captured::Verified) => Ok(()),
                Some(Captured::Failed(e)) => Err(e),
                Some(Captured::Stub(_)) | None =>
                    Err(MockError::UnfinishedVerification { location })
            }
        }
    }

    /// Fail if any of `mocks` has a call that no verification counted.
    pub fn verify_no_more_interactions(&self, mocks: &[&dyn Mock])
        -> Result<(), MockError>
    {
        self.state().progress.validate()?;
        for m in mocks {
            let h = m.mock_handle();
            verification::verify_no_more_interactions(&lock(&h.container),
                                                      &h.name)?;
        }
        Ok(())
    }

    /// Fail if any of `mocks` has been called at all.
    pub fn verify_zero_interactions(&self, mocks: &[&dyn Mock])
        -> Result<(), MockError>
    {
        self.state().progress.validate()?;
        for m in mocks {
            let h = m.mock_handle();
            verification::verify_zero_interactions(&lock(&h.container),
                                                   &h.name)?;
        }
        Ok(())
    }

    /// Return to a clean slate: nothing armed and no matchers pushed by any
    /// thread.  Mocks keep their calls and stubs.
    pub fn reset(&self) {
        debug_event!("resetting session");
        let mut state = self.state();
        state.progress.reset();
        state.matchers.clear();
        state.captured = None;
    }

    /// Teardown check.  Reports an armed stub or verification, or matchers
    /// that no call used, and leaves the session clean.
    pub fn finish(&self) -> Result<(), MockError> {
        let mut state = self.state();
        state.captured = None;
        let armed = state.progress.validate();
        let unused = state.matcher_count();
        state.matchers.clear();
        armed?;
        if unused == 0 {
            Ok(())
        } else {
            Err(MockError::UnusedMatchers { count: unused })
        }
    }

    fn intercept(&self, mock: &MockHandle, method: MethodId, args: Vec<Arg>,
                 location: Location) -> Result<Reply, MockError>
    {
        let mut state = self.state();
        let matchers = state.take_matchers()
            .drain_for_invocation(method, &args);
        let role = state.progress.on_invocation();
        trace_event!(mock = %mock.name, %method, ?role, "intercepted call");
        match role {
            InvocationRole::Plain => {
                drop(state);
                let _ = matchers?;
                let (inv, answer) = {
                    // Numbered under the container lock, so that every log is
                    // in sequence order
                    let mut container = lock(&mock.container);
                    let seq = self.inner.next_seq
                        .fetch_add(1, Ordering::Relaxed) + 1;
                    let inv = Arc::new(Invocation::new(mock.id,
                        mock.name.clone(), method, args, seq, location));
                    container.record(inv.clone());
                    let answer = stubbing::resolve(&mut container, &inv);
                    (inv, answer)
                };
                Ok(answer.map_or(Reply::Default, |a| a.reply(&inv)))
            },
            InvocationRole::Stub{location: stubbed_at} => {
                let captured = match matchers {
                    Ok(matchers) => {
                        let pattern = Pattern::new(method, matchers);
                        let id = stubbing::register(&mut lock(&mock.container),
                                                    pattern, stubbed_at);
                        Captured::Stub(StubBuilder::new(mock.container.clone(),
                                                        id))
                    },
                    Err(e) => Captured::Failed(e)
                };
                state.captured = Some(captured);
                Ok(Reply::Default)
            },
            InvocationRole::Verification{mode, location: verified_at, target}
                => {
                let captured = match matchers {
                    Err(e) => Captured::Failed(e),
                    Ok(_) if target != mock.id => {
                        Captured::Failed(MockError::WrongMock {
                            location: verified_at,
                            expected: target.to_string(),
                            actual: format!("{}.{}", mock.name, method)
                        })
                    },
                    Ok(matchers) => {
                        let pattern = Pattern::new(method, matchers);
                        let r = verification::verify(
                            &mut lock(&mock.container), &mock.name, &pattern,
                            &mode, verified_at);
                        match r {
                            Ok(()) => Captured::Verified,
                            Err(e) => Captured::Failed(e.into())
                        }
                    }
                };
                state.captured = Some(captured);
                Ok(Reply::Default)
            }
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Session")
            .field("progress", &state.progress)
            .field("matchers", &state.matcher_count())
            .finish()
    }
}

/// The engine side of one mock object.
///
/// Mock types hold a `MockHandle` and forward every method to
/// [`call`](#method.call) or [`intercept`](#method.intercept).  Clones refer
/// to the same mock.
#[derive(Clone)]
pub struct MockHandle {
    id: MockId,
    name: Arc<str>,
    container: Arc<Mutex<InvocationContainer>>,
    session: Session
}

impl MockHandle {
    pub fn id(&self) -> MockId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Route a call through the engine.
    pub fn intercept_at<M>(&self, method: M, args: Vec<Arg>,
                           location: Location) -> Result<Reply, MockError>
        where M: Into<MethodId>
    {
        self.session.intercept(self, method.into(), args, location)
    }

    /// Like [`intercept_at`](#method.intercept_at), using the caller's
    /// location.
    ///
    /// Mark the mock's own methods `#[track_caller]` too, so that the location
    /// is the call site in the code under test rather than the mock method.
    #[track_caller]
    pub fn intercept<M>(&self, method: M, args: Vec<Arg>)
        -> Result<Reply, MockError>
        where M: Into<MethodId>
    {
        self.intercept_at(method, args, Location::caller())
    }

    /// Route a call through the engine and convert the reply to the method's
    /// return type.
    ///
    /// # Panics
    ///
    /// On any [`MockError`], and with the stubbed payload if the matching stub
    /// throws.
    #[track_caller]
    pub fn call<R>(&self, method: &'static str, args: Vec<Arg>) -> R
        where R: Default + 'static
    {
        let method = MethodId::new(method);
        match self.intercept_at(method, args, Location::caller())
            .and_then(|reply| reply.into_value(method))
        {
            Ok(r) => r,
            Err(e) => panic!("{}: {}", self.name, e)
        }
    }

    /// Every call recorded so far, oldest first.
    pub fn invocations(&self) -> Vec<Arc<Invocation>> {
        lock(&self.container).invocations().to_vec()
    }

    /// Forget every call, but keep the stubs.
    pub fn clear_invocations(&self) {
        lock(&self.container).clear_invocations();
    }

    /// Forget every call and every stub.
    pub fn reset(&self) {
        debug_event!(mock = %self.name, "resetting mock");
        lock(&self.container).reset();
    }
}

impl fmt::Debug for MockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// Anything that can stand in for a collaborator by routing its calls through
/// a [`MockHandle`].
pub trait Mock {
    fn mock_handle(&self) -> &MockHandle;

    /// Route one call through the engine.
    fn intercept(&self, method: MethodId, args: Vec<Arg>, location: Location)
        -> Result<Reply, MockError>
    {
        self.mock_handle().intercept_at(method, args, location)
    }
}

impl Mock for MockHandle {
    fn mock_handle(&self) -> &MockHandle {
        self
    }
}
