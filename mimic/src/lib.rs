// vim: tw=80
//! A mock interaction engine for Rust tests.
//!
//! Mimic records every call made to a mock object, answers those calls from
//! programmed stubs, and afterwards verifies which calls happened, with what
//! arguments, how many times, and in what order.
//!
//! # Usage
//!
//! Everything happens inside a [`Session`], which one test creates and owns.
//! * Create one or more mocks with [`Session::mock`].  A mock type is any type
//!   that holds the returned [`MockHandle`], implements [`Mock`], and forwards
//!   each of its methods to [`MockHandle::call`].  Mark those methods
//!   `#[track_caller]`, so that recorded calls point at the code under test.
//! * Stub calls with [`Session::stub`].
//! * Hand the mocks to the code under test.
//! * Verify the calls with [`Session::verify`].
//!
//! ```
//! use mimic::*;
//!
//! trait Greeter {
//!     fn greet(&self, name: &str) -> String;
//! }
//!
//! struct MockGreeter(MockHandle);
//!
//! impl Mock for MockGreeter {
//!     fn mock_handle(&self) -> &MockHandle {
//!         &self.0
//!     }
//! }
//!
//! impl Greeter for MockGreeter {
//!     #[track_caller]
//!     fn greet(&self, name: &str) -> String {
//!         self.0.call("greet", args![name.to_owned()])
//!     }
//! }
//!
//! fn welcome(g: &dyn Greeter) -> String {
//!     format!("{}!", g.greet("alice"))
//! }
//!
//! let session = Session::new();
//! let greeter = MockGreeter(session.mock("greeter"));
//! session.stub(location!(), || greeter.greet("alice"))
//!     .unwrap()
//!     .then_return("hi alice".to_owned());
//!
//! assert_eq!("hi alice!", welcome(&greeter));
//! session.verify(&greeter, once(), location!(), |g| g.greet("alice"))
//!     .unwrap();
//! ```
//!
//! # The next call
//!
//! Stubbing and verification both work the same way: the engine is armed, and
//! then the very next call on any mock is interpreted instead of being
//! recorded.  `stub` and `verify` take a closure that makes that call.  The
//! closure's return value is thrown away.
//!
//! Exactly one call consumes the armed state.  If the closure makes no mock
//! call, the result is [`MockError::UnfinishedStubbing`] or
//! [`MockError::UnfinishedVerification`].  Arming again while already armed,
//! for example by calling `stub` inside a stub closure, fails with
//! [`MockError::ReentrantStub`] or [`MockError::ReentrantVerify`].
//!
//! # Matching arguments
//!
//! By default a stub or a verification matches calls whose arguments are equal
//! to the ones its closure passed.  For looser matching, push one
//! [`ArgMatcher`] per argument right before the call, with
//! [`Session::matching`] or [`Session::push_matcher`].  Matchers can be built
//! from any [`Predicate`], or with the [`any`], [`eq`], and [`function`]
//! shortcuts.
//!
//! ```
//! # use mimic::*;
//! let session = Session::new();
//! let mock = session.mock("cache");
//! session.stub(location!(), || {
//!     session.matching([function(|k: &String| k.starts_with("user:"))]);
//!     mock.call::<bool>("contains", args![String::new()])
//! }).unwrap().then_return(true);
//!
//! assert!(mock.call::<bool>("contains", args!["user:1".to_owned()]));
//! assert!(!mock.call::<bool>("contains", args!["group:1".to_owned()]));
//! ```
//!
//! It is an error to push some, but not all, of a call's matchers.  The call
//! fails with [`MockError::MatcherArity`], and the pushed matchers are
//! discarded either way.
//!
//! # Answers
//!
//! A call that matches no stub returns its type's `Default` value.  A stub can
//! return a constant ([`then_return`]), compute a value from the
//! [`Invocation`] ([`then_answer`]), or panic the way a failing collaborator
//! would ([`then_throw`]).  Several answers form a sequence: each call uses
//! the next one, and the last one repeats.
//!
//! When more than one stub accepts a call, the one registered last wins.
//!
//! # Verifying
//!
//! [`Session::verify`] counts the recorded calls that match, and checks the
//! count against a [`VerificationMode`]: [`times`], [`once`], [`at_least`],
//! [`at_least_once`], [`at_most`], [`never`], or [`between`].  Verifying a
//! method that was never called simply counts zero.  The calls made inside
//! verification closures are never recorded.
//!
//! Calls can also be verified in order, across any number of mocks, with an
//! [`InOrder`].  Finally, [`Session::verify_no_more_interactions`] checks that
//! every call was counted by some verification, and
//! [`Session::verify_zero_interactions`] that there were no calls at all.
//!
//! # Sessions and threads
//!
//! A `Session` is the whole mutable state of one test.  There is no global
//! state, so tests running in parallel don't interfere as long as each creates
//! its own session.  Call [`Session::finish`] at the end of a test to catch
//! matchers that were pushed but never used.
//!
//! # Features
//!
//! * `tracing` - Emit `tracing` events for every intercepted call, stub, and
//!   verification.
//!
//! [`then_return`]: StubBuilder::then_return
//! [`then_answer`]: StubBuilder::then_answer
//! [`then_throw`]: StubBuilder::then_throw

#[macro_use]
mod trace;

mod error;
mod invocation;
mod location;
mod matcher;
mod progress;
mod session;
pub mod stubbing;
mod value;
pub mod verification;

pub use error::{Candidate, MockError, Pending, VerificationError};
pub use invocation::{Invocation, InvocationContainer, MethodId, MockId, Query};
pub use location::Location;
pub use matcher::{
    ArgMatcher,
    ArgumentMatcherStack,
    Pattern,
    any,
    eq,
    function
};
pub use predicates::prelude::{Predicate, predicate};
pub use progress::{InvocationRole, MockingProgress, ProgressState};
pub use session::{Mock, MockHandle, Session};
pub use stubbing::{Answer, StubBuilder, StubId, StubbingRecord};
pub use value::{Arg, ArgValue, Reply, arg};
pub use verification::{
    InOrder,
    VerificationMode,
    at_least,
    at_least_once,
    at_most,
    between,
    never,
    once,
    times
};
