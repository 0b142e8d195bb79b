// vim: tw=80
//! Decides what the next intercepted call is for.
//!
//! Stubbing and verification are both written as two steps: arm the engine,
//! then make the call that it should interpret.  [`MockingProgress`] holds the
//! armed state in between, and the very next invocation on any mock consumes
//! it, whether or not that invocation matches anything.  Only invocations made
//! by the thread that armed the engine can consume it.
use std::{
    mem,
    thread::{self, ThreadId}
};

use crate::{
    Location,
    MockError,
    MockId,
    VerificationMode,
    error::Pending
};

#[derive(Clone, Debug, Default)]
pub enum ProgressState {
    #[default]
    Idle,
    PendingStub {
        location: Location,
        thread: ThreadId
    },
    PendingVerification {
        mode: VerificationMode,
        location: Location,
        target: MockId,
        thread: ThreadId
    }
}

/// How an intercepted invocation must be handled.
#[derive(Clone, Debug)]
pub enum InvocationRole {
    /// An ordinary call: record it and answer it from the stubs.
    Plain,
    /// The call describes a new stub.
    Stub {
        location: Location
    },
    /// The call describes a verification of `target`.
    Verification {
        mode: VerificationMode,
        location: Location,
        target: MockId
    }
}

/// The stub/verify transaction state of one [`Session`](crate::Session).
#[derive(Debug, Default)]
pub struct MockingProgress {
    state: ProgressState
}

impl MockingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, ProgressState::Idle)
    }

    pub fn pending(&self) -> Option<Pending> {
        match &self.state {
            ProgressState::Idle => None,
            ProgressState::PendingStub{location, ..} =>
                Some(Pending::Stubbing(*location)),
            ProgressState::PendingVerification{location, ..} =>
                Some(Pending::Verification(*location)),
        }
    }

    /// Arm stubbing.  Fails if a stub or verification is already armed.
    pub fn begin_stub(&mut self, location: Location) -> Result<(), MockError> {
        if let Some(pending) = self.pending() {
            return Err(MockError::ReentrantStub { location, pending });
        }
        self.state = ProgressState::PendingStub {
            location,
            thread: thread::current().id()
        };
        Ok(())
    }

    /// Arm verification of `target`.  Fails if a stub or verification is
    /// already armed.
    pub fn begin_verify(&mut self, mode: VerificationMode, location: Location,
                        target: MockId) -> Result<(), MockError>
    {
        if let Some(pending) = self.pending() {
            return Err(MockError::ReentrantVerify { location, pending });
        }
        self.state = ProgressState::PendingVerification {
            mode,
            location,
            target,
            thread: thread::current().id()
        };
        Ok(())
    }

    /// Consume the armed state, if any, for an invocation just intercepted on
    /// the current thread.
    ///
    /// Invocations from any other thread are plain and leave the armed state
    /// alone.  Otherwise the state is `Idle` afterwards.
    pub fn on_invocation(&mut self) -> InvocationRole {
        let current = thread::current().id();
        match &self.state {
            ProgressState::PendingStub{thread, ..} |
            ProgressState::PendingVerification{thread, ..}
                if *thread != current => return InvocationRole::Plain,
            _ => ()
        }
        match mem::take(&mut self.state) {
            ProgressState::Idle => InvocationRole::Plain,
            ProgressState::PendingStub{location, ..} =>
                InvocationRole::Stub { location },
            ProgressState::PendingVerification{mode, location, target, ..} =>
                InvocationRole::Verification { mode, location, target },
        }
    }

    /// Check that nothing is left armed.  An armed state is reported and
    /// discarded.
    pub fn validate(&mut self) -> Result<(), MockError> {
        match mem::take(&mut self.state) {
            ProgressState::Idle => Ok(()),
            ProgressState::PendingStub{location, ..} =>
                Err(MockError::UnfinishedStubbing { location }),
            ProgressState::PendingVerification{location, ..} =>
                Err(MockError::UnfinishedVerification { location }),
        }
    }

    pub fn reset(&mut self) {
        self.state = ProgressState::Idle;
    }
}
