// vim: tw=80
use std::fmt;

use thiserror::Error;

use crate::{Location, MethodId};

/// Every way the engine can reject what a test asked of it.
///
/// None of these are recovered from internally.  A call that matches no stub
/// is not an error at all; it just returns the default value.
#[derive(Debug, Error)]
pub enum MockError {
    #[error("{location}: cannot start stubbing while the {pending} is unfinished")]
    ReentrantStub {
        location: Location,
        pending: Pending
    },

    #[error("{location}: cannot start verification while the {pending} is unfinished")]
    ReentrantVerify {
        location: Location,
        pending: Pending
    },

    #[error("matcher count mismatch for {method}: {pushed} matchers were pushed for {expected} arguments")]
    MatcherArity {
        method: MethodId,
        expected: usize,
        pushed: usize
    },

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error("{location}: unfinished stubbing: no mock method was called to stub")]
    UnfinishedStubbing {
        location: Location
    },

    #[error("{location}: unfinished verification: no mock method was called to verify")]
    UnfinishedVerification {
        location: Location
    },

    #[error("{count} argument matchers were pushed but never used by a call")]
    UnusedMatchers {
        count: usize
    },

    #[error("{location}: verification of {expected} was consumed by a call to {actual}")]
    WrongMock {
        location: Location,
        expected: String,
        actual: String
    },

    #[error("{location}: cannot verify {mock}, which belongs to a different session")]
    ForeignMock {
        location: Location,
        mock: String
    },

    #[error("no more interactions wanted on {mock}, but found:{}", CallList(.unverified))]
    NoMoreInteractions {
        mock: String,
        unverified: Vec<(String, Location)>
    },

    #[error("zero interactions wanted on {mock}, but found:{}", CallList(.calls))]
    ZeroInteractions {
        mock: String,
        calls: Vec<(String, Location)>
    },

    #[error("{method} answered with a value that is not a {expected}")]
    ReturnType {
        method: MethodId,
        expected: &'static str
    }
}

/// Which kind of transaction a [`MockError`] found pending.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Pending {
    Stubbing(Location),
    Verification(Location)
}

impl fmt::Display for Pending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pending::Stubbing(l) => write!(f, "stubbing started at {l}"),
            Pending::Verification(l) =>
                write!(f, "verification started at {l}"),
        }
    }
}

/// A verification whose mode did not accept the number of matching calls.
#[derive(Debug, Error)]
pub struct VerificationError {
    pub(crate) mock: String,
    pub(crate) wanted: String,
    pub(crate) expected: String,
    pub(crate) actual: usize,
    pub(crate) location: Location,
    pub(crate) candidates: Vec<Candidate>
}

impl VerificationError {
    /// The mock that was verified.
    pub fn mock(&self) -> &str {
        &self.mock
    }

    /// The verified call, like `greet("alice")`.
    pub fn wanted(&self) -> &str {
        &self.wanted
    }

    /// What the verification mode required, like `exactly 1 call`.
    pub fn expected(&self) -> &str {
        &self.expected
    }

    /// How many calls the mode actually counted.
    pub fn actual(&self) -> usize {
        self.actual
    }

    /// Where the verification was written.
    pub fn location(&self) -> Location {
        self.location
    }

    /// Every recorded call of the verified method.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }
}

impl fmt::Display for VerificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}.{}: wanted {}, but was called {} time{}",
            self.location, self.mock, self.wanted, self.expected, self.actual,
            if self.actual == 1 { "" } else { "s" })?;
        if !self.candidates.is_empty() {
            write!(f, "\ninvocations of the same method:")?;
            for c in self.candidates.iter() {
                write!(f, "\n  {c}")?;
            }
        }
        Ok(())
    }
}

/// A recorded call considered by a failed verification.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Candidate {
    pub seq: u64,
    pub call: String,
    pub location: Location,
    /// Why each non-matching argument was rejected.  Empty if it matched.
    pub mismatches: Vec<String>
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} at {}", self.seq, self.call, self.location)?;
        for m in self.mismatches.iter() {
            for line in m.lines() {
                write!(f, "\n      {line}")?;
            }
        }
        Ok(())
    }
}

struct CallList<'a>(&'a [(String, Location)]);

impl fmt::Display for CallList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (call, location) in self.0 {
            write!(f, "\n  {call} at {location}")?;
        }
        Ok(())
    }
}
