// vim: tw=80
//! Counting recorded calls against a verification mode.
use std::{
    fmt,
    ops::Range,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering}
    }
};

use crate::{
    Invocation,
    InvocationContainer,
    Location,
    MockError,
    Pattern,
    error::{Candidate, VerificationError}
};

/// How many matching calls a verification accepts.
#[derive(Clone, Debug)]
pub enum VerificationMode {
    /// Exactly `n` calls
    Times(usize),
    /// `n` or more calls
    AtLeast(usize),
    /// `n` or fewer calls
    AtMost(usize),
    /// No calls at all
    Never,
    /// A number of calls within the half-open range
    Between(Range<usize>),
    /// Exactly `times` consecutive calls, all after the calls previously
    /// verified through the same [`InOrder`].  Any other call of the session,
    /// on any mock, in between two matching calls ends the run.
    InOrder {
        times: usize,
        cursor: InOrder
    }
}

impl VerificationMode {
    /// Does the mode accept `count` matching calls?
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            VerificationMode::Times(n) => count == *n,
            VerificationMode::AtLeast(n) => count >= *n,
            VerificationMode::AtMost(n) => count <= *n,
            VerificationMode::Never => count == 0,
            VerificationMode::Between(r) => r.contains(&count),
            VerificationMode::InOrder{times, ..} => count == *times,
        }
    }
}

fn calls(n: usize) -> &'static str {
    if n == 1 { "call" } else { "calls" }
}

impl fmt::Display for VerificationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationMode::Times(n) => write!(f, "exactly {n} {}", calls(*n)),
            VerificationMode::AtLeast(n) =>
                write!(f, "at least {n} {}", calls(*n)),
            VerificationMode::AtMost(n) =>
                write!(f, "at most {n} {}", calls(*n)),
            VerificationMode::Never => f.write_str("no calls"),
            VerificationMode::Between(r) =>
                write!(f, "between {} and {} calls", r.start,
                       r.end.saturating_sub(1)),
            VerificationMode::InOrder{times, ..} =>
                write!(f, "exactly {times} {} in order", calls(*times)),
        }
    }
}

/// Require exactly `n` calls.
pub fn times(n: usize) -> VerificationMode {
    VerificationMode::Times(n)
}

/// Require exactly one call.  Shortcut for [`times(1)`](times).
pub fn once() -> VerificationMode {
    VerificationMode::Times(1)
}

pub fn at_least(n: usize) -> VerificationMode {
    VerificationMode::AtLeast(n)
}

pub fn at_least_once() -> VerificationMode {
    VerificationMode::AtLeast(1)
}

pub fn at_most(n: usize) -> VerificationMode {
    VerificationMode::AtMost(n)
}

/// Require that the call never happened.
pub fn never() -> VerificationMode {
    VerificationMode::Never
}

/// Allow any number of calls within a half-open range.
pub fn between(range: Range<usize>) -> VerificationMode {
    VerificationMode::Between(range)
}

/// Used to verify that calls happened in a given order, possibly across
/// several mocks.
///
/// Each successful verification through an `InOrder` moves its cursor past the
/// calls it counted, so the next one can only count later calls.
///
/// # Examples
/// ```
/// # use mimic::*;
/// let session = Session::new();
/// let a = session.mock("a");
/// let b = session.mock("b");
/// a.call::<()>("open", args![]);
/// b.call::<()>("close", args![]);
///
/// let order = InOrder::new();
/// session.verify(&a, order.once(), location!(),
///     |a| a.call::<()>("open", args![])).unwrap();
/// session.verify(&b, order.once(), location!(),
///     |b| b.call::<()>("close", args![])).unwrap();
/// ```
#[derive(Clone, Debug, Default)]
pub struct InOrder {
    watermark: Arc<AtomicU64>
}

impl InOrder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require exactly `n` consecutive calls after the previously verified
    /// ones.
    pub fn times(&self, n: usize) -> VerificationMode {
        VerificationMode::InOrder { times: n, cursor: self.clone() }
    }

    pub fn once(&self) -> VerificationMode {
        self.times(1)
    }

    /// Sequence number of the last call verified in order, or 0.
    pub fn watermark(&self) -> u64 {
        self.watermark.load(Ordering::Relaxed)
    }

    fn advance(&self, seq: u64) {
        self.watermark.fetch_max(seq, Ordering::Relaxed);
    }
}

/// Sequence numbers of the calls `mode` counts.
fn counted(container: &InvocationContainer, pattern: &Pattern,
           mode: &VerificationMode) -> Vec<u64>
{
    match mode {
        VerificationMode::InOrder{cursor, ..} => {
            let mark = cursor.watermark();
            // The first run of matching calls after the cursor with no other
            // call of the session in between
            let mut run: Vec<u64> = Vec::new();
            for inv in container.invocations().iter()
                .filter(|inv| inv.seq() > mark)
            {
                let matches = pattern.matches(inv);
                match run.last() {
                    None if matches => run.push(inv.seq()),
                    None => (),
                    Some(&last) if matches && inv.seq() == last + 1 =>
                        run.push(inv.seq()),
                    Some(_) => break
                }
            }
            run
        },
        _ => container.query(pattern).map(|inv| inv.seq()).collect()
    }
}

/// Check `mode` against the calls of one mock accepted by `pattern`.
///
/// On success the counted calls are marked verified, and an in-order cursor is
/// moved past them.
pub fn verify(container: &mut InvocationContainer, mock: &str,
              pattern: &Pattern, mode: &VerificationMode, location: Location)
    -> Result<(), VerificationError>
{
    let seqs = counted(container, pattern, mode);
    if !mode.accepts(seqs.len()) {
        debug_event!(%mock, wanted = %pattern, expected = %mode,
                     actual = seqs.len(), "verification failed");
        let candidates = container.invocations().iter()
            .filter(|inv| inv.method() == pattern.method())
            .map(|inv| candidate(pattern, inv))
            .collect();
        return Err(VerificationError {
            mock: mock.to_owned(),
            wanted: pattern.to_string(),
            expected: mode.to_string(),
            actual: seqs.len(),
            location,
            candidates
        });
    }
    debug_event!(%mock, wanted = %pattern, expected = %mode,
                 "verification passed");
    for seq in seqs.iter() {
        container.mark_verified(*seq);
    }
    if let (VerificationMode::InOrder{cursor, ..}, Some(last)) =
        (mode, seqs.last())
    {
        cursor.advance(*last);
    }
    Ok(())
}

fn candidate(pattern: &Pattern, inv: &Invocation) -> Candidate {
    Candidate {
        seq: inv.seq(),
        call: inv.to_string(),
        location: inv.location(),
        mismatches: pattern.explain(inv)
    }
}

fn describe(container: &InvocationContainer, unverified_only: bool)
    -> Vec<(String, Location)>
{
    container.invocations().iter()
        .filter(|inv| !unverified_only || !container.is_verified(inv.seq()))
        .map(|inv| (inv.to_string(), inv.location()))
        .collect()
}

/// Fail if the mock has any call that no verification has counted.
pub fn verify_no_more_interactions(container: &InvocationContainer,
                                   mock: &str) -> Result<(), MockError>
{
    let unverified = describe(container, true);
    if unverified.is_empty() {
        Ok(())
    } else {
        Err(MockError::NoMoreInteractions {
            mock: mock.to_owned(),
            unverified
        })
    }
}

/// Fail if the mock has been called at all.
pub fn verify_zero_interactions(container: &InvocationContainer, mock: &str)
    -> Result<(), MockError>
{
    let calls = describe(container, false);
    if calls.is_empty() {
        Ok(())
    } else {
        Err(MockError::ZeroInteractions {
            mock: mock.to_owned(),
            calls
        })
    }
}
