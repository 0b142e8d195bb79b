// vim: tw=80
//! Transaction state, matcher bookkeeping, and the errors they produce.
use std::{cell::RefCell, thread};

use mimic::*;
use pretty_assertions::assert_eq;
use static_assertions::assert_impl_all;

assert_impl_all!(Session: Clone, Send, Sync);
assert_impl_all!(MockHandle: Clone, Send, Sync);

trait Mixer {
    fn mix(&self, a: u8, b: u8, c: u8) -> u8;
    fn level(&self) -> u8;
}

struct MockMixer(MockHandle);

impl Mock for MockMixer {
    fn mock_handle(&self) -> &MockHandle {
        &self.0
    }
}

impl Mixer for MockMixer {
    fn mix(&self, a: u8, b: u8, c: u8) -> u8 {
        self.0.call("mix", args![a, b, c])
    }

    fn level(&self) -> u8 {
        self.0.call("level", args![])
    }
}

fn mock() -> (Session, MockMixer) {
    let session = Session::new();
    let mixer = MockMixer(session.mock("mixer"));
    (session, mixer)
}

#[test]
fn arity_on_plain_call() {
    let (session, mixer) = mock();
    session.push_matcher(any::<u8>());
    let r = mixer.0.intercept("mix", args![1u8, 2u8, 3u8]);
    assert!(matches!(r,
        Err(MockError::MatcherArity{expected: 3, pushed: 1, ..})));
    assert_eq!(0, session.pending_matchers());
    // Nothing leaks into the next call, and the failed one wasn't recorded
    assert_eq!(0, mixer.mix(1, 2, 3));
    session.verify(&mixer, once(), location!(), |m| m.mix(1, 2, 3)).unwrap();
}

#[test]
#[should_panic(expected = "mixer: matcher count mismatch for mix: 2 matchers were pushed for 3 arguments")]
fn arity_panics_in_mock_method() {
    let (session, mixer) = mock();
    session.matching([any::<u8>(), any::<u8>()]);
    mixer.mix(1, 2, 3);
}

#[test]
fn arity_while_stubbing() {
    let (session, mixer) = mock();
    let r = session.stub(location!(), || {
        session.push_matcher(any::<u8>());
        mixer.mix(0, 0, 0)
    });
    assert!(matches!(r, Err(MockError::MatcherArity{..})));
    assert_eq!(0, session.pending_matchers());
    assert!(!session.is_pending());
    assert_eq!(0, mixer.mix(0, 0, 0));
}

#[test]
fn arity_while_verifying() {
    let (session, mixer) = mock();
    mixer.mix(1, 2, 3);
    let r = session.verify(&mixer, once(), location!(), |m| {
        session.matching([any::<u8>(), any::<u8>()]);
        m.mix(0, 0, 0)
    });
    assert!(matches!(r, Err(MockError::MatcherArity{..})));
    assert!(!session.is_pending());
}

#[test]
fn reentrant_stub() {
    let (session, mixer) = mock();
    let inner = RefCell::new(None);
    let outer_at = location!();
    let r = session.stub(outer_at, || {
        let inner_at = location!();
        *inner.borrow_mut() = Some((inner_at,
            session.stub(inner_at, || mixer.level()).map(|_| ())));
        mixer.level()
    });
    let (inner_at, inner_r) = inner.into_inner().unwrap();
    match inner_r {
        Err(MockError::ReentrantStub{location, pending}) => {
            assert_eq!(inner_at, location);
            assert_eq!(Pending::Stubbing(outer_at), pending);
        },
        r => panic!("unexpected result {r:?}")
    }
    // The outer stub still captured its call
    r.unwrap().then_return(7u8);
    assert_eq!(7, mixer.level());
}

#[test]
fn reentrant_verify() {
    let (session, mixer) = mock();
    let inner = RefCell::new(None);
    let r = session.stub(location!(), || {
        *inner.borrow_mut() = Some(session.verify(&mixer, once(), location!(),
                                                  |m| m.level()));
        mixer.level()
    });
    assert!(r.is_ok());
    assert!(matches!(inner.into_inner(),
        Some(Err(MockError::ReentrantVerify{..}))));
}

#[test]
fn unfinished_stubbing() {
    let (session, _mixer) = mock();
    let here = location!();
    let r = session.stub(here, || 42);
    assert!(matches!(r,
        Err(MockError::UnfinishedStubbing{location}) if location == here));
    assert!(!session.is_pending());
}

#[test]
fn unfinished_verification() {
    let (session, mixer) = mock();
    let r = session.verify(&mixer, once(), location!(), |_| ());
    assert!(matches!(r, Err(MockError::UnfinishedVerification{..})));
    assert!(!session.is_pending());
}

/// A closure that unwinds doesn't leave the session armed
#[test]
fn panic_in_closure_disarms() {
    let (session, mixer) = mock();
    let r = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _ = session.stub(location!(), || -> u8 { panic!("oops") });
    }));
    assert!(r.is_err());
    assert!(!session.is_pending());
    assert_eq!(0, mixer.level());
    session.verify(&mixer, once(), location!(), |m| m.level()).unwrap();
}

/// Only the first call consumes an armed stub.  Later ones are plain calls.
#[test]
fn first_call_is_captured() {
    let (session, mixer) = mock();
    session.stub(location!(), || {
        mixer.level();
        mixer.mix(1, 1, 1)
    }).unwrap().then_return(9u8);
    assert_eq!(9, mixer.level());
    assert_eq!(0, mixer.mix(1, 1, 1));
    session.verify(&mixer, times(2), location!(), |m| m.mix(1, 1, 1))
        .unwrap();
    session.verify(&mixer, once(), location!(), |m| m.level()).unwrap();
}

#[test]
fn verification_of_another_mock() {
    let session = Session::new();
    let a = MockMixer(session.mock("a"));
    let b = MockMixer(session.mock("b"));
    let r = session.verify(&a, never(), location!(), |_| b.level());
    match r {
        Err(MockError::WrongMock{actual, ..}) => assert_eq!("b.level", actual),
        r => panic!("unexpected result {r:?}")
    }
}

#[test]
fn finish() {
    let (session, mixer) = mock();
    session.finish().unwrap();
    session.push_matcher(any::<u8>());
    assert!(matches!(session.finish(),
        Err(MockError::UnusedMatchers{count: 1})));
    assert_eq!(0, session.pending_matchers());
    session.finish().unwrap();
    mixer.level();
    session.finish().unwrap();
}

#[test]
fn reset() {
    let (session, mixer) = mock();
    session.push_matcher(any::<u8>());
    session.reset();
    assert_eq!(0, session.pending_matchers());
    assert_eq!(0, mixer.mix(1, 2, 3));
}

/// Sequence numbers order calls across every mock of a session
#[test]
fn sequence_numbers() {
    let session = Session::new();
    let a = MockMixer(session.mock("a"));
    let b = MockMixer(session.mock("b"));
    a.level();
    b.level();
    a.level();
    let seqs = |m: &MockMixer| {
        m.0.invocations().iter().map(|i| i.seq()).collect::<Vec<_>>()
    };
    assert_eq!(vec![1, 3], seqs(&a));
    assert_eq!(vec![2], seqs(&b));
    assert_ne!(a.0.id(), b.0.id());
}

#[test]
fn invocation_location() {
    let (_session, mixer) = mock();
    let line = line!() + 1;
    mixer.0.call::<u8>("level", args![]);
    let inv = mixer.0.invocations().pop().unwrap();
    assert_eq!(line, inv.location().line());
    assert_eq!(file!(), inv.location().file());
    assert_eq!("mixer", inv.mock_name());
}

/// Concurrent tests each have their own session
#[test]
fn independent_sessions() {
    let handles = (0..4u8).map(|i| thread::spawn(move || {
        let (session, mixer) = mock();
        session.stub(location!(), || mixer.level())
            .unwrap()
            .then_return(i);
        for _ in 0..100 {
            assert_eq!(i, mixer.level());
        }
        session.verify(&mixer, times(100), location!(), |m| m.level())
            .unwrap();
        session.finish().unwrap();
    })).collect::<Vec<_>>();
    for h in handles {
        h.join().unwrap();
    }
}

/// A session may be shared with the thread that drives the mock
#[test]
fn shared_session() {
    let (session, mixer) = mock();
    session.stub(location!(), || mixer.level())
        .unwrap()
        .then_return(3u8);
    let handle = mixer.0.clone();
    let r = thread::spawn(move || handle.call::<u8>("level", args![]))
        .join()
        .unwrap();
    assert_eq!(3, r);
    session.verify(&mixer, once(), location!(), |m| m.level()).unwrap();
}

/// A call from another thread can't steal an armed stub
#[test]
fn stub_belongs_to_its_thread() {
    let (session, mixer) = mock();
    let background = mixer.0.clone();
    session.stub(location!(), || {
        thread::spawn(move || background.call::<u8>("level", args![]))
            .join()
            .unwrap();
        mixer.mix(1, 2, 3)
    }).unwrap().then_return(9u8);
    assert_eq!(9, mixer.mix(1, 2, 3));
    assert_eq!(0, mixer.level());
    // The background call was an ordinary one
    session.verify(&mixer, times(2), location!(), |m| m.level()).unwrap();
    session.verify(&mixer, once(), location!(), |m| m.mix(1, 2, 3)).unwrap();
}

#[test]
fn verification_belongs_to_its_thread() {
    let (session, mixer) = mock();
    let background = mixer.0.clone();
    session.verify(&mixer, never(), location!(), |m| {
        thread::spawn(move || background.call::<u8>("level", args![]))
            .join()
            .unwrap();
        m.mix(1, 2, 3)
    }).unwrap();
    session.verify(&mixer, once(), location!(), |m| m.level()).unwrap();
}

#[test]
fn matchers_belong_to_their_thread() {
    let (session, mixer) = mock();
    session.push_matcher(any::<u8>());
    let background = mixer.0.clone();
    let r = thread::spawn(move || {
        background.call::<u8>("mix", args![1u8, 2u8, 3u8])
    }).join().unwrap();
    assert_eq!(0, r);
    assert_eq!(1, session.pending_matchers());
    assert!(matches!(session.finish(),
        Err(MockError::UnusedMatchers{count: 1})));
}

/// Matchers may be pushed before stubbing or verification starts
#[test]
fn matchers_pushed_before_the_closure() {
    let (session, mixer) = mock();
    session.matching([any::<u8>(), eq(2u8), any::<u8>()]);
    session.stub(location!(), || mixer.mix(0, 0, 0))
        .unwrap()
        .then_return(5u8);
    assert_eq!(0, session.pending_matchers());
    assert_eq!(5, mixer.mix(7, 2, 9));
    assert_eq!(0, mixer.mix(7, 3, 9));

    session.matching([any::<u8>(), any::<u8>(), any::<u8>()]);
    session.verify(&mixer, times(2), location!(), |m| m.mix(0, 0, 0))
        .unwrap();
    session.finish().unwrap();
}

/// Matchers pushed for a closure that calls nothing stay pushed
#[test]
fn matchers_pushed_before_an_empty_closure() {
    let (session, _mixer) = mock();
    session.push_matcher(any::<u8>());
    assert!(matches!(session.stub(location!(), || ()),
        Err(MockError::UnfinishedStubbing{..})));
    assert_eq!(1, session.pending_matchers());
    assert!(matches!(session.finish(),
        Err(MockError::UnusedMatchers{count: 1})));
}

#[test]
fn verify_mock_of_another_session() {
    let (session, _mixer) = mock();
    let (other, mixer) = mock();
    mixer.level();
    let r = session.verify(&mixer, once(), location!(), |m| m.level());
    assert!(matches!(r,
        Err(MockError::ForeignMock{ref mock, ..}) if mock == "mixer"));
    assert!(!session.is_pending());
    // Nothing was called, so nothing extra was recorded
    other.verify(&mixer, once(), location!(), |m| m.level()).unwrap();
}

/// Every mock's log is in sequence order, even with calls from many threads
#[test]
fn concurrent_calls_are_logged_in_order() {
    let (_session, mixer) = mock();
    let handles = (0..8).map(|_| {
        let h = mixer.0.clone();
        thread::spawn(move || {
            for _ in 0..100 {
                h.call::<u8>("level", args![]);
            }
        })
    }).collect::<Vec<_>>();
    for h in handles {
        h.join().unwrap();
    }
    let seqs = mixer.0.invocations().iter()
        .map(|i| i.seq())
        .collect::<Vec<_>>();
    assert_eq!(800, seqs.len());
    assert!(seqs.windows(2).all(|w| w[0] < w[1]));
}
