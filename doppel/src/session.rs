// vim: tw=80
//! The thread-local stubbing/verification state machine.
//!
//! The two-statement idiom (`when(mock.f())` ... `.then_return(v)`, or
//! `verify(mock, times(n))` ... `.f()`) needs somewhere to park state between
//! statements.  That state lives here, strictly per thread: a stubbing begun
//! on one thread is invisible to every other thread, so tests may run in
//! parallel and mocks may be called from background threads without
//! observing each other's half-finished chains.

use std::{cell::RefCell, panic::Location, sync::Arc};

use crate::{
    error::{MisuseError, MockError},
    matchers::{ArgMatcher, InvocationMatcher},
    mock::MockInner,
    stubbing::Answer,
    verification::VerificationMode,
};

/// A pushed argument matcher plus where it was created, for misuse messages.
pub(crate) struct LocalizedMatcher {
    pub(crate) matcher: Arc<dyn ArgMatcher>,
    pub(crate) location: &'static Location<'static>,
}

/// Exactly one of these at any instant, per thread.
pub(crate) enum State {
    Idle,
    /// `when()` has run; the template awaits its first `then_*`.  The strong
    /// mock reference keeps a mock reachable while the chain is in flight.
    Stubbing {
        template: InvocationMatcher,
        mock: Arc<MockInner>,
        started_at: &'static Location<'static>,
    },
    /// `do_return(..).when(mock)` has run; the next call on that mock
    /// becomes the template for the pre-supplied answers.
    StubbingByAnswer {
        answers: Vec<Answer>,
        mock: Arc<MockInner>,
        started_at: &'static Location<'static>,
    },
    /// `verify()` has run; the next mock call is the wanted template.
    Verifying {
        mode: Box<dyn VerificationMode>,
        started_at: &'static Location<'static>,
    },
}

struct Session {
    state: State,
    /// The most recent call's bound template, so a following `when()` can
    /// find it.  Holds the mock strongly while the slot is occupied.
    last: Option<(InvocationMatcher, Arc<MockInner>)>,
    matchers: Vec<LocalizedMatcher>,
}

thread_local! {
    static SESSION: RefCell<Session> = RefCell::new(Session {
        state: State::Idle,
        last: None,
        matchers: Vec::new(),
    });
}

pub(crate) fn push_matcher(
    matcher: Arc<dyn ArgMatcher>,
    location: &'static Location<'static>,
) {
    SESSION.with(|s| {
        s.borrow_mut().matchers.push(LocalizedMatcher { matcher, location })
    });
}

/// Drain the matcher stack.  Each intercepted call consumes the stack exactly
/// once.
pub(crate) fn take_matchers() -> Vec<LocalizedMatcher> {
    SESSION.with(|s| std::mem::take(&mut s.borrow_mut().matchers))
}

pub(crate) fn set_last(template: InvocationMatcher, mock: Arc<MockInner>) {
    SESSION.with(|s| s.borrow_mut().last = Some((template, mock)));
}

pub(crate) fn take_last() -> Option<(InvocationMatcher, Arc<MockInner>)> {
    SESSION.with(|s| s.borrow_mut().last.take())
}

pub(crate) fn replace_state(new: State) -> State {
    SESSION.with(|s| std::mem::replace(&mut s.borrow_mut().state, new))
}

/// Require that no stubbing or verification is pending.  On violation the
/// session is reset first, so the error does not cascade into the next
/// statement.
pub(crate) fn validate_idle() -> Result<(), MisuseError> {
    match replace_state(State::Idle) {
        State::Idle => Ok(()),
        State::Stubbing { started_at, .. }
        | State::StubbingByAnswer { started_at, .. } => {
            reset();
            Err(MisuseError::UnfinishedStubbing { started_at })
        }
        State::Verifying { started_at, .. } => {
            reset();
            Err(MisuseError::UnfinishedVerification { started_at })
        }
    }
}

/// Return the session to a pristine state.
pub(crate) fn reset() {
    SESSION.with(|s| {
        let mut s = s.borrow_mut();
        s.state = State::Idle;
        s.last = None;
        s.matchers.clear();
    });
}

/// Reset the session and abort with a typed error as the panic payload.
pub(crate) fn fail(err: MockError) -> ! {
    reset();
    std::panic::panic_any(err)
}
