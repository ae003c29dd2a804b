// vim: tw=80
//! Verification modes: `times`, `at_least`, `at_most`, `never`, the
//! no-(more-)interactions checks, and in-order verification.

use std::{
    panic::Location,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use crate::{
    error::{MisuseError, MockError, VerificationFailure},
    invocation::Invocation,
    matchers::InvocationMatcher,
    mock::Mocked,
    session::{self, State},
};

/// Everything a mode needs to check one verification: the mock's full
/// invocation log and the wanted template.
pub struct VerificationData {
    pub invocations: Vec<Arc<Invocation>>,
    pub wanted: InvocationMatcher,
}

/// One verification strategy.  Implementations check the data and, on
/// success, claim the matched invocations by marking them verified.
pub trait VerificationMode: Send {
    fn verify(&self, data: &VerificationData)
        -> Result<(), VerificationFailure>;
}

/// Exactly `n` matching invocations.
pub struct Times(usize);

pub fn times(n: usize) -> Times {
    Times(n)
}

/// Shortcut for [`times`]`(0)`.
pub fn never() -> Times {
    Times(0)
}

impl VerificationMode for Times {
    fn verify(&self, data: &VerificationData)
        -> Result<(), VerificationFailure>
    {
        let found = matching(data);
        if found.len() == self.0 {
            claim(&found, &data.wanted);
            Ok(())
        } else if self.0 == 0 {
            Err(VerificationFailure::NeverWantedButInvoked {
                wanted: data.wanted.to_string(),
                location: found[0].location().to_string(),
            })
        } else if found.is_empty() {
            Err(wanted_but_not_invoked(data))
        } else if found.len() < self.0 {
            Err(VerificationFailure::TooFewInvocations {
                wanted: data.wanted.to_string(),
                wanted_calls: self.0,
                actual_calls: found.len(),
                locations: locations(&found),
            })
        } else {
            Err(VerificationFailure::TooManyInvocations {
                wanted: data.wanted.to_string(),
                wanted_calls: self.0,
                actual_calls: found.len(),
                locations: locations(&found),
            })
        }
    }
}

/// At least `n` matching invocations.
pub struct AtLeast(usize);

pub fn at_least(n: usize) -> AtLeast {
    AtLeast(n)
}

impl VerificationMode for AtLeast {
    fn verify(&self, data: &VerificationData)
        -> Result<(), VerificationFailure>
    {
        let found = matching(data);
        if found.len() >= self.0 {
            claim(&found, &data.wanted);
            Ok(())
        } else if found.is_empty() {
            Err(wanted_but_not_invoked(data))
        } else {
            Err(VerificationFailure::TooFewInvocations {
                wanted: data.wanted.to_string(),
                wanted_calls: self.0,
                actual_calls: found.len(),
                locations: locations(&found),
            })
        }
    }
}

/// At most `n` matching invocations.
pub struct AtMost(usize);

pub fn at_most(n: usize) -> AtMost {
    AtMost(n)
}

impl VerificationMode for AtMost {
    fn verify(&self, data: &VerificationData)
        -> Result<(), VerificationFailure>
    {
        let found = matching(data);
        if found.len() <= self.0 {
            claim(&found, &data.wanted);
            Ok(())
        } else {
            Err(VerificationFailure::TooManyInvocations {
                wanted: data.wanted.to_string(),
                wanted_calls: self.0,
                actual_calls: found.len(),
                locations: locations(&found),
            })
        }
    }
}

fn matching<'a>(data: &'a VerificationData) -> Vec<&'a Arc<Invocation>> {
    data.invocations.iter().filter(|i| data.wanted.matches(i)).collect()
}

fn locations(found: &[&Arc<Invocation>]) -> Vec<String> {
    found.iter().map(|i| format!("invoked at {}", i.location())).collect()
}

/// Claim matched invocations: mark them verified and feed capturing
/// matchers, earliest-recorded first.
fn claim(found: &[&Arc<Invocation>], wanted: &InvocationMatcher) {
    for invocation in found {
        wanted.capture_from(invocation);
        invocation.mark_verified();
    }
}

fn wanted_but_not_invoked(data: &VerificationData) -> VerificationFailure {
    let same_method = data.invocations.iter().find(|i| {
        data.wanted.invocation().method().same_method(i.method())
    });
    VerificationFailure::WantedButNotInvoked {
        wanted: data.wanted.to_string(),
        hint: same_method.and_then(|i| data.wanted.explain_mismatch(i)),
        others: data.invocations.iter().map(|i| i.describe_at()).collect(),
    }
}

/// Begin verification: the next method call on the returned mock is the
/// wanted template, and is never recorded as an interaction.
///
/// ```
/// # use doppel::*;
/// # struct MockAdder { core: MockCore }
/// # impl Synthesized for MockAdder {
/// #     fn from_core(core: MockCore) -> Self { MockAdder { core } }
/// # }
/// # impl Mocked for MockAdder {
/// #     fn mock_core(&self) -> &MockCore { &self.core }
/// # }
/// # impl MockAdder {
/// #     fn add(&self, x: u32, y: u32) -> u32 {
/// #         self.core.invoke(MethodDesc::new::<u32>("add", 2),
/// #                          CallArgs::new().arg(x).arg(y))
/// #     }
/// # }
/// let mock: MockAdder = mock();
/// mock.add(1, 2);
/// verify(&mock, times(1)).add(eq(1), any());
/// ```
#[track_caller]
pub fn verify<M: Mocked + ?Sized>(
    mock: &M,
    mode: impl VerificationMode + 'static,
) -> &M {
    let location = Location::caller();
    if let Err(e) = session::validate_idle() {
        session::fail(MockError::Misuse(e));
    }
    let core = mock.mock_core();
    if core.is_stub_only() {
        session::fail(MockError::Misuse(MisuseError::StubOnlyMock {
            mock: core.name().to_owned(),
        }));
    }
    session::replace_state(State::Verifying {
        mode: Box::new(mode),
        started_at: location,
    });
    mock
}

/// Fail if any mock in the set has an invocation no verification claimed.
pub fn verify_no_more_interactions(mocks: &[&dyn Mocked]) {
    if let Err(e) = session::validate_idle() {
        session::fail(MockError::Misuse(e));
    }
    let mut unverified = Vec::new();
    for mock in mocks {
        let core = mock.mock_core();
        if core.is_stub_only() {
            session::fail(MockError::Misuse(MisuseError::StubOnlyMock {
                mock: core.name().to_owned(),
            }));
        }
        for invocation in core.inner().invocations().all() {
            if !invocation.is_verified() {
                unverified.push(invocation.describe_at());
            }
        }
    }
    if !unverified.is_empty() {
        session::fail(MockError::Verification(
            VerificationFailure::NoMoreInteractionsWanted { unverified },
        ));
    }
}

/// Fail if any mock in the set has any invocation at all.
pub fn verify_no_interactions(mocks: &[&dyn Mocked]) {
    if let Err(e) = session::validate_idle() {
        session::fail(MockError::Misuse(e));
    }
    let mut interactions = Vec::new();
    for mock in mocks {
        let core = mock.mock_core();
        if core.is_stub_only() {
            session::fail(MockError::Misuse(MisuseError::StubOnlyMock {
                mock: core.name().to_owned(),
            }));
        }
        for invocation in core.inner().invocations().all() {
            interactions.push(invocation.describe_at());
        }
    }
    if !interactions.is_empty() {
        session::fail(MockError::Verification(
            VerificationFailure::NoInteractionsWanted { interactions },
        ));
    }
}

/// Verifies relative ordering of calls across a fixed set of mocks.
///
/// Each successful verification advances a cursor through the global call
/// order; later verifications only accept invocations strictly after it.
///
/// ```
/// # use doppel::*;
/// # struct MockLamp { core: MockCore }
/// # impl Synthesized for MockLamp {
/// #     fn from_core(core: MockCore) -> Self { MockLamp { core } }
/// # }
/// # impl Mocked for MockLamp {
/// #     fn mock_core(&self) -> &MockCore { &self.core }
/// # }
/// # impl MockLamp {
/// #     fn on(&self) {
/// #         self.core.invoke(MethodDesc::new::<()>("on", 0), CallArgs::new())
/// #     }
/// #     fn off(&self) {
/// #         self.core.invoke(MethodDesc::new::<()>("off", 0), CallArgs::new())
/// #     }
/// # }
/// let mock: MockLamp = mock();
/// mock.on();
/// mock.off();
///
/// let io = in_order(&[&mock]);
/// io.verify(&mock).on();
/// io.verify(&mock).off();
/// ```
pub struct InOrder {
    mock_ids: Vec<u64>,
    cursor: Arc<AtomicU64>,
}

/// Create an in-order verification context over `mocks`.
pub fn in_order(mocks: &[&dyn Mocked]) -> InOrder {
    InOrder {
        mock_ids: mocks.iter().map(|m| m.mock_core().id()).collect(),
        cursor: Arc::new(AtomicU64::new(0)),
    }
}

impl InOrder {
    /// Verify the next in-order invocation; shortcut for
    /// [`verify_times`](Self::verify_times) with a count of 1.
    #[track_caller]
    pub fn verify<'m, M: Mocked + ?Sized>(&self, mock: &'m M) -> &'m M {
        self.verify_times(mock, 1)
    }

    /// Verify `n` consecutive in-order invocations.
    #[track_caller]
    pub fn verify_times<'m, M: Mocked + ?Sized>(
        &self,
        mock: &'m M,
        n: usize,
    ) -> &'m M {
        let location = Location::caller();
        if let Err(e) = session::validate_idle() {
            session::fail(MockError::Misuse(e));
        }
        let core = mock.mock_core();
        if core.is_stub_only() {
            session::fail(MockError::Misuse(MisuseError::StubOnlyMock {
                mock: core.name().to_owned(),
            }));
        }
        if !self.mock_ids.contains(&core.id()) {
            session::fail(MockError::Misuse(MisuseError::NotInOrderContext {
                mock: core.name().to_owned(),
            }));
        }
        session::replace_state(State::Verifying {
            mode: Box::new(InOrderMode {
                wanted_calls: n,
                cursor: self.cursor.clone(),
            }),
            started_at: location,
        });
        mock
    }
}

struct InOrderMode {
    wanted_calls: usize,
    cursor: Arc<AtomicU64>,
}

impl VerificationMode for InOrderMode {
    fn verify(&self, data: &VerificationData)
        -> Result<(), VerificationFailure>
    {
        // claim unverified matches FIFO; they must all lie after the cursor
        let candidates: Vec<_> = data.invocations.iter()
            .filter(|i| !i.is_verified() && data.wanted.matches(i))
            .collect();
        if candidates.len() < self.wanted_calls {
            if matching(data).is_empty() {
                return Err(wanted_but_not_invoked(data));
            }
            return Err(VerificationFailure::TooFewInvocations {
                wanted: data.wanted.to_string(),
                wanted_calls: self.wanted_calls,
                actual_calls: candidates.len(),
                locations: locations(&candidates),
            });
        }
        let consumed = &candidates[..self.wanted_calls];
        let cursor = self.cursor.load(Ordering::Relaxed);
        if consumed.iter().any(|i| i.seq() <= cursor) {
            return Err(VerificationFailure::OutOfOrder {
                wanted: data.wanted.to_string(),
            });
        }
        claim(consumed, &data.wanted);
        if let Some(last) = consumed.last() {
            self.cursor.store(last.seq(), Ordering::Relaxed);
        }
        Ok(())
    }
}
