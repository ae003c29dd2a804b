// vim: tw=80
#![deny(warnings)]

use doppel::*;

struct MockTurnstile {
    core: MockCore,
}

impl Synthesized for MockTurnstile {
    fn from_core(core: MockCore) -> Self {
        MockTurnstile { core }
    }
}

impl Mocked for MockTurnstile {
    fn mock_core(&self) -> &MockCore {
        &self.core
    }
}

impl MockTurnstile {
    fn push(&self, force: u32) {
        self.core.invoke(
            MethodDesc::new::<()>("push", 1),
            CallArgs::new().arg(force),
        )
    }

    fn coin(&self) {
        self.core
            .invoke(MethodDesc::new::<()>("coin", 0), CallArgs::new())
    }
}

fn mock_error(f: impl FnOnce()) -> MockError {
    *std::panic::catch_unwind(std::panic::AssertUnwindSafe(f))
        .expect_err("expected a mocking failure")
        .downcast::<MockError>()
        .expect("the panic payload was not a MockError")
}

fn verification_failure(f: impl FnOnce()) -> VerificationFailure {
    match mock_error(f) {
        MockError::Verification(v) => v,
        MockError::Misuse(m) => panic!("expected a verification failure, \
                                        got a misuse error: {m}"),
    }
}

#[test]
fn times_passes_on_an_exact_count() {
    let t: MockTurnstile = mock();
    t.push(1);
    t.push(2);

    verify(&t, times(2)).push(any());
    verify(&t, times(1)).push(eq(1));
    verify(&t, times(0)).coin();
    verify(&t, never()).coin();
}

#[test]
fn times_fails_on_too_few() {
    let t: MockTurnstile = mock();
    t.push(1);

    let e = verification_failure(|| {
        verify(&t, times(2)).push(any());
    });
    match e {
        VerificationFailure::TooFewInvocations {
            wanted_calls,
            actual_calls,
            locations,
            ..
        } => {
            assert_eq!(2, wanted_calls);
            assert_eq!(1, actual_calls);
            assert_eq!(1, locations.len());
        }
        other => panic!("wrong failure: {other}"),
    }
}

#[test]
fn times_fails_on_too_many() {
    let t: MockTurnstile = mock();
    t.push(1);
    t.push(1);

    let e = verification_failure(|| {
        verify(&t, times(1)).push(eq(1));
    });
    assert!(matches!(e, VerificationFailure::TooManyInvocations {
        wanted_calls: 1,
        actual_calls: 2,
        ..
    }));
}

#[test]
fn never_fails_if_invoked() {
    let t: MockTurnstile = mock();
    t.coin();

    let e = verification_failure(|| {
        verify(&t, never()).coin();
    });
    assert!(matches!(e, VerificationFailure::NeverWantedButInvoked { .. }));
}

#[test]
fn a_wanted_call_that_never_happened_names_the_nearest_miss() {
    let t: MockTurnstile = mock();
    t.push(3);

    let e = verification_failure(|| {
        verify(&t, times(1)).push(eq(4));
    });
    match e {
        VerificationFailure::WantedButNotInvoked { hint, others, .. } => {
            assert!(hint.is_some());
            assert_eq!(1, others.len());
        }
        other => panic!("wrong failure: {other}"),
    }
}

#[test]
fn at_least_and_at_most_bound_the_count() {
    let t: MockTurnstile = mock();
    t.push(1);
    t.push(1);

    verify(&t, at_least(1)).push(any());
    verify(&t, at_least(2)).push(any());
    verify(&t, at_most(2)).push(any());
    verify(&t, at_most(5)).push(any());

    let e = verification_failure(|| {
        verify(&t, at_least(3)).push(any());
    });
    assert!(matches!(e, VerificationFailure::TooFewInvocations { .. }));

    let e = verification_failure(|| {
        verify(&t, at_most(1)).push(any());
    });
    assert!(matches!(e, VerificationFailure::TooManyInvocations { .. }));
}

#[test]
fn the_verification_template_is_not_an_interaction() {
    let t: MockTurnstile = mock();
    t.coin();

    verify(&t, times(1)).coin();
    verify(&t, times(1)).coin();
}

#[test]
fn no_more_interactions_requires_every_call_claimed() {
    let t: MockTurnstile = mock();
    t.coin();
    t.push(1);

    verify(&t, times(1)).coin();
    let e = verification_failure(|| {
        verify_no_more_interactions(&[&t]);
    });
    match e {
        VerificationFailure::NoMoreInteractionsWanted { unverified } => {
            assert_eq!(1, unverified.len());
        }
        other => panic!("wrong failure: {other}"),
    }

    verify(&t, times(1)).push(any());
    verify_no_more_interactions(&[&t]);
}

#[test]
fn no_interactions_rejects_any_call_at_all() {
    let quiet: MockTurnstile = mock();
    let busy: MockTurnstile = mock();
    busy.coin();

    verify_no_interactions(&[&quiet]);
    let e = verification_failure(|| {
        verify_no_interactions(&[&quiet, &busy]);
    });
    assert!(matches!(
        e,
        VerificationFailure::NoInteractionsWanted { .. }
    ));
}

#[test]
fn cleared_invocations_are_forgotten() {
    let t: MockTurnstile = mock();
    when(t.push(any())).then_return(());
    t.push(1);

    clear_invocations(&[&t]);
    verify(&t, never()).push(any());
    verify_no_interactions(&[&t]);

    // stubbings survive the clearing
    t.push(1);
    verify(&t, times(1)).push(any());
}

#[test]
fn reset_forgets_stubbings_and_invocations() {
    let t: MockTurnstile = mock();
    when(t.push(any())).then_return(());
    t.coin();

    // without the reset, the unused strict stub and the recorded coin()
    // would each fail below
    reset(&t);
    verify_no_interactions(&[&t]);
    verify_no_unused_stubs(&[&t]);
}
