// vim: tw=80
#![deny(warnings)]

use doppel::*;

struct MockClock {
    core: MockCore,
}

impl Synthesized for MockClock {
    fn from_core(core: MockCore) -> Self {
        MockClock { core }
    }
}

impl Mocked for MockClock {
    fn mock_core(&self) -> &MockCore {
        &self.core
    }
}

impl MockClock {
    fn now(&self) -> u64 {
        self.core
            .invoke(MethodDesc::new::<u64>("now", 0), CallArgs::new())
    }

}

fn misuse(f: impl FnOnce()) -> MisuseError {
    let e = *std::panic::catch_unwind(std::panic::AssertUnwindSafe(f))
        .expect_err("expected a mocking failure")
        .downcast::<MockError>()
        .expect("the panic payload was not a MockError");
    match e {
        MockError::Misuse(m) => m,
        MockError::Verification(v) => {
            panic!("expected a misuse error, got a verification failure: {v}")
        }
    }
}

#[test]
fn an_unfinished_stubbing_fails_the_next_statement() {
    let clock: MockClock = mock();
    when(clock.now());

    let e = misuse(|| {
        verify(&clock, times(0)).now();
    });
    assert!(matches!(e, MisuseError::UnfinishedStubbing { .. }));

    // detection resets the session, so this statement works
    when(clock.now()).then_return(5);
    assert_eq!(5, clock.now());
}

#[test]
fn an_unfinished_verification_fails_the_next_statement() {
    let clock: MockClock = mock();
    verify(&clock, times(0));

    let e = misuse(|| {
        verify_no_interactions(&[&clock]);
    });
    assert!(matches!(e, MisuseError::UnfinishedVerification { .. }));

    when(clock.now()).then_return(5);
    assert_eq!(5, clock.now());
}

#[test]
fn when_requires_a_mock_call() {
    let e = misuse(|| {
        when(42u32);
    });
    assert!(matches!(e, MisuseError::WhenRequiresMockCall));
}

#[test]
fn then_requires_a_pending_stubbing() {
    let clock: MockClock = mock();
    let pending = when(clock.now());

    // a second when() trips unfinished-stubbing detection and resets the
    // session, orphaning `pending`
    let e = misuse(|| {
        when(clock.now());
    });
    assert!(matches!(e, MisuseError::UnfinishedStubbing { .. }));

    let e = misuse(move || {
        pending.then_return(1);
    });
    assert!(matches!(e, MisuseError::NoPendingStubbing));
}

#[test]
fn stub_only_mocks_cannot_be_verified() {
    let clock: MockClock =
        mock_with(MockSettings::new().name("clock").stub_only());
    when(clock.now()).then_return(7);
    assert_eq!(7, clock.now());

    let e = misuse(|| {
        verify(&clock, times(1));
    });
    match e {
        MisuseError::StubOnlyMock { mock } => assert_eq!("clock", mock),
        other => panic!("wrong error: {other}"),
    }

    let e = misuse(|| {
        verify_no_more_interactions(&[&clock]);
    });
    assert!(matches!(e, MisuseError::StubOnlyMock { .. }));
}

#[test]
fn stub_only_mocks_cannot_be_verified_in_order() {
    let clock: MockClock =
        mock_with(MockSettings::new().name("clock").stub_only());
    when(clock.now()).then_return(7);
    // the truncated one-entry log would make any in-order check a lie
    clock.now();
    clock.now();

    let io = in_order(&[&clock]);
    let e = misuse(|| {
        io.verify(&clock);
    });
    match e {
        MisuseError::StubOnlyMock { mock } => assert_eq!("clock", mock),
        other => panic!("wrong error: {other}"),
    }

    let e = misuse(|| {
        verify_no_interactions(&[&clock]);
    });
    assert!(matches!(e, MisuseError::StubOnlyMock { .. }));
}

#[test]
fn incompatible_answers_are_rejected_at_registration() {
    let clock: MockClock = mock();

    let e = misuse(|| {
        do_return("tomorrow").when(&clock).now();
    });
    match e {
        MisuseError::IncompatibleReturnType {
            method, expected, ..
        } => {
            assert_eq!("now", method);
            assert_eq!("u64", expected);
        }
        other => panic!("wrong error: {other}"),
    }

    // the mock itself is unharmed
    assert_eq!(0, clock.now());
}

struct WrongAnswer;

impl DefaultAnswer for WrongAnswer {
    fn answer(&self, _invocation: &Invocation) -> ReturnValue {
        ReturnValue::Shared(std::sync::Arc::new("not a number"))
    }
}

#[test]
fn a_default_answer_of_the_wrong_type_is_reported() {
    let clock: MockClock =
        mock_with(MockSettings::new().default_answer(WrongAnswer));

    let e = misuse(|| {
        clock.now();
    });
    assert!(matches!(e, MisuseError::WrongTypeOfReturnValue { .. }));
}

#[test]
#[should_panic(expected = "no stub configured")]
fn panics_on_unstubbed_reports_the_call() {
    let clock: MockClock =
        mock_with(MockSettings::new().default_answer(PanicsOnUnstubbed));
    clock.now();
}
