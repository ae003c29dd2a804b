// vim: tw=80
#![deny(warnings)]

use doppel::*;

struct MockFeed {
    core: MockCore,
}

impl Synthesized for MockFeed {
    fn from_core(core: MockCore) -> Self {
        MockFeed { core }
    }
}

impl Mocked for MockFeed {
    fn mock_core(&self) -> &MockCore {
        &self.core
    }
}

impl MockFeed {
    fn fetch(&self, id: u32) -> u32 {
        self.core.invoke(
            MethodDesc::new::<u32>("fetch", 1),
            CallArgs::new().arg(id),
        )
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
fn used_stubs_pass() {
    let feed: MockFeed = mock();
    when(feed.fetch(eq(1))).then_return(10);

    assert_eq!(10, feed.fetch(1));
    verify_no_unused_stubs(&[&feed]);
}

#[test]
fn unused_strict_stubs_are_reported_as_one_batch() {
    let feed: MockFeed = mock();
    when(feed.fetch(eq(1))).then_return(10);
    when(feed.fetch(eq(2))).then_return(20);

    let e = misuse(|| {
        verify_no_unused_stubs(&[&feed]);
    });
    match e {
        MisuseError::UnusedStubbings { stubs } => assert_eq!(2, stubs.len()),
        other => panic!("wrong error: {other}"),
    }
}

#[test]
fn lenient_stubs_are_exempt() {
    let feed: MockFeed = mock_with(MockSettings::new().lenient());
    when(feed.fetch(eq(1))).then_return(10);

    verify_no_unused_stubs(&[&feed]);
}

#[test]
fn strictness_is_sampled_per_stub() {
    // a stub keeps the strictness its mock had when it was registered
    let strict: MockFeed = mock_with(MockSettings::new().strict());
    let lenient: MockFeed = mock_with(MockSettings::new().lenient());
    when(strict.fetch(eq(1))).then_return(1);
    when(lenient.fetch(eq(1))).then_return(1);

    let e = misuse(|| {
        verify_no_unused_stubs(&[&strict, &lenient]);
    });
    match e {
        MisuseError::UnusedStubbings { stubs } => assert_eq!(1, stubs.len()),
        other => panic!("wrong error: {other}"),
    }
}
