// vim: tw=80
#![deny(warnings)]

use doppel::*;

struct MockLogger {
    core: MockCore,
}

impl Synthesized for MockLogger {
    fn from_core(core: MockCore) -> Self {
        MockLogger { core }
    }
}

impl Mocked for MockLogger {
    fn mock_core(&self) -> &MockCore {
        &self.core
    }
}

impl MockLogger {
    /// `tags` plays the role of a variadic tail.
    fn log(&self, level: u32, tags: &[String]) -> bool {
        self.core.invoke(
            MethodDesc::variadic::<bool>("log", 2),
            CallArgs::new().arg(level).tail(tags),
        )
    }
}

fn tag(s: &str) -> String {
    s.to_owned()
}

#[test]
fn per_element_matchers_see_the_expanded_tail() {
    let logger: MockLogger = mock();
    when(logger.log(eq(1), &[eq(tag("io")), eq(tag("disk"))]))
        .then_return(true);

    assert!(logger.log(1, &[tag("io"), tag("disk")]));
    assert!(!logger.log(1, &[tag("io")]));
    assert!(!logger.log(1, &[tag("disk"), tag("io")]));
}

#[test]
fn an_array_matcher_sees_the_whole_tail() {
    let logger: MockLogger = mock();
    when(logger.log(eq(1), &eq(vec![tag("io"), tag("disk")])))
        .then_return(true);

    assert!(logger.log(1, &[tag("io"), tag("disk")]));
    assert!(!logger.log(1, &[tag("io")]));
}

#[test]
fn an_empty_tail_matches_an_empty_array() {
    let logger: MockLogger = mock();
    when(logger.log(eq(2), &eq(Vec::<String>::new()))).then_return(true);

    assert!(logger.log(2, &[]));
    assert!(!logger.log(2, &[tag("io")]));
}

#[test]
fn both_forms_verify_a_single_element_tail() {
    let logger: MockLogger = mock();
    logger.log(3, &[tag("net")]);
    logger.log(3, &[tag("net")]);

    // per-element form: one matcher for the lone expanded element
    verify(&logger, times(2)).log(eq(3), &[eq(tag("net"))]);
    // array form: one matcher for the whole tail
    verify(&logger, times(2)).log(eq(3), &eq(vec![tag("net")]));
}

#[test]
fn bare_variadic_calls_match_by_equality() {
    let logger: MockLogger = mock();
    when(logger.log(4, &[tag("a"), tag("b")])).then_return(true);

    assert!(logger.log(4, &[tag("a"), tag("b")]));
    assert!(!logger.log(4, &[tag("a")]));
}
