// vim: tw=80
#![deny(warnings)]

use doppel::*;
use pretty_assertions::assert_eq;

struct MockMailer {
    core: MockCore,
}

impl Synthesized for MockMailer {
    fn from_core(core: MockCore) -> Self {
        MockMailer { core }
    }
}

impl Mocked for MockMailer {
    fn mock_core(&self) -> &MockCore {
        &self.core
    }
}

impl MockMailer {
    fn send(&self, to: String, body: String) {
        self.core.invoke(
            MethodDesc::new::<()>("send", 2),
            CallArgs::new().arg(to).arg(body),
        )
    }
}

#[test]
fn captures_every_matched_argument_in_call_order() {
    let mailer: MockMailer = mock();
    mailer.send("a@example.com".into(), "hi".into());
    mailer.send("b@example.com".into(), "bye".into());

    let to = ArgumentCaptor::<String>::new();
    verify(&mailer, times(2)).send(to.capture(), any());

    assert_eq!("b@example.com", to.value());
    assert_eq!(
        vec!["a@example.com".to_owned(), "b@example.com".to_owned()],
        to.values()
    );
}

#[test]
fn captures_nothing_from_unmatched_invocations() {
    let mailer: MockMailer = mock();
    mailer.send("a@example.com".into(), "hi".into());
    mailer.send("b@example.com".into(), "bye".into());

    let body = ArgumentCaptor::<String>::new();
    verify(&mailer, times(1))
        .send(eq("b@example.com".to_owned()), body.capture());

    assert_eq!(vec!["bye".to_owned()], body.values());
}

#[test]
fn captors_also_work_in_stubbing_templates() {
    let mailer: MockMailer = mock();
    let body = ArgumentCaptor::<String>::new();
    when(mailer.send(any(), body.capture())).then_return(());

    mailer.send("a@example.com".into(), "one".into());
    mailer.send("a@example.com".into(), "two".into());

    assert_eq!(vec!["one".to_owned(), "two".to_owned()], body.values());
}
