// vim: tw=80
#![deny(warnings)]

use doppel::*;

struct MockFuse {
    core: MockCore,
}

impl Synthesized for MockFuse {
    fn from_core(core: MockCore) -> Self {
        MockFuse { core }
    }
}

impl Mocked for MockFuse {
    fn mock_core(&self) -> &MockCore {
        &self.core
    }
}

impl MockFuse {
    fn state(&self, line: u32) -> u32 {
        self.core.invoke(
            MethodDesc::new::<u32>("state", 1),
            CallArgs::new().arg(line),
        )
    }
}

#[test]
fn stubs_without_calling_through() {
    let fuse: MockFuse = mock();
    when(fuse.state(any())).then_panic("blown");

    // when(fuse.state(..)) here would trip the panicking stub; the
    // answer-first form never consults existing answers
    do_return(7u32).when(&fuse).state(any());

    assert_eq!(7, fuse.state(1));
}

#[test]
fn the_template_is_not_an_interaction() {
    let fuse: MockFuse = mock();
    do_return(7u32).when(&fuse).state(any());

    verify(&fuse, never()).state(any());
    assert_eq!(7, fuse.state(1));
    verify(&fuse, times(1)).state(any());
}

#[test]
fn chains_consecutive_answers() {
    let fuse: MockFuse = mock();
    do_return(1u32).do_return(2u32).when(&fuse).state(eq(0));

    assert_eq!(1, fuse.state(0));
    assert_eq!(2, fuse.state(0));
    assert_eq!(2, fuse.state(0));
    assert_eq!(0, fuse.state(5));
}

#[test]
#[should_panic(expected = "tripped")]
fn do_panic_installs_a_panicking_answer() {
    let fuse: MockFuse = mock();
    do_panic("tripped").when(&fuse).state(any());

    fuse.state(1);
}

#[test]
fn later_answer_first_stubs_shadow_earlier_ones() {
    let fuse: MockFuse = mock();
    do_return(1u32).when(&fuse).state(any());
    do_return(2u32).when(&fuse).state(eq(9));

    assert_eq!(2, fuse.state(9));
    assert_eq!(1, fuse.state(3));
}
