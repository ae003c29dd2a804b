// vim: tw=80
//! A stub-then-verify mock object library for Rust.
//!
//! Doppel mocks are interrogated *after* the code under test has run: first
//! stub the methods the code needs, run it, then verify the interactions you
//! care about.  Everything else is ignored.
//!
//! The basic idea:
//! * Create a mock struct: a plain struct holding a [`MockCore`] whose
//!   methods forward to [`MockCore::invoke`].
//! * Stub return values with [`when`]: `when(mock.load(eq(7)))
//!   .then_return(v)`.
//! * Hand the mock to the code under test.  Unstubbed calls answer with the
//!   return type's `Default` value; every call is recorded.
//! * Verify with [`verify`]: `verify(&mock, times(1)).load(any())`.
//!
//! # User Guide
//!
//! * [`Mock structs`](#mock-structs)
//! * [`Stubbing`](#stubbing)
//! * [`Matching arguments`](#matching-arguments)
//! * [`Consecutive answers`](#consecutive-answers)
//! * [`Verification`](#verification)
//! * [`Verifying order`](#verifying-order)
//! * [`Capturing arguments`](#capturing-arguments)
//! * [`Mock settings`](#mock-settings)
//! * [`Failures`](#failures)
//! * [`Multiple threads`](#multiple-threads)
//!
//! ## Mock structs
//!
//! A mock struct embeds a [`MockCore`] and forwards each method through it,
//! describing the method's shape with a [`MethodDesc`] and erasing its
//! arguments with [`CallArgs`]:
//!
//! ```
//! use doppel::*;
//!
//! struct MockStore {
//!     core: MockCore,
//! }
//! impl Synthesized for MockStore {
//!     fn from_core(core: MockCore) -> Self {
//!         MockStore { core }
//!     }
//! }
//! impl Mocked for MockStore {
//!     fn mock_core(&self) -> &MockCore {
//!         &self.core
//!     }
//! }
//! impl MockStore {
//!     fn get(&self, key: String) -> u32 {
//!         self.core.invoke(MethodDesc::new::<u32>("get", 1),
//!                          CallArgs::new().arg(key))
//!     }
//! }
//!
//! let store: MockStore = mock();
//! when(store.get(eq("hits".to_owned()))).then_return(3);
//!
//! assert_eq!(3, store.get("hits".to_owned()));
//! assert_eq!(0, store.get("misses".to_owned()));
//! verify(&store, times(2)).get(any());
//! ```
//!
//! Return types must be `Default + Clone + 'static`.  Methods returning
//! references can't be mocked this way; return an owned value instead.
//!
//! ## Stubbing
//!
//! [`when`] wraps a call on the mock.  The wrapped call is intercepted and
//! becomes a template; it never reaches any previously programmed answer.
//! Attach answers with `then_return`, `then_return_once` (for values that
//! aren't `Clone`), `then_panic`, or `then_answer` (compute the value from
//! the [`Invocation`]).
//!
//! Later stubs shadow earlier ones whenever both match a call.  To stub a
//! method whose *current* answer panics, or to keep the staged call out of
//! the interaction record entirely, use the answer-first form:
//!
//! ```
//! # use doppel::*;
//! # struct MockStore { core: MockCore }
//! # impl Synthesized for MockStore {
//! #     fn from_core(core: MockCore) -> Self { MockStore { core } }
//! # }
//! # impl Mocked for MockStore {
//! #     fn mock_core(&self) -> &MockCore { &self.core }
//! # }
//! # impl MockStore {
//! #     fn get(&self, key: String) -> u32 {
//! #         self.core.invoke(MethodDesc::new::<u32>("get", 1),
//! #                          CallArgs::new().arg(key))
//! #     }
//! # }
//! let store: MockStore = mock();
//! do_return(7u32).when(&store).get(any());
//! assert_eq!(7, store.get("hits".to_owned()));
//! ```
//!
//! An answer whose type disagrees with the method's declared return type is
//! rejected when the stub is registered, not when the call arrives.
//!
//! ## Matching arguments
//!
//! Matcher functions are used in argument position inside a `when` or
//! `verify` template.  [`eq`] matches by equality, [`any`] matches anything
//! of the right type, [`arg_that`] takes a closure, and [`matching`] accepts
//! any [`Predicate`] from the `predicates` crate.  A template with no
//! matchers at all compares every argument by equality.  Mixing is not
//! allowed: use matchers for all of a call's arguments or for none of them.
//!
//! For a method whose final parameter is declared variadic
//! ([`MethodDesc::variadic`]), supply either one matcher per expanded
//! element or a single matcher for the whole tail in array form.
//!
//! ## Consecutive answers
//!
//! Chained `then_*` calls build a queue.  Each matching call consumes the
//! next answer; the last one repeats forever:
//!
//! ```
//! # use doppel::*;
//! # struct MockStore { core: MockCore }
//! # impl Synthesized for MockStore {
//! #     fn from_core(core: MockCore) -> Self { MockStore { core } }
//! # }
//! # impl Mocked for MockStore {
//! #     fn mock_core(&self) -> &MockCore { &self.core }
//! # }
//! # impl MockStore {
//! #     fn get(&self, key: String) -> u32 {
//! #         self.core.invoke(MethodDesc::new::<u32>("get", 1),
//! #                          CallArgs::new().arg(key))
//! #     }
//! # }
//! let store: MockStore = mock();
//! when(store.get(any())).then_return(1).then_return(2);
//! assert_eq!(1, store.get("k".to_owned()));
//! assert_eq!(2, store.get("k".to_owned()));
//! assert_eq!(2, store.get("k".to_owned()));
//! ```
//!
//! ## Verification
//!
//! [`verify`] takes a [`VerificationMode`]: [`times`], [`never`],
//! [`at_least`], or [`at_most`].  The method call following `verify` is the
//! wanted template; it is not recorded as an interaction and returns the
//! type's default value.  [`verify_no_more_interactions`] fails if any
//! recorded call was never claimed by a verification, and
//! [`verify_no_interactions`] fails on any recorded call at all.
//!
//! ## Verifying order
//!
//! [`in_order`] checks that calls happened in a given relative order, across
//! any number of mocks:
//!
//! ```
//! # use doppel::*;
//! # struct MockStore { core: MockCore }
//! # impl Synthesized for MockStore {
//! #     fn from_core(core: MockCore) -> Self { MockStore { core } }
//! # }
//! # impl Mocked for MockStore {
//! #     fn mock_core(&self) -> &MockCore { &self.core }
//! # }
//! # impl MockStore {
//! #     fn get(&self, key: String) -> u32 {
//! #         self.core.invoke(MethodDesc::new::<u32>("get", 1),
//! #                          CallArgs::new().arg(key))
//! #     }
//! # }
//! let store: MockStore = mock();
//! store.get("a".to_owned());
//! store.get("b".to_owned());
//!
//! let io = in_order(&[&store]);
//! io.verify(&store).get(eq("a".to_owned()));
//! io.verify(&store).get(eq("b".to_owned()));
//! ```
//!
//! ## Capturing arguments
//!
//! An [`ArgumentCaptor`] records the arguments a verified position matched,
//! in call order, for assertions too awkward to express as a matcher.
//!
//! ## Mock settings
//!
//! [`mock_with`] takes [`MockSettings`]: a display name for failure
//! messages, a [`Strictness`], `stub_only` (no interaction record, cannot be
//! verified), and a pluggable [`DefaultAnswer`] for unstubbed calls
//! ([`ReturnsDefaults`] or [`PanicsOnUnstubbed`]).
//! [`verify_no_unused_stubs`] reports, as one batch, every strict stubbing
//! that no call ever used.
//!
//! ## Failures
//!
//! All failures panic, with a [`MockError`] as the panic payload: a
//! [`MisuseError`] when the API itself was misused and a
//! [`VerificationFailure`] when an assertion did not hold.  Tests that need
//! to distinguish them can downcast the payload instead of string-matching
//! the message.  Raising either kind resets the thread's stubbing state, so
//! one failure does not cascade into later statements.
//!
//! ## Multiple threads
//!
//! Mocks may be shared across threads; invocation records and stub lookups
//! are internally synchronized.  Stubbing and verification chains, though,
//! are thread-local: finish a `when` or `verify` on the thread that started
//! it.

mod error;
mod invocation;
mod matchers;
mod mock;
mod session;
mod stubbing;
mod verification;

pub use predicates::prelude::{predicate, Predicate};

pub use crate::{
    error::{MisuseError, MockError, VerificationFailure},
    invocation::{ArgValue, ArgumentValue, CallArgs, Invocation, MethodDesc},
    matchers::{
        any, arg_that, eq, matching, ArgMatcher, ArgumentCaptor,
        InvocationMatcher,
    },
    mock::{
        clear_invocations, mock, mock_with, reset, DefaultAnswer, MockCore,
        MockSettings, Mocked, PanicsOnUnstubbed, ReturnsDefaults, Strictness,
        Synthesized,
    },
    stubbing::{
        do_panic, do_return, verify_no_unused_stubs, when, OngoingStubbing,
        ReturnValue, Stubber, Stubbing,
    },
    verification::{
        at_least, at_most, in_order, never, times, verify,
        verify_no_interactions, verify_no_more_interactions, AtLeast, AtMost,
        InOrder, Times, VerificationData, VerificationMode,
    },
};
