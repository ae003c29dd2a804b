// vim: tw=80
//! Mock construction and the call dispatcher.
//!
//! A mock type is any struct holding a [`MockCore`] whose methods forward to
//! [`MockCore::invoke`].  The dispatcher is the single interception point:
//! depending on the thread's session state an intercepted call is answered
//! from a stub, becomes a stubbing template, or becomes a verification
//! template.

use std::{
    panic::Location,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use crate::{
    error::{MisuseError, MockError},
    invocation::{CallArgs, Invocation, InvocationLog, MethodDesc},
    matchers::InvocationMatcher,
    session::{self, LocalizedMatcher, State},
    stubbing::{ReturnValue, Stubbing, StubbingRegistry},
    verification::VerificationData,
};

static NEXT_MOCK_ID: AtomicU64 = AtomicU64::new(1);

/// How strongly a mock polices its stubbings.
///
/// Sampled when a stub is registered; see [`verify_no_unused_stubs`]
/// (crate::verify_no_unused_stubs).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Strictness {
    /// Unused stubbings are reported at teardown.  The default.
    Strict,
    /// Unused stubbings are tolerated.
    Lenient,
}

/// The answer for calls no stub matches.
pub trait DefaultAnswer: Send + Sync {
    fn answer(&self, invocation: &Invocation) -> ReturnValue;
}

/// Answer unstubbed calls with the return type's `Default` value.  The
/// default strategy.
pub struct ReturnsDefaults;

impl DefaultAnswer for ReturnsDefaults {
    fn answer(&self, _invocation: &Invocation) -> ReturnValue {
        ReturnValue::Default
    }
}

/// Panic on any unstubbed call, for tests that want every interaction
/// spelled out.
pub struct PanicsOnUnstubbed;

impl DefaultAnswer for PanicsOnUnstubbed {
    fn answer(&self, invocation: &Invocation) -> ReturnValue {
        ReturnValue::Panics(format!("{invocation}: no stub configured"))
    }
}

/// Builder-style construction options for [`mock_with`].
///
/// ```
/// # use doppel::*;
/// # struct MockCache { core: MockCore }
/// # impl Synthesized for MockCache {
/// #     fn from_core(core: MockCore) -> Self { MockCache { core } }
/// # }
/// # impl Mocked for MockCache {
/// #     fn mock_core(&self) -> &MockCore { &self.core }
/// # }
/// let mock: MockCache = mock_with(
///     MockSettings::new().name("cache").lenient()
/// );
/// ```
pub struct MockSettings {
    name: Option<String>,
    strictness: Strictness,
    stub_only: bool,
    default_answer: Arc<dyn DefaultAnswer>,
}

impl Default for MockSettings {
    fn default() -> Self {
        MockSettings {
            name: None,
            strictness: Strictness::Strict,
            stub_only: false,
            default_answer: Arc::new(ReturnsDefaults),
        }
    }
}

impl MockSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the mock in failure messages, instead of `mock#N`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Exempt this mock's future stubbings from unused-stub reporting.
    pub fn lenient(mut self) -> Self {
        self.strictness = Strictness::Lenient;
        self
    }

    pub fn strict(mut self) -> Self {
        self.strictness = Strictness::Strict;
        self
    }

    /// A stub-only mock never records interactions beyond the most recent
    /// one, and may not be verified.  Cheap when a test stubs heavily but
    /// verifies nothing.
    pub fn stub_only(mut self) -> Self {
        self.stub_only = true;
        self
    }

    /// Replace the strategy answering unstubbed calls.
    pub fn default_answer(
        mut self,
        answer: impl DefaultAnswer + 'static,
    ) -> Self {
        self.default_answer = Arc::new(answer);
        self
    }

    pub fn strictness(&self) -> Strictness {
        self.strictness
    }
}

/// The shared state behind one mock: identity, settings, the invocation log,
/// and the stubbing registry.
pub(crate) struct MockInner {
    id: u64,
    name: String,
    settings: MockSettings,
    invocations: InvocationLog,
    stubbings: StubbingRegistry,
}

impl MockInner {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn settings(&self) -> &MockSettings {
        &self.settings
    }

    pub(crate) fn invocations(&self) -> &InvocationLog {
        &self.invocations
    }

    pub(crate) fn stubbings(&self) -> &StubbingRegistry {
        &self.stubbings
    }
}

/// The interception core a mock struct embeds.  Every mocked method forwards
/// its erased arguments here.
pub struct MockCore {
    inner: Arc<MockInner>,
}

impl MockCore {
    fn with_settings(settings: MockSettings) -> Self {
        let id = NEXT_MOCK_ID.fetch_add(1, Ordering::Relaxed);
        let name = match &settings.name {
            Some(name) => name.clone(),
            None => format!("mock#{id}"),
        };
        let stub_only = settings.stub_only;
        MockCore {
            inner: Arc::new(MockInner {
                id,
                name,
                settings,
                invocations: InvocationLog::new(stub_only),
                stubbings: StubbingRegistry::new(),
            }),
        }
    }

    pub(crate) fn inner(&self) -> &Arc<MockInner> {
        &self.inner
    }

    pub(crate) fn id(&self) -> u64 {
        self.inner.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.inner.name
    }

    pub(crate) fn is_stub_only(&self) -> bool {
        self.inner.settings.stub_only
    }

    /// Intercept one call.
    ///
    /// In the idle state the call is recorded and answered, from the
    /// newest-registered matching stub or else from the default-answer
    /// strategy.  With a verification pending, the call is the wanted
    /// template and is not recorded.  With an answer-first stubbing pending,
    /// the call is the stub's template, neither recorded nor answered from
    /// existing stubs.  With a `when()` pending, the call re-stages the
    /// pending template.
    #[track_caller]
    pub fn invoke<R>(&self, method: MethodDesc, args: CallArgs) -> R
        where R: Default + Clone + 'static
    {
        let location = Location::caller();
        let matchers = session::take_matchers();
        let invocation =
            Arc::new(Invocation::new(&self.inner, method, args, location));
        match session::replace_state(State::Idle) {
            State::Verifying { mode, .. } => {
                let wanted = bind(invocation, matchers);
                let data = VerificationData {
                    invocations: self.inner.invocations.all(),
                    wanted,
                };
                if let Err(e) = mode.verify(&data) {
                    session::fail(MockError::Verification(e));
                }
                R::default()
            }
            State::StubbingByAnswer {
                answers,
                mock,
                started_at,
            } => {
                if !Arc::ptr_eq(&mock, &self.inner) {
                    session::fail(MockError::Misuse(
                        MisuseError::UnfinishedStubbing { started_at },
                    ));
                }
                for answer in &answers {
                    if let Err(e) = answer.validate_for(invocation.method()) {
                        session::fail(MockError::Misuse(e));
                    }
                }
                let template = bind(invocation, matchers);
                self.inner.stubbings.add(Arc::new(Stubbing::new(
                    template,
                    answers,
                    self.inner.settings.strictness,
                    started_at,
                )));
                R::default()
            }
            State::Stubbing { started_at, .. } => {
                // the latest call wins the pending template
                self.inner.invocations.record(invocation.clone());
                let template = bind(invocation, matchers);
                session::replace_state(State::Stubbing {
                    template,
                    mock: self.inner.clone(),
                    started_at,
                });
                R::default()
            }
            State::Idle => {
                self.inner.invocations.record(invocation.clone());
                let template = bind(invocation.clone(), matchers);
                session::set_last(template, self.inner.clone());
                invocation.mark_checked_for_stub();
                let value =
                    match self.inner.stubbings.find_answer_for(&invocation) {
                        Some(stubbing) => {
                            invocation.link_stubbing(&stubbing);
                            stubbing.answer(&invocation)
                        }
                        None => self
                            .inner
                            .settings
                            .default_answer
                            .answer(&invocation),
                    };
                finish(value, invocation.method())
            }
        }
    }
}

/// Bind the drained matcher stack to an intercepted call, failing with a
/// misuse error that names each matcher's creation site when the counts do
/// not fit.
fn bind(
    invocation: Arc<Invocation>,
    matchers: Vec<LocalizedMatcher>,
) -> InvocationMatcher {
    let locations: Vec<String> =
        matchers.iter().map(|m| m.location.to_string()).collect();
    let matchers = matchers.into_iter().map(|m| m.matcher).collect();
    match InvocationMatcher::bind(invocation, matchers) {
        Ok(template) => template,
        Err(e) => session::fail(MockError::Misuse(
            MisuseError::MisplacedMatchers {
                expected: e.expected,
                recorded: e.recorded,
                locations,
            },
        )),
    }
}

/// Convert a produced [`ReturnValue`] into the method's concrete return
/// type.
fn finish<R>(value: ReturnValue, method: &MethodDesc) -> R
    where R: Default + Clone + 'static
{
    match value {
        ReturnValue::Default => R::default(),
        ReturnValue::Shared(v) => match v.downcast_ref::<R>() {
            Some(v) => v.clone(),
            None => wrong_type(method),
        },
        ReturnValue::Owned(v) => match v.downcast::<R>() {
            Ok(v) => *v,
            Err(_) => wrong_type(method),
        },
        ReturnValue::Panics(message) => {
            session::reset();
            panic!("{}", message)
        }
    }
}

fn wrong_type<R>(method: &MethodDesc) -> R {
    session::fail(MockError::Misuse(MisuseError::WrongTypeOfReturnValue {
        method: method.name().to_owned(),
        expected: method.return_type_name(),
    }))
}

/// Implemented by every mock struct; hands the framework its [`MockCore`].
pub trait Mocked {
    fn mock_core(&self) -> &MockCore;
}

/// Implemented by mock structs constructible through [`mock`] and
/// [`mock_with`].
pub trait Synthesized {
    fn from_core(core: MockCore) -> Self;
}

/// Create a mock with default settings.
pub fn mock<M: Synthesized>() -> M {
    mock_with(MockSettings::new())
}

/// Create a mock with explicit [`MockSettings`].
pub fn mock_with<M: Synthesized>(settings: MockSettings) -> M {
    M::from_core(MockCore::with_settings(settings))
}

/// Forget a mock's stubbings and recorded invocations, as if freshly
/// created.
pub fn reset<M: Mocked + ?Sized>(mock: &M) {
    let inner = mock.mock_core().inner();
    inner.stubbings.clear();
    inner.invocations.clear();
}

/// Forget recorded invocations while keeping stubbings in place.  Useful
/// when a test exercises heavy setup it has no interest in verifying.
pub fn clear_invocations(mocks: &[&dyn Mocked]) {
    for mock in mocks {
        mock.mock_core().inner().invocations.clear();
    }
}
