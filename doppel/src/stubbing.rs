// vim: tw=80
//! Stub registration and lookup: `when(...)`, `do_return(...)`, and the
//! per-mock registry of programmed answers.

use std::{
    any::{self, TypeId},
    fmt,
    marker::PhantomData,
    panic::Location,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use fragile::Fragile;

use crate::{
    error::{MisuseError, MockError},
    invocation::{Invocation, MethodDesc},
    matchers::InvocationMatcher,
    mock::{Mocked, Strictness},
    session::{self, State},
};

/// What a stub (or a default-answer strategy) produced for one call.
pub enum ReturnValue {
    /// Use the return type's `Default` value.
    Default,
    /// A constant, cloned out for each call.
    Shared(Arc<dyn any::Any + Send + Sync>),
    /// A freshly computed or one-shot value.
    Owned(Box<dyn any::Any + Send>),
    /// Panic with this message at the call site.
    Panics(String),
}

enum AnswerKind {
    Const(Arc<dyn any::Any + Send + Sync>),
    Once(Mutex<Option<Box<dyn any::Any + Send>>>),
    Func(Mutex<Box<dyn FnMut(&Invocation) -> Box<dyn any::Any + Send> + Send>>),
    Panics(String),
}

/// One programmed answer in a stub's consecutive-answer queue.
pub struct Answer {
    kind: AnswerKind,
    /// The produced value's type, when known statically.  Checked eagerly
    /// against the method descriptor at registration.
    value_type: Option<(TypeId, &'static str)>,
}

impl Answer {
    pub(crate) fn constant<T: Send + Sync + 'static>(value: T) -> Self {
        Answer {
            kind: AnswerKind::Const(Arc::new(value)),
            value_type: Some((TypeId::of::<T>(), any::type_name::<T>())),
        }
    }

    pub(crate) fn once<T: Send + 'static>(value: T) -> Self {
        Answer {
            kind: AnswerKind::Once(Mutex::new(Some(Box::new(value)))),
            value_type: Some((TypeId::of::<T>(), any::type_name::<T>())),
        }
    }

    pub(crate) fn func<T, F>(mut f: F) -> Self
        where F: FnMut(&Invocation) -> T + Send + 'static,
              T: Send + 'static
    {
        Answer {
            kind: AnswerKind::Func(Mutex::new(Box::new(move |inv| {
                Box::new(f(inv)) as Box<dyn any::Any + Send>
            }))),
            value_type: Some((TypeId::of::<T>(), any::type_name::<T>())),
        }
    }

    /// Like [`Answer::func`], for closures that aren't `Send`.  It is a
    /// runtime error to invoke the stub from a different thread than the one
    /// that registered it.
    pub(crate) fn func_st<T, F>(f: F) -> Self
        where F: FnMut(&Invocation) -> T + 'static,
              T: Send + 'static
    {
        let mut fragile = Fragile::new(f);
        Answer {
            kind: AnswerKind::Func(Mutex::new(Box::new(move |inv| {
                Box::new((fragile.get_mut())(inv)) as Box<dyn any::Any + Send>
            }))),
            value_type: Some((TypeId::of::<T>(), any::type_name::<T>())),
        }
    }

    pub(crate) fn panics(message: String) -> Self {
        Answer {
            kind: AnswerKind::Panics(message),
            value_type: None,
        }
    }

    /// Reject an answer whose value type disagrees with the method's return
    /// type, before any call ever uses the stub.
    pub(crate) fn validate_for(&self, method: &MethodDesc)
        -> Result<(), MisuseError>
    {
        match self.value_type {
            Some((tid, tname)) if tid != method.return_type() => {
                Err(MisuseError::IncompatibleReturnType {
                    method: method.name().to_owned(),
                    expected: method.return_type_name(),
                    actual: tname,
                })
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn call(&self, invocation: &Invocation) -> ReturnValue {
        match &self.kind {
            AnswerKind::Const(v) => ReturnValue::Shared(v.clone()),
            AnswerKind::Once(slot) => match slot.lock().unwrap().take() {
                Some(v) => ReturnValue::Owned(v),
                None => ReturnValue::Panics(String::from(
                    "a one-shot answer was consumed twice",
                )),
            },
            AnswerKind::Func(f) => {
                ReturnValue::Owned((f.lock().unwrap())(invocation))
            }
            AnswerKind::Panics(message) => {
                ReturnValue::Panics(message.clone())
            }
        }
    }
}

/// A programmed answer queue bound to an invocation template.
pub struct Stubbing {
    template: InvocationMatcher,
    answers: Mutex<Vec<Arc<Answer>>>,
    cursor: AtomicUsize,
    strictness: Strictness,
    used: AtomicBool,
    defined_at: &'static Location<'static>,
    last_used_at: Mutex<Option<&'static Location<'static>>>,
}

impl Stubbing {
    pub(crate) fn new(
        template: InvocationMatcher,
        answers: Vec<Answer>,
        strictness: Strictness,
        defined_at: &'static Location<'static>,
    ) -> Self {
        Stubbing {
            template,
            answers: Mutex::new(answers.into_iter().map(Arc::new).collect()),
            cursor: AtomicUsize::new(0),
            strictness,
            used: AtomicBool::new(false),
            defined_at,
            last_used_at: Mutex::new(None),
        }
    }

    pub(crate) fn template(&self) -> &InvocationMatcher {
        &self.template
    }

    pub(crate) fn push_answer(&self, answer: Answer) {
        self.answers.lock().unwrap().push(Arc::new(answer));
    }

    pub(crate) fn matches(&self, invocation: &Invocation) -> bool {
        self.template.matches(invocation)
    }

    /// Produce this stub's next answer, advancing the consecutive-answer
    /// queue and holding on the last entry once exhausted.
    pub(crate) fn answer(&self, invocation: &Invocation) -> ReturnValue {
        self.used.store(true, Ordering::Relaxed);
        *self.last_used_at.lock().unwrap() = Some(invocation.location());
        self.template.capture_from(invocation);
        let answer = {
            let answers = self.answers.lock().unwrap();
            let idx = self.cursor.fetch_add(1, Ordering::Relaxed)
                .min(answers.len() - 1);
            answers[idx].clone()
        };
        answer.call(invocation)
    }

    pub fn was_used(&self) -> bool {
        self.used.load(Ordering::Relaxed)
    }

    pub fn strictness(&self) -> Strictness {
        self.strictness
    }

    pub fn defined_at(&self) -> &'static Location<'static> {
        self.defined_at
    }

    pub fn last_used_at(&self) -> Option<&'static Location<'static>> {
        *self.last_used_at.lock().unwrap()
    }

    pub(crate) fn describe(&self) -> String {
        format!("{} stubbed at {}", self.template, self.defined_at)
    }
}

impl fmt::Display for Stubbing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.template.fmt(f)
    }
}

/// The per-mock collection of stubbings.
///
/// Stored oldest-first; lookups scan newest-first so a later stub with the
/// same template overrides an earlier, more general one.
pub(crate) struct StubbingRegistry {
    stubs: Mutex<Vec<Arc<Stubbing>>>,
}

impl StubbingRegistry {
    pub(crate) fn new() -> Self {
        StubbingRegistry {
            stubs: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn add(&self, stubbing: Arc<Stubbing>) {
        self.stubs.lock().unwrap().push(stubbing);
    }

    /// The first stub, newest-first, whose template matches.
    pub(crate) fn find_answer_for(&self, invocation: &Invocation)
        -> Option<Arc<Stubbing>>
    {
        self.stubs.lock().unwrap().iter().rev()
            .find(|s| s.matches(invocation))
            .cloned()
    }

    /// All stubbings, oldest-first.  Unused-stub reports read this order.
    pub(crate) fn ascending(&self) -> Vec<Arc<Stubbing>> {
        self.stubs.lock().unwrap().clone()
    }

    pub(crate) fn clear(&self) {
        self.stubs.lock().unwrap().clear();
    }
}

/// Fluent continuation returned by [`when`].  Chained `then_*` calls build
/// the stub's consecutive-answer queue.
pub struct OngoingStubbing<T> {
    stubbing: Option<Arc<Stubbing>>,
    _ret: PhantomData<fn(T)>,
}

impl<T: 'static> OngoingStubbing<T> {
    /// Answer matching calls with a constant.
    pub fn then_return(self, value: T) -> Self
        where T: Send + Sync + 'static
    {
        self.attach(Answer::constant(value))
    }

    /// Answer exactly one matching call with a value that needn't be
    /// `Clone`.  A second call reaching this answer panics.
    pub fn then_return_once(self, value: T) -> Self
        where T: Send + 'static
    {
        self.attach(Answer::once(value))
    }

    /// Panic with `message` when a matching call arrives.
    pub fn then_panic(self, message: impl Into<String>) -> Self {
        self.attach(Answer::panics(message.into()))
    }

    /// Compute the answer from the intercepted invocation.
    pub fn then_answer<F>(self, f: F) -> Self
        where F: FnMut(&Invocation) -> T + Send + 'static,
              T: Send + 'static
    {
        self.attach(Answer::func(f))
    }

    /// Single-threaded version of [`then_answer`](Self::then_answer), for
    /// closures that aren't `Send`.
    pub fn then_answer_st<F>(self, f: F) -> Self
        where F: FnMut(&Invocation) -> T + 'static,
              T: Send + 'static
    {
        self.attach(Answer::func_st(f))
    }

    fn attach(mut self, answer: Answer) -> Self {
        match &self.stubbing {
            Some(stubbing) => {
                let method = stubbing.template().invocation().method();
                if let Err(e) = answer.validate_for(method) {
                    session::fail(MockError::Misuse(e));
                }
                stubbing.push_answer(answer);
            }
            None => {
                self.stubbing = Some(complete_stubbing(answer));
            }
        }
        self
    }
}

/// Consume the pending stubbing state and register the stub.
fn complete_stubbing(answer: Answer) -> Arc<Stubbing> {
    match session::replace_state(State::Idle) {
        State::Stubbing {
            template,
            mock,
            started_at,
        } => {
            if let Err(e) = answer.validate_for(template.invocation().method())
            {
                session::fail(MockError::Misuse(e));
            }
            let stubbing = Arc::new(Stubbing::new(
                template.clone(),
                vec![answer],
                mock.settings().strictness(),
                started_at,
            ));
            // the staged call was a template, not an interaction
            mock.invocations().remove(template.invocation().seq());
            mock.stubbings().add(stubbing.clone());
            stubbing
        }
        _ => session::fail(MockError::Misuse(MisuseError::NoPendingStubbing)),
    }
}

/// Begin stubbing.
///
/// The argument must be a method call on a mock; its value is discarded.
/// The call itself is recorded, then unwound into a template once the first
/// `then_*` arrives:
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
/// when(mock.add(eq(2), eq(2))).then_return(5);
/// assert_eq!(5, mock.add(2, 2));
/// ```
#[track_caller]
pub fn when<T>(_call_result: T) -> OngoingStubbing<T> {
    let location = Location::caller();
    if let Err(e) = session::validate_idle() {
        session::fail(MockError::Misuse(e));
    }
    match session::take_last() {
        Some((template, mock)) => {
            session::replace_state(State::Stubbing {
                template,
                mock,
                started_at: location,
            });
            OngoingStubbing {
                stubbing: None,
                _ret: PhantomData,
            }
        }
        None => session::fail(MockError::Misuse(
            MisuseError::WhenRequiresMockCall,
        )),
    }
}

/// Answer-first stubbing: `do_return(v).when(&mock).method(args)`.
///
/// Unlike [`when`], the templated call never consults existing stubs and is
/// never recorded as an interaction, so it is safe for methods whose current
/// answer panics.
pub fn do_return<T: Send + Sync + 'static>(value: T) -> Stubber {
    Stubber {
        answers: vec![Answer::constant(value)],
    }
}

/// Answer-first stubbing with a panicking answer.
pub fn do_panic(message: impl Into<String>) -> Stubber {
    Stubber {
        answers: vec![Answer::panics(message.into())],
    }
}

/// Accumulates answers for an answer-first stubbing; see [`do_return`].
pub struct Stubber {
    answers: Vec<Answer>,
}

impl Stubber {
    /// Append another consecutive answer.
    pub fn do_return<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.answers.push(Answer::constant(value));
        self
    }

    /// Append a panicking consecutive answer.
    pub fn do_panic(mut self, message: impl Into<String>) -> Self {
        self.answers.push(Answer::panics(message.into()));
        self
    }

    /// Name the mock to stub; the next method call on it becomes the
    /// template.
    #[track_caller]
    pub fn when<'m, M: Mocked + ?Sized>(self, mock: &'m M) -> &'m M {
        let location = Location::caller();
        if let Err(e) = session::validate_idle() {
            session::fail(MockError::Misuse(e));
        }
        session::replace_state(State::StubbingByAnswer {
            answers: self.answers,
            mock: mock.mock_core().inner().clone(),
            started_at: location,
        });
        mock
    }
}

/// Report strict stubbings that no call ever used, as a single batch.
///
/// Stubs registered while the mock's strictness was
/// [`Strictness::Lenient`](crate::Strictness) are exempt.
pub fn verify_no_unused_stubs(mocks: &[&dyn Mocked]) {
    if let Err(e) = session::validate_idle() {
        session::fail(MockError::Misuse(e));
    }
    let mut unused = Vec::new();
    for mock in mocks {
        for stubbing in mock.mock_core().inner().stubbings().ascending() {
            if stubbing.strictness() == Strictness::Strict
                && !stubbing.was_used()
            {
                unused.push(stubbing.describe());
            }
        }
    }
    if !unused.is_empty() {
        session::fail(MockError::Misuse(MisuseError::UnusedStubbings {
            stubs: unused,
        }));
    }
}
