// vim: tw=80
//! Argument matchers and the matcher-application engine.
//!
//! Matcher functions like [`eq`] and [`any`] are called *in argument
//! position*: they push the real matcher onto a thread-local stack and return
//! a placeholder value, so `mock.frobnicate(eq(7))` reads like the call being
//! templated.  The dispatcher drains the stack once per intercepted call and
//! binds the matchers to the call's arguments.

use std::{
    any,
    fmt,
    marker::PhantomData,
    panic::Location,
    sync::{Arc, Mutex},
};

use predicates::prelude::*;
use predicates_tree::CaseTreeExt;

use crate::{
    invocation::{ArgValue, Invocation},
    session,
};

/// A predicate over one erased argument position.
///
/// Matching is type-guarded: applying a matcher built for one type to an
/// argument of another type is a plain mismatch, never a panic.
pub trait ArgMatcher: fmt::Display + Send + Sync {
    fn matches(&self, arg: &ArgValue) -> bool;

    /// A human-readable reason why `arg` failed to match, if the matcher can
    /// produce one.
    fn explain(&self, _arg: &ArgValue) -> Option<String> {
        None
    }

    /// Record the argument.  Called only after the whole invocation has been
    /// confirmed to match, never speculatively per position.
    fn capture(&self, _arg: &ArgValue) {}
}

/// Equality against a concrete value.  Bare arguments in a stubbing or
/// verification template are promoted to this.
struct ValueMatcher {
    value: ArgValue,
}

impl ArgMatcher for ValueMatcher {
    fn matches(&self, arg: &ArgValue) -> bool {
        self.value.equals(arg)
    }
}

impl fmt::Display for ValueMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.value)
    }
}

/// Adapts a typed [`Predicate`] to an erased argument position.
struct PredMatcher<T, P> {
    pred: P,
    // PhantomData<fn(T)> is Send + Sync even if T is not
    _t: PhantomData<fn(T)>,
}

impl<T, P> PredMatcher<T, P> {
    fn new(pred: P) -> Self {
        PredMatcher {
            pred,
            _t: PhantomData,
        }
    }
}

impl<T, P> ArgMatcher for PredMatcher<T, P>
    where T: fmt::Debug + Send + Sync + 'static,
          P: Predicate<T> + Send + Sync
{
    fn matches(&self, arg: &ArgValue) -> bool {
        arg.downcast_ref::<T>().map_or(false, |v| self.pred.eval(v))
    }

    fn explain(&self, arg: &ArgValue) -> Option<String> {
        let v = arg.downcast_ref::<T>()?;
        self.pred.find_case(false, v).map(|case| case.tree().to_string())
    }
}

impl<T, P> fmt::Display for PredMatcher<T, P>
    where P: fmt::Display
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.pred.fmt(f)
    }
}

/// Matches any argument of the expected type.
struct AnyMatcher<T>(PhantomData<fn(T)>);

impl<T: 'static> ArgMatcher for AnyMatcher<T> {
    fn matches(&self, arg: &ArgValue) -> bool {
        arg.downcast_ref::<T>().is_some()
    }
}

impl<T> fmt::Display for AnyMatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "any::<{}>()", any::type_name::<T>())
    }
}

/// Match one argument by equality.  Returns the value itself, so the
/// templated call reads naturally and still typechecks.
#[track_caller]
pub fn eq<T>(value: T) -> T
    where T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static
{
    session::push_matcher(
        Arc::new(PredMatcher::new(predicate::eq(value.clone()))),
        Location::caller(),
    );
    value
}

/// Match any argument of type `T`.
#[track_caller]
pub fn any<T>() -> T
    where T: Default + Send + Sync + 'static
{
    session::push_matcher(
        Arc::new(AnyMatcher::<T>(PhantomData)),
        Location::caller(),
    );
    T::default()
}

/// Match one argument with an arbitrary function.
#[track_caller]
pub fn arg_that<T, F>(f: F) -> T
    where T: Default + fmt::Debug + Send + Sync + 'static,
          F: Fn(&T) -> bool + Send + Sync + 'static
{
    session::push_matcher(
        Arc::new(PredMatcher::new(predicate::function(f))),
        Location::caller(),
    );
    T::default()
}

/// Match one argument with any [`Predicate`].
#[track_caller]
pub fn matching<T, P>(pred: P) -> T
    where T: Default + fmt::Debug + Send + Sync + 'static,
          P: Predicate<T> + Send + Sync + 'static
{
    session::push_matcher(
        Arc::new(PredMatcher::new(pred)),
        Location::caller(),
    );
    T::default()
}

/// Captures the arguments its matcher position was matched against, in call
/// order, for later inspection.
///
/// ```
/// # use doppel::*;
/// # struct MockSink { core: MockCore }
/// # impl Synthesized for MockSink {
/// #     fn from_core(core: MockCore) -> Self { MockSink { core } }
/// # }
/// # impl Mocked for MockSink {
/// #     fn mock_core(&self) -> &MockCore { &self.core }
/// # }
/// # impl MockSink {
/// #     fn put(&self, x: u32) {
/// #         self.core.invoke(MethodDesc::new::<()>("put", 1),
/// #                          CallArgs::new().arg(x))
/// #     }
/// # }
/// let mock: MockSink = mock();
/// mock.put(4);
/// mock.put(5);
///
/// let captor = ArgumentCaptor::<u32>::new();
/// verify(&mock, times(2)).put(captor.capture());
/// assert_eq!(5, captor.value());
/// assert_eq!(vec![4, 5], captor.values());
/// ```
pub struct ArgumentCaptor<T> {
    captured: Arc<Mutex<Vec<T>>>,
}

impl<T> ArgumentCaptor<T>
    where T: Clone + Default + fmt::Debug + Send + Sync + 'static
{
    pub fn new() -> Self {
        ArgumentCaptor {
            captured: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Push a capturing matcher for one argument position.
    #[track_caller]
    pub fn capture(&self) -> T {
        session::push_matcher(
            Arc::new(CaptorMatcher {
                captured: self.captured.clone(),
            }),
            Location::caller(),
        );
        T::default()
    }

    /// The most recently captured argument.
    pub fn value(&self) -> T {
        self.captured.lock().unwrap().last().cloned()
            .expect("ArgumentCaptor: no argument was captured")
    }

    /// Every captured argument, in call order.
    pub fn values(&self) -> Vec<T> {
        self.captured.lock().unwrap().clone()
    }
}

impl<T> Default for ArgumentCaptor<T>
    where T: Clone + Default + fmt::Debug + Send + Sync + 'static
{
    fn default() -> Self {
        Self::new()
    }
}

struct CaptorMatcher<T> {
    captured: Arc<Mutex<Vec<T>>>,
}

impl<T> ArgMatcher for CaptorMatcher<T>
    where T: Clone + fmt::Debug + Send + 'static
{
    fn matches(&self, arg: &ArgValue) -> bool {
        arg.downcast_ref::<T>().is_some()
    }

    fn capture(&self, arg: &ArgValue) {
        if let Some(v) = arg.downcast_ref::<T>() {
            self.captured.lock().unwrap().push(v.clone());
        }
    }
}

impl<T> fmt::Display for CaptorMatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "capture::<{}>()", any::type_name::<T>())
    }
}

/// The matcher count did not fit the call's shape.
pub(crate) struct BindError {
    pub(crate) expected: usize,
    pub(crate) recorded: usize,
}

/// Pairs a template invocation with one matcher per argument position.
///
/// Built by the dispatcher for every intercepted call: with an empty matcher
/// stack the concrete arguments are promoted to equality matchers; otherwise
/// the matcher count must equal either the expanded argument count
/// (per-element form) or, for variadic methods, the formal arity (array
/// form).
#[derive(Clone)]
pub struct InvocationMatcher {
    invocation: Arc<Invocation>,
    matchers: Vec<Arc<dyn ArgMatcher>>,
}

impl InvocationMatcher {
    pub(crate) fn bind(
        invocation: Arc<Invocation>,
        matchers: Vec<Arc<dyn ArgMatcher>>,
    ) -> Result<Self, BindError> {
        let expanded = invocation.args().len();
        let arity = invocation.method().arity();
        let matchers = if matchers.is_empty() {
            invocation.args().iter()
                .map(|v| {
                    Arc::new(ValueMatcher { value: v.clone() })
                        as Arc<dyn ArgMatcher>
                })
                .collect()
        } else if matchers.len() == expanded
            || (invocation.method().is_variadic() && matchers.len() == arity)
        {
            matchers
        } else {
            return Err(BindError {
                expected: expanded,
                recorded: matchers.len(),
            });
        };
        Ok(InvocationMatcher {
            invocation,
            matchers,
        })
    }

    /// The template call this matcher was built from.
    pub fn invocation(&self) -> &Arc<Invocation> {
        &self.invocation
    }

    /// Does a concrete invocation match this template?
    pub fn matches(&self, other: &Invocation) -> bool {
        self.invocation.mock_id() == other.mock_id()
            && self.invocation.method().same_method(other.method())
            && matching_pairs(&self.matchers, other).is_some()
    }

    /// Feed a matched invocation's arguments to any capturing matchers.
    /// Callers must have confirmed the match first.
    pub(crate) fn capture_from(&self, other: &Invocation) {
        if let Some(pairs) = matching_pairs(&self.matchers, other) {
            for (matcher, arg) in pairs {
                matcher.capture(arg);
            }
        }
    }

    /// Why `other` (an invocation of the same method) failed to match, for
    /// failure messages.
    pub(crate) fn explain_mismatch(&self, other: &Invocation)
        -> Option<String>
    {
        if self.matchers.len() != other.args().len() {
            return Some(format!(
                "expected {} arguments but the call had {}",
                self.matchers.len(),
                other.args().len()
            ));
        }
        for (i, (matcher, arg)) in
            self.matchers.iter().zip(other.args()).enumerate()
        {
            if !matcher.matches(arg) {
                return Some(matcher.explain(arg).unwrap_or_else(|| {
                    format!("argument #{i}: {arg:?} does not match {matcher}")
                }));
            }
        }
        None
    }
}

impl fmt::Display for InvocationMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}(", self.invocation.mock_name(),
               self.invocation.method().name())?;
        for (i, matcher) in self.matchers.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{matcher}")?;
        }
        write!(f, ")")
    }
}

/// Reconcile a matcher list against a concrete invocation.
///
/// Per-element form applies when the matcher count equals the expanded
/// argument count; array form applies to variadic methods when the matcher
/// count equals the formal arity, the final matcher then seeing the tail as
/// one array value.  When both shapes are plausible, per-element form wins.
fn matching_pairs<'a>(
    matchers: &'a [Arc<dyn ArgMatcher>],
    invocation: &'a Invocation,
) -> Option<Vec<(&'a Arc<dyn ArgMatcher>, &'a ArgValue)>> {
    if matchers.len() == invocation.args().len() {
        let pairs: Vec<_> =
            matchers.iter().zip(invocation.args()).collect();
        if pairs.iter().all(|(m, a)| m.matches(a)) {
            return Some(pairs);
        }
    }
    if invocation.method().is_variadic()
        && matchers.len() == invocation.method().arity()
    {
        let pairs: Vec<_> =
            matchers.iter().zip(invocation.raw_args()).collect();
        if pairs.iter().all(|(m, a)| m.matches(a)) {
            return Some(pairs);
        }
    }
    None
}
