// vim: tw=80
//! Intercepted calls and the per-mock invocation log.

use std::{
    any::{self, TypeId},
    fmt,
    panic::Location,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, Weak,
    },
};

use downcast::*;

use crate::{mock::MockInner, stubbing::Stubbing};

/// Assigns a total call order across all mocks.
static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

/// One type-erased argument value, as captured from an intercepted call.
///
/// Blanket-implemented for anything comparable and printable, so mock
/// methods can pass their arguments through without ceremony.
pub trait ArgumentValue: Any + fmt::Debug + Send + Sync {
    /// Structural equality against another erased argument.  Arguments of
    /// different concrete types are never equal.
    fn eq_value(&self, other: &dyn ArgumentValue) -> bool;
}
downcast!(dyn ArgumentValue);

impl<T: PartialEq + fmt::Debug + Send + Sync + 'static> ArgumentValue for T {
    fn eq_value(&self, other: &dyn ArgumentValue) -> bool {
        other.downcast_ref::<T>().map_or(false, |o| self == o)
    }
}

/// A cheaply cloneable handle to one erased argument.
#[derive(Clone)]
pub struct ArgValue(Arc<dyn ArgumentValue>);

impl ArgValue {
    /// Erase a concrete argument value.
    pub fn of<T>(value: T) -> Self
        where T: PartialEq + fmt::Debug + Send + Sync + 'static
    {
        ArgValue(Arc::new(value))
    }

    /// Recover the concrete value, if it is a `T`.
    pub fn downcast_ref<T: any::Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>().ok()
    }

    /// Structural equality; `false` whenever the concrete types differ.
    pub fn equals(&self, other: &ArgValue) -> bool {
        self.0.eq_value(&*other.0)
    }
}

impl fmt::Debug for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Describes one mockable method: its name, formal parameter count, whether
/// the final parameter collects a variable-length tail, and its return type.
#[derive(Clone, Debug)]
pub struct MethodDesc {
    name: &'static str,
    arity: usize,
    variadic: bool,
    return_type: TypeId,
    return_type_name: &'static str,
}

impl MethodDesc {
    /// A fixed-arity method returning `R`.
    pub fn new<R: 'static>(name: &'static str, arity: usize) -> Self {
        MethodDesc {
            name,
            arity,
            variadic: false,
            return_type: TypeId::of::<R>(),
            return_type_name: any::type_name::<R>(),
        }
    }

    /// A method returning `R` whose final formal parameter is variadic.
    /// `arity` counts the variadic parameter as one.
    pub fn variadic<R: 'static>(name: &'static str, arity: usize) -> Self {
        assert!(arity >= 1, "a variadic method has at least one parameter");
        MethodDesc {
            name,
            arity,
            variadic: true,
            return_type: TypeId::of::<R>(),
            return_type_name: any::type_name::<R>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    pub(crate) fn return_type(&self) -> TypeId {
        self.return_type
    }

    pub(crate) fn return_type_name(&self) -> &'static str {
        self.return_type_name
    }

    /// Same method identity: descriptors agree on name and shape.
    pub(crate) fn same_method(&self, other: &MethodDesc) -> bool {
        self.name == other.name
            && self.arity == other.arity
            && self.variadic == other.variadic
    }
}

/// Builder for the arguments of one intercepted call.
///
/// A mock method erases each argument with [`CallArgs::arg`]; a variadic
/// method additionally passes its tail slice to [`CallArgs::tail`], which
/// retains both the array form (for whole-array matchers) and the flattened
/// element form (for per-element matchers).
#[derive(Default)]
pub struct CallArgs {
    positional: Vec<ArgValue>,
    tail_raw: Option<ArgValue>,
    tail: Vec<ArgValue>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one positional argument.
    pub fn arg<T>(mut self, value: T) -> Self
        where T: PartialEq + fmt::Debug + Send + Sync + 'static
    {
        self.positional.push(ArgValue::of(value));
        self
    }

    /// Supply the variadic tail.  Must be called exactly once for methods
    /// declared with [`MethodDesc::variadic`], even when the tail is empty.
    pub fn tail<T>(mut self, values: &[T]) -> Self
        where T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static
    {
        self.tail_raw = Some(ArgValue::of(values.to_vec()));
        self.tail = values.iter().cloned().map(ArgValue::of).collect();
        self
    }
}

/// An immutable record of one intercepted call.
///
/// Identifies the owning mock by id and name rather than by reference, so a
/// recorded invocation never keeps a discarded mock alive.
pub struct Invocation {
    mock_id: u64,
    mock_name: String,
    method: MethodDesc,
    /// Arguments as passed, the variadic tail in array form.
    raw_args: Vec<ArgValue>,
    /// Arguments with the variadic tail flattened into positional slots.
    args: Vec<ArgValue>,
    seq: u64,
    location: &'static Location<'static>,
    verified: AtomicBool,
    checked_for_stub: AtomicBool,
    answered_by: Mutex<Option<Weak<Stubbing>>>,
}

impl Invocation {
    pub(crate) fn new(
        mock: &Arc<MockInner>,
        method: MethodDesc,
        args: CallArgs,
        location: &'static Location<'static>,
    ) -> Self {
        debug_assert_eq!(method.is_variadic(), args.tail_raw.is_some(),
            "{}: variadic methods take CallArgs::tail, fixed-arity methods \
             do not", method.name());
        debug_assert_eq!(
            args.positional.len() + usize::from(method.is_variadic()),
            method.arity(),
            "{}: argument count disagrees with the method descriptor",
            method.name());
        let mut raw_args = args.positional.clone();
        let mut expanded = args.positional;
        if let Some(tail_raw) = args.tail_raw {
            raw_args.push(tail_raw);
            expanded.extend(args.tail);
        }
        Invocation {
            mock_id: mock.id(),
            mock_name: mock.name().to_owned(),
            method,
            raw_args,
            args: expanded,
            seq: NEXT_SEQ.fetch_add(1, Ordering::Relaxed),
            location,
            verified: AtomicBool::new(false),
            checked_for_stub: AtomicBool::new(false),
            answered_by: Mutex::new(None),
        }
    }

    pub fn method(&self) -> &MethodDesc {
        &self.method
    }

    /// Arguments with the variadic tail expanded into positional slots.
    pub fn args(&self) -> &[ArgValue] {
        &self.args
    }

    /// Arguments as passed, one slot per formal parameter.
    pub fn raw_args(&self) -> &[ArgValue] {
        &self.raw_args
    }

    /// Position in the total call order across all mocks.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    pub(crate) fn mock_id(&self) -> u64 {
        self.mock_id
    }

    pub fn mock_name(&self) -> &str {
        &self.mock_name
    }

    pub fn is_verified(&self) -> bool {
        self.verified.load(Ordering::Relaxed)
    }

    pub(crate) fn mark_verified(&self) {
        self.verified.store(true, Ordering::Relaxed);
    }

    pub(crate) fn mark_checked_for_stub(&self) {
        self.checked_for_stub.store(true, Ordering::Relaxed);
    }

    pub fn was_checked_for_stub(&self) -> bool {
        self.checked_for_stub.load(Ordering::Relaxed)
    }

    pub(crate) fn link_stubbing(&self, stubbing: &Arc<Stubbing>) {
        *self.answered_by.lock().unwrap() = Some(Arc::downgrade(stubbing));
    }

    /// The stubbing that answered this call, if any is still alive.
    pub fn answered_by(&self) -> Option<Arc<Stubbing>> {
        self.answered_by.lock().unwrap().as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn describe_at(&self) -> String {
        format!("{} at {}", self, self.location)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}(", self.mock_name, self.method.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg:?}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// The ordered, per-mock log of intercepted calls.
///
/// Appends may race with reads when a mock is driven from several threads;
/// the interior mutex keeps the log coherent.
pub(crate) struct InvocationLog {
    invocations: Mutex<Vec<Arc<Invocation>>>,
    stub_only: bool,
}

impl InvocationLog {
    pub(crate) fn new(stub_only: bool) -> Self {
        InvocationLog {
            invocations: Mutex::new(Vec::new()),
            stub_only,
        }
    }

    pub(crate) fn record(&self, invocation: Arc<Invocation>) {
        let mut guard = self.invocations.lock().unwrap();
        if self.stub_only {
            // stub-only mocks retain a single most-recent record
            guard.clear();
        }
        guard.push(invocation);
    }

    pub(crate) fn all(&self) -> Vec<Arc<Invocation>> {
        self.invocations.lock().unwrap().clone()
    }

    /// Drop the record with the given sequence number.  Used when a recorded
    /// call turns out to be a stubbing template rather than an interaction.
    pub(crate) fn remove(&self, seq: u64) {
        self.invocations.lock().unwrap().retain(|i| i.seq() != seq);
    }

    pub(crate) fn clear(&self) {
        self.invocations.lock().unwrap().clear();
    }
}
