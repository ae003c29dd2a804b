// vim: tw=80
//! The error taxonomy.
//!
//! Failures are split into two structural kinds: [`MisuseError`] ("your test
//! is wrong") and [`VerificationFailure`] ("your assertion failed").  Both are
//! carried inside a [`MockError`] and surfaced by panicking with the typed
//! error as the payload, so a test can catch the panic and inspect which kind
//! it got instead of string-matching a message.

use std::{error::Error, fmt, panic::Location};

/// Any failure raised by the mocking core.
#[derive(Debug)]
pub enum MockError {
    /// The mocking API was used incorrectly.
    Misuse(MisuseError),
    /// A verification's expectations were not met.
    Verification(VerificationFailure),
}

impl fmt::Display for MockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MockError::Misuse(e) => e.fmt(f),
            MockError::Verification(e) => e.fmt(f),
        }
    }
}

impl Error for MockError {}

/// The programmer used the mocking API incorrectly.
///
/// Raising one of these also resets the thread-local session state, so a
/// failed statement does not poison subsequent, unrelated statements.
#[derive(Debug)]
pub enum MisuseError {
    /// `when()` ran but no `then_*` ever consumed it.
    UnfinishedStubbing {
        started_at: &'static Location<'static>,
    },
    /// `verify()` ran but no mock method call ever consumed it.
    UnfinishedVerification {
        started_at: &'static Location<'static>,
    },
    /// A `then_*` arrived with no stubbing in progress.
    NoPendingStubbing,
    /// `when()` was called without a preceding method call on a mock.
    WhenRequiresMockCall,
    /// Leftover or insufficient argument matchers relative to the call's
    /// argument count.
    MisplacedMatchers {
        expected: usize,
        recorded: usize,
        locations: Vec<String>,
    },
    /// An answer's value type disagrees with the stubbed method's declared
    /// return type.  Detected eagerly, at stub registration.
    IncompatibleReturnType {
        method: String,
        expected: &'static str,
        actual: &'static str,
    },
    /// A stub produced a value that could not be converted to the method's
    /// return type at call time.
    WrongTypeOfReturnValue {
        method: String,
        expected: &'static str,
    },
    /// Verification was attempted on a mock created with
    /// `MockSettings::stub_only`.
    StubOnlyMock { mock: String },
    /// `InOrder::verify` was called with a mock outside its mock set.
    NotInOrderContext { mock: String },
    /// Strict stubbings that no call ever used, reported as a batch.
    UnusedStubbings { stubs: Vec<String> },
}

impl fmt::Display for MisuseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MisuseError::UnfinishedStubbing { started_at } => {
                writeln!(f, "unfinished stubbing detected")?;
                writeln!(f, "    started at {started_at}")?;
                write!(f, "    a when() must be completed with then_return(), \
                       then_panic(), or then_answer()")
            }
            MisuseError::UnfinishedVerification { started_at } => {
                writeln!(f, "unfinished verification detected")?;
                writeln!(f, "    started at {started_at}")?;
                write!(f, "    a verify() must be followed by a method call \
                       on the mock")
            }
            MisuseError::NoPendingStubbing => {
                write!(f, "then_*() called with no stubbing in progress; did \
                       an earlier statement already complete this when()?")
            }
            MisuseError::WhenRequiresMockCall => {
                write!(f, "the argument to when() must be a method call on a \
                       mock")
            }
            MisuseError::MisplacedMatchers {
                expected,
                recorded,
                locations,
            } => {
                writeln!(f, "invalid use of argument matchers")?;
                writeln!(f, "    {expected} expected, {recorded} recorded:")?;
                for loc in locations {
                    writeln!(f, "    matcher created at {loc}")?;
                }
                write!(f, "    either use matchers for all arguments or for \
                       none of them")
            }
            MisuseError::IncompatibleReturnType {
                method,
                expected,
                actual,
            } => {
                write!(f, "{method}: cannot stub an answer of type {actual} \
                       for a method returning {expected}")
            }
            MisuseError::WrongTypeOfReturnValue { method, expected } => {
                write!(f, "{method}: a stubbed answer did not produce the \
                       declared return type {expected}")
            }
            MisuseError::StubOnlyMock { mock } => {
                write!(f, "{mock} was created as stub-only and cannot be \
                       verified")
            }
            MisuseError::NotInOrderContext { mock } => {
                write!(f, "{mock} does not belong to this InOrder context")
            }
            MisuseError::UnusedStubbings { stubs } => {
                writeln!(f, "unnecessary stubbings detected:")?;
                for s in stubs {
                    writeln!(f, "    {s}")?;
                }
                write!(f, "    remove them, or mark the mock lenient")
            }
        }
    }
}

impl Error for MisuseError {}

/// A verification's expectations were not met by the recorded invocations.
#[derive(Debug)]
pub enum VerificationFailure {
    /// Fewer matching invocations than wanted.
    TooFewInvocations {
        wanted: String,
        wanted_calls: usize,
        actual_calls: usize,
        locations: Vec<String>,
    },
    /// More matching invocations than wanted.
    TooManyInvocations {
        wanted: String,
        wanted_calls: usize,
        actual_calls: usize,
        locations: Vec<String>,
    },
    /// The wanted invocation never happened at all.
    WantedButNotInvoked {
        wanted: String,
        /// Why the nearest same-method invocation failed to match, when one
        /// exists.
        hint: Option<String>,
        /// Every recorded interaction with the mock, for context.
        others: Vec<String>,
    },
    /// A `never()` verification found a matching invocation.
    NeverWantedButInvoked { wanted: String, location: String },
    /// `verify_no_more_interactions` found unverified invocations.
    NoMoreInteractionsWanted { unverified: Vec<String> },
    /// `verify_no_interactions` found any invocation at all.
    NoInteractionsWanted { interactions: Vec<String> },
    /// An in-order verification found the wanted invocation only before the
    /// already-verified cursor.
    OutOfOrder { wanted: String },
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationFailure::TooFewInvocations {
                wanted,
                wanted_calls,
                actual_calls,
                locations,
            } => {
                writeln!(f, "{wanted}: expected {wanted_calls} invocations \
                        but recorded {actual_calls}:")?;
                list(f, locations)
            }
            VerificationFailure::TooManyInvocations {
                wanted,
                wanted_calls,
                actual_calls,
                locations,
            } => {
                writeln!(f, "{wanted}: expected at most {wanted_calls} \
                        invocations but recorded {actual_calls}:")?;
                list(f, locations)
            }
            VerificationFailure::WantedButNotInvoked {
                wanted,
                hint,
                others,
            } => {
                writeln!(f, "{wanted}: wanted but never invoked")?;
                if let Some(hint) = hint {
                    writeln!(f, "    nearest mismatch: {hint}")?;
                }
                if !others.is_empty() {
                    writeln!(f, "    recorded interactions:")?;
                }
                list(f, others)
            }
            VerificationFailure::NeverWantedButInvoked { wanted, location } =>
            {
                write!(f, "{wanted}: never wanted, but invoked at {location}")
            }
            VerificationFailure::NoMoreInteractionsWanted { unverified } => {
                writeln!(f, "no more interactions wanted, but found \
                        unverified invocations:")?;
                list(f, unverified)
            }
            VerificationFailure::NoInteractionsWanted { interactions } => {
                writeln!(f, "no interactions wanted, but found:")?;
                list(f, interactions)
            }
            VerificationFailure::OutOfOrder { wanted } => {
                write!(f, "{wanted}: invoked out of order; it happened before \
                       the previously verified invocation")
            }
        }
    }
}

impl Error for VerificationFailure {}

fn list(f: &mut fmt::Formatter<'_>, lines: &[String]) -> fmt::Result {
    for line in lines {
        writeln!(f, "    {line}")?;
    }
    Ok(())
}
