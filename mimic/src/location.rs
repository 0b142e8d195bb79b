// vim: tw=80
use std::fmt;

/// The call site of a stub, a verification, or a recorded invocation.
///
/// The engine never inspects it; it is only threaded into errors so that a
/// failure can point back at the line that caused it.  Use [`location!`] to
/// capture the current one.
///
/// [`location!`]: crate::location!
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Location {
    file: &'static str,
    line: u32
}

impl Location {
    pub const fn new(file: &'static str, line: u32) -> Self {
        Location { file, line }
    }

    /// The location of whoever called the `#[track_caller]` function that
    /// invoked this.
    #[track_caller]
    pub fn caller() -> Self {
        std::panic::Location::caller().into()
    }

    pub fn file(&self) -> &'static str {
        self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

impl From<&'static std::panic::Location<'static>> for Location {
    fn from(l: &'static std::panic::Location<'static>) -> Self {
        Location::new(l.file(), l.line())
    }
}

/// Capture the current source location as a [`Location`].
///
/// # Examples
/// ```
/// # use mimic::*;
/// let here = location!();
/// assert_eq!(here.file(), file!());
/// ```
#[macro_export]
macro_rules! location {
    () => {
        $crate::Location::new(file!(), line!())
    };
}
