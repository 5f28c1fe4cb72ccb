use std::sync::Arc;

/// Returns early with a [`Error`] built from the given format arguments.
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::from_args(format_args!($($arg)*)))
    };
}

/// Creates an [`Error`] from the given format arguments.
#[macro_export]
macro_rules! err {
    ($($arg:tt)*) => {
        $crate::Error::from_args(format_args!($($arg)*))
    };
}

/// An error that can occur while filling or reconciling a data set.
///
/// Stays one word wide; the kind and cause chain live behind an `Arc` so
/// errors are cheap to clone into per-row ledgers.
#[derive(Clone)]
pub struct Error {
    inner: Option<Arc<ErrorInner>>,
}

#[derive(Debug)]
struct ErrorInner {
    kind: ErrorKind,
    cause: Option<Error>,
}

#[derive(Debug)]
enum ErrorKind {
    /// Invalid adapter configuration: missing command, bad enum value,
    /// unsupported batch size. Never retried, never redirected through a
    /// recovery hook.
    Configuration(String),

    /// Table/column mapping or schema inference failure.
    Mapping(String),

    /// The row source, command, or connection failed: I/O errors,
    /// constraint violations, command execution failures.
    Driver(String),

    /// A single row failed during materialization or write-back.
    Row(String),

    /// An update/delete affected zero rows where one was expected. Carries
    /// the ordinals of the implicated rows in their table.
    ConcurrencyViolation { message: String, rows: Vec<usize> },

    /// The caller's cancellation token fired.
    Cancelled,

    /// Ad-hoc error text built via [`err!`]/[`bail!`].
    Adhoc(String),

    Anyhow(anyhow::Error),

    Unknown,
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        ErrorKind::Configuration(message.into()).into()
    }

    pub fn mapping(message: impl Into<String>) -> Self {
        ErrorKind::Mapping(message.into()).into()
    }

    pub fn driver(message: impl std::fmt::Display) -> Self {
        ErrorKind::Driver(message.to_string()).into()
    }

    pub fn row(message: impl Into<String>) -> Self {
        ErrorKind::Row(message.into()).into()
    }

    pub fn concurrency_violation(message: impl Into<String>, rows: Vec<usize>) -> Self {
        ErrorKind::ConcurrencyViolation {
            message: message.into(),
            rows,
        }
        .into()
    }

    pub fn cancelled() -> Self {
        ErrorKind::Cancelled.into()
    }

    #[doc(hidden)]
    pub fn from_args(args: std::fmt::Arguments<'_>) -> Self {
        match args.as_str() {
            Some(s) => ErrorKind::Adhoc(s.to_string()).into(),
            None => ErrorKind::Adhoc(std::fmt::format(args)).into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self.kind(), ErrorKind::Configuration(_))
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self.kind(), ErrorKind::Mapping(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind(), ErrorKind::Cancelled)
    }

    pub fn is_concurrency_violation(&self) -> bool {
        matches!(self.kind(), ErrorKind::ConcurrencyViolation { .. })
    }

    /// Ordinals of the rows implicated in a concurrency violation.
    pub fn concurrency_rows(&self) -> Option<&[usize]> {
        match self.kind() {
            ErrorKind::ConcurrencyViolation { rows, .. } => Some(rows),
            _ => None,
        }
    }

    /// Whether the error belongs to the narrow set recovery paths are
    /// allowed to observe (fill-error hook, continue-on-error).
    ///
    /// Cancellation is deliberately excluded: the pipelines re-check the
    /// token on every iteration, so a "continue" decision could never make
    /// progress. Configuration errors always escalate.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Mapping(_)
                | ErrorKind::Driver(_)
                | ErrorKind::Row(_)
                | ErrorKind::ConcurrencyViolation { .. }
                | ErrorKind::Adhoc(_)
        )
    }

    /// Adds context to this error. Context displays outermost first.
    pub fn context(self, message: impl Into<String>) -> Self {
        let mut err: Error = ErrorKind::Adhoc(message.into()).into();
        let inner = err.inner.as_mut().unwrap();
        Arc::get_mut(inner).unwrap().cause = Some(self);
        err
    }

    fn chain(&self) -> impl Iterator<Item = &Error> {
        let mut err = self;
        core::iter::once(err).chain(core::iter::from_fn(move || {
            err = err.inner.as_ref().and_then(|inner| inner.cause.as_ref())?;
            Some(err)
        }))
    }

    fn kind(&self) -> &ErrorKind {
        self.inner
            .as_ref()
            .map(|inner| &inner.kind)
            .unwrap_or(&ErrorKind::Unknown)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.kind() {
            ErrorKind::Anyhow(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let mut it = self.chain().peekable();
        while let Some(err) = it.next() {
            core::fmt::Display::fmt(err.kind(), f)?;
            if it.peek().is_some() {
                f.write_str(": ")?;
            }
        }
        Ok(())
    }
}

impl core::fmt::Debug for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        if !f.alternate() {
            core::fmt::Display::fmt(self, f)
        } else {
            let Some(ref inner) = self.inner else {
                return f.debug_struct("Error").field("kind", &"None").finish();
            };
            f.debug_struct("Error")
                .field("kind", &inner.kind)
                .field("cause", &inner.cause)
                .finish()
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        use self::ErrorKind::*;

        match self {
            Configuration(msg) => write!(f, "invalid configuration: {msg}"),
            Mapping(msg) => write!(f, "mapping error: {msg}"),
            Driver(msg) => write!(f, "driver error: {msg}"),
            Row(msg) => write!(f, "row error: {msg}"),
            ConcurrencyViolation { message, rows } => {
                write!(f, "concurrency violation: {message}; rows={rows:?}")
            }
            Cancelled => f.write_str("operation cancelled"),
            Adhoc(msg) => f.write_str(msg),
            Anyhow(err) => core::fmt::Display::fmt(err, f),
            Unknown => f.write_str("unknown rowset error"),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            inner: Some(Arc::new(ErrorInner { kind, cause: None })),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Error {
        Error::from(ErrorKind::Anyhow(err))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::from(ErrorKind::Driver(err.to_string()))
    }
}
