use crate::constants::{NO_STACK_TRACE, UNKNOWN_ERROR_KIND, UNKNOWN_MESSAGE};
use serde_json::Value;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::panic::PanicHookInfo;

/// An error value handed to the monitor, normalised once at capture time.
#[derive(Debug, Clone, PartialEq)]
pub enum CapturedError {
    /// A typed error with a known kind (type name) and optional details.
    Structured {
        kind: String,
        message: Option<String>,
        stack: Option<String>,
        cause: Option<Box<CapturedError>>,
    },
    /// A bare string that was reported as an error.
    Text(String),
    /// Arbitrary JSON data whose shape is only probed, never trusted.
    Opaque(Value),
    /// Nothing was supplied (`None`/`null`).
    Absent,
}

impl CapturedError {
    pub fn structured(kind: impl Into<String>, message: impl Into<String>) -> Self {
        CapturedError::Structured {
            kind: kind.into(),
            message: Some(message.into()),
            stack: None,
            cause: None,
        }
    }

    pub fn with_stack(self, stack: impl Into<String>) -> Self {
        match self {
            CapturedError::Structured {
                kind,
                message,
                cause,
                ..
            } => CapturedError::Structured {
                kind,
                message,
                stack: Some(stack.into()),
                cause,
            },
            other => other,
        }
    }

    pub fn with_cause(self, inner: CapturedError) -> Self {
        match self {
            CapturedError::Structured {
                kind,
                message,
                stack,
                ..
            } => CapturedError::Structured {
                kind,
                message,
                stack,
                cause: Some(Box::new(inner)),
            },
            other => other,
        }
    }

    /// Captures a Rust error together with its source chain. The kind is the
    /// unqualified type name of `E`.
    pub fn from_error<E>(error: &E) -> Self
    where
        E: std::error::Error + 'static,
    {
        let kind = short_type_name(std::any::type_name::<E>());
        Self::from_dyn_error(kind, error)
    }

    fn from_dyn_error(kind: String, error: &(dyn std::error::Error + 'static)) -> Self {
        let cause = error
            .source()
            .map(|source| Box::new(Self::from_dyn_error("Error".to_string(), source)));

        CapturedError::Structured {
            kind,
            message: Some(error.to_string()),
            stack: backtrace_text(&Backtrace::capture()),
            cause,
        }
    }

    /// Captures an `anyhow::Error`, using its backtrace when one was recorded.
    pub fn from_anyhow(error: &anyhow::Error) -> Self {
        let cause = error
            .source()
            .map(|source| Box::new(Self::from_dyn_error("Error".to_string(), source)));

        CapturedError::Structured {
            kind: "Error".to_string(),
            message: Some(error.to_string()),
            stack: backtrace_text(error.backtrace()),
            cause,
        }
    }

    /// Captures a panic from inside a panic hook.
    pub fn from_panic(info: &PanicHookInfo<'_>) -> Self {
        let payload = info.payload();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned());

        let mut stack = info
            .location()
            .map(|location| format!("at {}:{}:{}", location.file(), location.line(), location.column()))
            .unwrap_or_default();
        if let Some(trace) = backtrace_text(&Backtrace::force_capture()) {
            stack.push('\n');
            stack.push_str(&trace);
        }

        CapturedError::Structured {
            kind: "Panic".to_string(),
            message,
            stack: (!stack.is_empty()).then_some(stack),
            cause: None,
        }
    }

    /// Resolves the human-readable message, falling back to a fixed sentinel.
    pub fn message(&self) -> String {
        let found = match self {
            CapturedError::Structured { message, cause, .. } => non_empty(message.as_deref())
                .or_else(|| cause.as_deref().and_then(Self::own_message)),
            CapturedError::Text(text) => non_empty(Some(text)),
            CapturedError::Opaque(value) => probe(value, "message"),
            CapturedError::Absent => None,
        };

        found.unwrap_or_else(|| UNKNOWN_MESSAGE.to_string())
    }

    /// Message of a nested error, one level deep.
    fn own_message(&self) -> Option<String> {
        match self {
            CapturedError::Structured { message, .. } => non_empty(message.as_deref()),
            CapturedError::Opaque(value) => value
                .get("message")
                .and_then(Value::as_str)
                .and_then(|s| non_empty(Some(s))),
            _ => None,
        }
    }

    pub fn stack(&self) -> String {
        let found = match self {
            CapturedError::Structured { stack, cause, .. } => {
                non_empty(stack.as_deref()).or_else(|| match cause.as_deref() {
                    Some(CapturedError::Structured { stack, .. }) => non_empty(stack.as_deref()),
                    Some(CapturedError::Opaque(value)) => value
                        .get("stack")
                        .and_then(Value::as_str)
                        .and_then(|s| non_empty(Some(s))),
                    _ => None,
                })
            }
            CapturedError::Opaque(value) => probe(value, "stack"),
            CapturedError::Text(_) | CapturedError::Absent => None,
        };

        found.unwrap_or_else(|| NO_STACK_TRACE.to_string())
    }

    pub fn kind(&self) -> String {
        match self {
            CapturedError::Structured { kind, .. } if !kind.trim().is_empty() => kind.clone(),
            _ => UNKNOWN_ERROR_KIND.to_string(),
        }
    }
}

/// Looks for `field` on the value itself, then on a nested `error` object.
/// A bare JSON string counts as the message.
fn probe(value: &Value, field: &str) -> Option<String> {
    if let Some(s) = value.get(field).and_then(Value::as_str) {
        if let Some(found) = non_empty(Some(s)) {
            return Some(found);
        }
    }
    if let Some(s) = value
        .get("error")
        .and_then(|inner| inner.get(field))
        .and_then(Value::as_str)
    {
        if let Some(found) = non_empty(Some(s)) {
            return Some(found);
        }
    }
    match value {
        Value::String(s) if field == "message" => non_empty(Some(s)),
        _ => None,
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.filter(|s| !s.is_empty()).map(str::to_string)
}

fn backtrace_text(backtrace: &Backtrace) -> Option<String> {
    match backtrace.status() {
        BacktraceStatus::Captured => Some(backtrace.to_string()),
        _ => None,
    }
}

fn short_type_name(full: &str) -> String {
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
        .to_string()
}

impl From<&str> for CapturedError {
    fn from(text: &str) -> Self {
        CapturedError::Text(text.to_string())
    }
}

impl From<String> for CapturedError {
    fn from(text: String) -> Self {
        CapturedError::Text(text)
    }
}

impl From<Value> for CapturedError {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => CapturedError::Absent,
            Value::String(text) => CapturedError::Text(text),
            other => CapturedError::Opaque(other),
        }
    }
}

impl<T: Into<CapturedError>> From<Option<T>> for CapturedError {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CapturedError::Absent)
    }
}

impl From<anyhow::Error> for CapturedError {
    fn from(error: anyhow::Error) -> Self {
        CapturedError::from_anyhow(&error)
    }
}

impl From<std::io::Error> for CapturedError {
    fn from(error: std::io::Error) -> Self {
        CapturedError::from_error(&error)
    }
}
