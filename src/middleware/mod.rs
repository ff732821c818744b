//! Request middleware

pub mod trace;

pub use trace::{trace_logging, FrameworkTrace, TraceId, TraceLogging, TRACE_ID_HEADER};
