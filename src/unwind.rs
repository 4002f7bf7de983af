//! Unwinding recovery utilities.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::string::ToString;
use core::any::Any;
use core::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::thread::Result;

/// Executes `f` and captures any panic, translating that panic into a
/// `Err` result. The payload is expected to be reported to whoever waits on
/// the result, so `f` can be treated as exception safe.
#[inline(always)]
pub fn halt_unwinding<F, R>(func: F) -> Result<R>
where
    F: FnOnce() -> R,
{
    catch_unwind(AssertUnwindSafe(func))
}

/// Extracts the message from a panic payload. Payloads produced by `panic!`
/// are either `&'static str` or `String`; anything else is reported opaquely.
pub fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "opaque panic payload".to_string()
    }
}

/// Converts a captured panic into its message, consuming the payload.
pub fn into_message(payload: Box<dyn Any + Send>) -> String {
    payload_message(&*payload)
}
