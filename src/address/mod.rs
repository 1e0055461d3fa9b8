//! # ADDRESS dispatch
//!
//! Named environments that receive command strings (`ADDRESS X` then `"cmd"`) or method
//! calls (`LET r = method k=v`). Every dispatch is normalized into a [`DispatchOutcome`],
//! which the engine turns into RC, RESULT and ERRORTEXT.

pub mod dispatch;
pub mod handler;
pub mod registry;

pub use dispatch::{dispatch, DispatchError, DispatchOutcome};
pub use handler::{
    handler_fn, AddressCall, AddressHandler, AddressTarget, FnHandler, HandlerError,
    HandlerResponse, MockAddressHandler, SourceContext, TargetMetadata,
};
pub use registry::AddressRegistry;
