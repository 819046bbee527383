//! Mutating admission webhook injecting a sidecar container into pods that
//! ask for one through annotations.

pub mod admit;
pub mod annotations;
pub mod error;
pub mod patch;
pub mod server;
pub mod sidecar;
pub mod typings;

pub use admit::Injector;
