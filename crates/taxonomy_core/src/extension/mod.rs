//! Extension points for term operations.
//!
//! Host code plugs typed listeners into a manager instead of registering
//! callbacks by name. Dynamic loading is out of scope.

pub mod listener;

pub use listener::{SetObjectTermsEvent, TermHooks, TermLifecycleListener};
