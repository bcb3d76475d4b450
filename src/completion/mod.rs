//! Completion subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher finishes a dispatch (I/O thread)
//!     → executor.rs (CallbackExecutor decides where completion runs)
//!     → handle.rs (CompletionHandle::resolve, exactly once)
//!         → listeners flushed in registration order
//!         → threads parked in wait() woken (condvar)
//!         → tasks awaiting outcome() woken (Notify)
//! ```
//!
//! # Design Decisions
//! - One handle serves blocking and non-blocking callers alike
//! - Late listeners run immediately with the stored outcome
//! - Callbacks never run while the handle's lock is held

pub mod executor;
pub mod handle;

pub use executor::{BlockingPoolExecutor, CallbackExecutor, InlineExecutor, Task};
pub use handle::CompletionHandle;
