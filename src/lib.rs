//! rlaunch - session bootstrap for a distributed process launcher
//!
//! Every invocation, parent or child, runs the same bootstrap before any
//! process supervision starts:
//!
//! ```text
//! ┌───────────────┐   ┌──────────────┐   ┌──────────────────┐   ┌─────────────┐
//! │ Role resolver │──▶│ Registry wait │──▶│ Session negotiate │──▶│ Log wiring  │
//! │ (CLI only)    │   │ (--wait only) │   │ (run_id)          │   │ (per session)│
//! └───────────────┘   └──────────────┘   └──────────────────┘   └──────┬──────┘
//!                                                                      │
//!                                                 ┌────────────────────▼───┐
//!                                                 │ Parent / Child runtime │
//!                                                 └────────────────────────┘
//! ```

pub mod availability;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod logging;
pub mod registry;
pub mod role;
pub mod runtime;
pub mod session;

pub use bootstrap::{BootstrapContext, Bootstrapper, Launch};
pub use config::Config;
pub use error::{Error, ExitClass, Result};
pub use logging::{FileLogSink, LogSink, NullLogSink};
pub use registry::{HttpRegistryClient, RegistryClient, RegistryError, RegistryHandle};
pub use role::{InvocationContext, Request, Role, UsageError};
pub use runtime::{ChildRuntime, ParentRuntime, Runtime, select_runtime};
pub use session::{BackoffPolicy, SessionId, negotiate};
