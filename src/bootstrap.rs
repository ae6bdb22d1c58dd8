//! Bootstrap orchestration
//!
//! Runs the steps every invocation completes before supervision starts:
//!
//! ```text
//! Start -> RoleResolved -> (MasterAwaited) -> SessionNegotiated
//!       -> LoggingInitialized -> Dispatched
//! ```
//!
//! A usage error stops at the first step, before any network access. The
//! output is a [`BootstrapContext`]; running the parent or child runtime is
//! the caller's job.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::availability;
use crate::config::Config;
use crate::logging::{self, LogSink, NullLogSink};
use crate::registry::RegistryClient;
use crate::role::{self, InvocationContext, Request, Role};
use crate::session::{self, BackoffPolicy, SessionId};
use crate::Result;

/// Everything the parent or child runtime receives
#[derive(Debug, Clone)]
pub struct BootstrapContext {
    /// Negotiated session identifier
    pub session_id: SessionId,
    /// Role of this invocation
    pub role: Role,
    /// Normalized command-line input
    pub params: InvocationContext,
    /// Session log channels
    pub log: Arc<dyn LogSink>,
}

/// Result of a successful bootstrap
#[derive(Debug, Clone)]
pub enum Launch {
    /// Hand the context to the runtime selected by its role
    Dispatch(BootstrapContext),
    /// Print resolved arguments for a node; no session was negotiated
    NodeArgs {
        /// Node to introspect
        node: String,
        /// Launch files to read
        files: Vec<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    RoleResolved,
    MasterAwaited,
    SessionNegotiated,
    LoggingInitialized,
    Dispatched,
}

/// Sequences role resolution, registry wait, session negotiation and log setup
#[derive(Debug)]
pub struct Bootstrapper<C> {
    client: C,
    poll_interval: Duration,
    backoff: BackoffPolicy,
    log_dir: PathBuf,
    cancel: CancellationToken,
}

impl<C: RegistryClient> Bootstrapper<C> {
    /// Create a bootstrapper using `client` for registry access
    #[must_use]
    pub fn new(client: C, config: &Config, cancel: CancellationToken) -> Self {
        Self {
            client,
            poll_interval: config.poll_interval,
            backoff: config.backoff,
            log_dir: config.log_dir.clone(),
            cancel,
        }
    }

    /// Registry client in use
    #[must_use]
    pub const fn client(&self) -> &C {
        &self.client
    }

    /// Run bootstrap for one invocation
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Usage`] for a bad command line,
    /// [`crate::Error::Cancelled`] if a wait is cancelled, and the negotiator's
    /// errors otherwise. Logging setup never fails bootstrap.
    pub async fn bootstrap(&self, ctx: InvocationContext) -> Result<Launch> {
        self.bootstrap_request(role::resolve_request(ctx)?).await
    }

    /// Run bootstrap for a request that already passed role resolution
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Cancelled`] if a wait is cancelled and the
    /// negotiator's errors otherwise
    pub async fn bootstrap_request(&self, request: Request) -> Result<Launch> {
        let (role, params) = match request {
            Request::Launch(role, params) => (role, params),
            Request::NodeArgs { node, files } => {
                tracing::debug!(%node, "node args query, skipping session bootstrap");
                return Ok(Launch::NodeArgs { node, files });
            }
        };
        tracing::debug!(stage = ?Stage::RoleResolved, %role, "bootstrap");

        // Must precede negotiation, otherwise an unreachable registry would be
        // treated as "no registry yet" and a fresh id generated
        if params.wait_for_master {
            availability::wait_for_registry(&self.client, self.poll_interval, &self.cancel)
                .await?;
            tracing::debug!(stage = ?Stage::MasterAwaited, "bootstrap");
        }

        let session_id = session::negotiate(
            params.run_id.as_deref(),
            params.wait_for_master,
            &self.client,
            &self.backoff,
            &self.cancel,
        )
        .await?;
        tracing::debug!(stage = ?Stage::SessionNegotiated, session = %session_id, "bootstrap");

        let log = self.correlate_logs(&session_id);
        tracing::debug!(stage = ?Stage::LoggingInitialized, "bootstrap");

        log.info(&format!("rlaunch starting with {params:?}"));
        log.info(if role.is_child() {
            "starting in child mode"
        } else {
            "starting in parent mode"
        });

        tracing::debug!(stage = ?Stage::Dispatched, %role, "bootstrap");
        Ok(Launch::Dispatch(BootstrapContext {
            session_id,
            role,
            params,
            log,
        }))
    }

    /// Wire the session log, degrading to a no-op sink on failure
    fn correlate_logs(&self, session_id: &SessionId) -> Arc<dyn LogSink> {
        let sink = logging::host_identity().and_then(|host| {
            logging::initialize(&self.log_dir, session_id, &host, std::process::id())
        });

        match sink {
            Ok(sink) => {
                if let Some(path) = sink.path() {
                    println!("... logging to {}", path.display());
                }
                Arc::new(sink)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "unable to configure logging, no log files will be generated"
                );
                Arc::new(NullLogSink)
            }
        }
    }
}
