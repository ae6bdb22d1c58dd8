//! Parent and child runtime dispatch
//!
//! The runtimes themselves live outside this crate. Each implementation here
//! hands a [`BootstrapContext`] off to its configured external command.

mod process;

use std::path::PathBuf;
use std::process::ExitCode;

use async_trait::async_trait;

pub use process::{Handoff, LOG_FILE_ENV, MASTER_URI_ENV, RUN_ID_ENV};

use crate::bootstrap::BootstrapContext;
use crate::config::{Config, RuntimeCommand};
use crate::registry::RegistryHandle;
use crate::role::Role;
use crate::{Error, Result};

/// A runtime that takes over once bootstrap completes
#[async_trait]
pub trait Runtime: Send + Sync {
    /// Runtime name, for logs
    fn name(&self) -> &'static str;

    /// Run the session; the returned code becomes the process exit status
    ///
    /// # Errors
    ///
    /// Returns error if the runtime cannot be started
    async fn run(&self, ctx: BootstrapContext) -> Result<ExitCode>;
}

/// Runtime owning launch files and orchestrating children
#[derive(Debug, Clone)]
pub struct ParentRuntime {
    command: Option<RuntimeCommand>,
    registry: RegistryHandle,
}

impl ParentRuntime {
    /// Create from configuration
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            command: config.runtime.parent.clone(),
            registry: config.registry.clone(),
        }
    }

    /// Assemble the handoff for `ctx`
    ///
    /// # Errors
    ///
    /// Returns error if no parent command is configured
    pub fn handoff(&self, ctx: &BootstrapContext) -> Result<Handoff> {
        let command = require(self.command.as_ref(), "parent")?;
        let params = &ctx.params;

        let mut args = Vec::new();
        if let Role::Parent { core_only: true } = ctx.role {
            args.push("--core".to_string());
        }
        if let Some(port) = params.port {
            args.push("--port".to_string());
            args.push(port.to_string());
        }
        if params.local_only {
            args.push("--local".to_string());
        }
        args.extend(params.launch_files.iter().map(|f| f.display().to_string()));

        Ok(session_env(Handoff::new(command, args), ctx, &self.registry))
    }
}

#[async_trait]
impl Runtime for ParentRuntime {
    fn name(&self) -> &'static str {
        "parent"
    }

    async fn run(&self, ctx: BootstrapContext) -> Result<ExitCode> {
        let handoff = self.handoff(&ctx)?;
        run_logged(self.name(), &handoff, &ctx).await
    }
}

/// Runtime receiving its configuration from a parent
#[derive(Debug, Clone)]
pub struct ChildRuntime {
    command: Option<RuntimeCommand>,
    registry: RegistryHandle,
}

impl ChildRuntime {
    /// Create from configuration
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            command: config.runtime.child.clone(),
            registry: config.registry.clone(),
        }
    }

    /// Assemble the handoff for `ctx`
    ///
    /// # Errors
    ///
    /// Returns error if no child command is configured or the context lacks
    /// the child name or parent address
    pub fn handoff(&self, ctx: &BootstrapContext) -> Result<Handoff> {
        let command = require(self.command.as_ref(), "child")?;
        let params = &ctx.params;

        let (Some(name), Some(server_uri)) = (&params.child_name, &params.server_uri) else {
            return Err(Error::Runtime(
                "child runtime needs a child name and server uri".to_string(),
            ));
        };

        let args = vec![
            "--child".to_string(),
            name.clone(),
            "--server-uri".to_string(),
            server_uri.clone(),
        ];

        Ok(session_env(Handoff::new(command, args), ctx, &self.registry))
    }
}

#[async_trait]
impl Runtime for ChildRuntime {
    fn name(&self) -> &'static str {
        "child"
    }

    async fn run(&self, ctx: BootstrapContext) -> Result<ExitCode> {
        let handoff = self.handoff(&ctx)?;
        run_logged(self.name(), &handoff, &ctx).await
    }
}

/// Pick the runtime for `role`
#[must_use]
pub fn select_runtime(role: Role, config: &Config) -> Box<dyn Runtime> {
    match role {
        Role::Parent { .. } => Box::new(ParentRuntime::new(config)),
        Role::Child => Box::new(ChildRuntime::new(config)),
    }
}

/// Print resolved arguments for `node` through the parent runtime
///
/// Read-only: no registry access, no session.
///
/// # Errors
///
/// Returns error if no parent command is configured or it cannot be started
pub async fn introspect_node_args(
    node: &str,
    files: &[PathBuf],
    config: &Config,
) -> Result<ExitCode> {
    let command = require(config.runtime.parent.as_ref(), "parent")?;
    let args = ["--args".to_string(), node.to_string()]
        .into_iter()
        .chain(files.iter().map(|f| f.display().to_string()));

    let status = Handoff::new(command, args).status().await?;
    Ok(ExitCode::from(status))
}

fn require<'a>(command: Option<&'a RuntimeCommand>, which: &str) -> Result<&'a RuntimeCommand> {
    command.ok_or_else(|| {
        Error::Runtime(format!(
            "no {which} runtime configured, set [runtime.{which}] in the config file"
        ))
    })
}

fn session_env(handoff: Handoff, ctx: &BootstrapContext, registry: &RegistryHandle) -> Handoff {
    let handoff = handoff
        .env(RUN_ID_ENV, ctx.session_id.as_str())
        .log_file(ctx.log.path());

    match registry.url() {
        Some(url) => handoff.env(MASTER_URI_ENV, url.as_str()),
        None => handoff,
    }
}

async fn run_logged(name: &str, handoff: &Handoff, ctx: &BootstrapContext) -> Result<ExitCode> {
    tracing::info!(runtime = name, session = %ctx.session_id, program = %handoff.program, "dispatching");

    let status = handoff.status().await?;
    ctx.log.info(&format!("{name} runtime exited with status {status}"));

    Ok(ExitCode::from(status))
}
