//! Invocation role resolution
//!
//! Pure validation over the parsed command line. Decides whether this
//! invocation is the parent (owns launch files, may start the registry) or a
//! child agent (receives its configuration from a parent over the network),
//! and rejects flag combinations that contradict each other.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Normalized command-line input
///
/// Created once from the CLI and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationContext {
    /// Child agent name (`-c/--child`)
    pub child_name: Option<String>,
    /// Parent's address, child mode only (`-u/--server_uri`)
    pub server_uri: Option<String>,
    /// Session identifier override (`--run_id`)
    pub run_id: Option<String>,
    /// Launch file paths, in command-line order
    pub launch_files: Vec<PathBuf>,
    /// Launch coordination services only (`--core`)
    pub core_only: bool,
    /// Block until the registry is reachable (`--wait`)
    pub wait_for_master: bool,
    /// Do not launch remote processes (`--local`)
    pub local_only: bool,
    /// Port for a launched registry (`-p/--port`)
    pub port: Option<u16>,
    /// Node whose resolved arguments should be printed (`--args`)
    pub node_args_query: Option<String>,
}

/// Role played by this invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Owns launch input and orchestrates children
    Parent {
        /// Launch coordination services only
        core_only: bool,
    },
    /// Receives configuration from a parent
    Child,
}

impl Role {
    /// Whether this is the child role
    #[must_use]
    pub const fn is_child(self) -> bool {
        matches!(self, Self::Child)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parent { core_only: true } => write!(f, "parent (core only)"),
            Self::Parent { core_only: false } => write!(f, "parent"),
            Self::Child => write!(f, "child"),
        }
    }
}

/// What the invocation asks for once validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Bootstrap a session in the given role
    Launch(Role, InvocationContext),
    /// Print resolved arguments for a node; no session is negotiated
    NodeArgs {
        /// Node to introspect
        node: String,
        /// Launch files to read
        files: Vec<PathBuf>,
    },
}

/// Contradictory or incomplete command line
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    /// Child mode without the parent's address
    #[error("--child option requires --server_uri to be set as well")]
    ChildWithoutServerUri,

    /// Child mode without a session identifier
    #[error("--child option requires --run_id to be set as well")]
    ChildWithoutRunId,

    /// Registry port given to a child
    #[error("--port option cannot be used with child mode")]
    PortWithChild,

    /// Launch files given to a child
    #[error("input files are not allowed when run in child mode")]
    FilesWithChild,

    /// Launch files given with `--core`
    #[error("input files are not allowed when launching core")]
    FilesWithCore,

    /// Session identifier given with `--core`
    #[error("--run_id should only be set for child launches (-c)")]
    RunIdWithCore,

    /// `--wait` combined with `--core`
    #[error("--wait cannot be used with --core")]
    WaitWithCore,

    /// Parent launch without launch files
    #[error("you must specify at least one input file")]
    NoLaunchFiles,

    /// `--args` without a launch file to read
    #[error("please specify a launch file for --args")]
    NodeArgsWithoutLaunchFile,

    /// Launch files that do not exist
    #[error("the following input files do not exist: {}", display_paths(.0))]
    MissingLaunchFiles(Vec<PathBuf>),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolve the role of this invocation
///
/// The role depends on `ctx` alone. Only the default parent branch touches the
/// filesystem, and only to check that launch files exist. An empty run id
/// counts as absent.
///
/// # Errors
///
/// Returns a [`UsageError`] naming the missing or forbidden input
pub fn resolve(mut ctx: InvocationContext) -> Result<(Role, InvocationContext), UsageError> {
    ctx.run_id = ctx.run_id.take().filter(|id| !id.is_empty());

    if ctx.wait_for_master && ctx.core_only {
        return Err(UsageError::WaitWithCore);
    }

    if ctx.child_name.is_some() {
        if ctx.server_uri.is_none() {
            return Err(UsageError::ChildWithoutServerUri);
        }
        if ctx.run_id.is_none() {
            return Err(UsageError::ChildWithoutRunId);
        }
        if ctx.port.is_some() {
            return Err(UsageError::PortWithChild);
        }
        if !ctx.launch_files.is_empty() {
            return Err(UsageError::FilesWithChild);
        }
        return Ok((Role::Child, ctx));
    }

    if ctx.core_only {
        if !ctx.launch_files.is_empty() {
            return Err(UsageError::FilesWithCore);
        }
        if ctx.run_id.is_some() {
            return Err(UsageError::RunIdWithCore);
        }
        return Ok((Role::Parent { core_only: true }, ctx));
    }

    if ctx.launch_files.is_empty() {
        return Err(UsageError::NoLaunchFiles);
    }
    check_files_exist(&ctx.launch_files)?;

    Ok((Role::Parent { core_only: false }, ctx))
}

/// Validate the full request, including the node-args introspection path
///
/// A node-args query short-circuits role resolution: it only needs launch
/// files to read.
///
/// # Errors
///
/// Returns a [`UsageError`] when the request is contradictory or incomplete
pub fn resolve_request(ctx: InvocationContext) -> Result<Request, UsageError> {
    if let Some(node) = ctx.node_args_query.clone() {
        if ctx.launch_files.is_empty() {
            return Err(UsageError::NodeArgsWithoutLaunchFile);
        }
        check_files_exist(&ctx.launch_files)?;
        return Ok(Request::NodeArgs {
            node,
            files: ctx.launch_files,
        });
    }

    let (role, ctx) = resolve(ctx)?;
    Ok(Request::Launch(role, ctx))
}

fn check_files_exist(files: &[PathBuf]) -> Result<(), UsageError> {
    let missing: Vec<PathBuf> = files.iter().filter(|f| !f.exists()).cloned().collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(UsageError::MissingLaunchFiles(missing))
    }
}
