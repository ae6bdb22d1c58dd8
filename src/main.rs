use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use rlaunch::{
    Bootstrapper, Config, Error, ExitClass, HttpRegistryClient, InvocationContext, Launch,
    select_runtime,
};

/// Exit status for a contradictory command line
const USAGE_STATUS: u8 = 2;

/// Exit status for an interrupted bootstrap
const CANCELLED_STATUS: u8 = 130;

/// rlaunch - launch a session of processes, as parent or child
#[derive(Parser)]
#[command(name = "rlaunch", version, about)]
struct Cli {
    /// Print command-line arguments for node
    #[arg(long = "args", value_name = "NODE_NAME")]
    node_args: Option<String>,

    /// Run as child service NAME. Required with -u
    #[arg(short = 'c', long = "child", value_name = "NAME")]
    child_name: Option<String>,

    /// Do not launch remote nodes
    #[arg(long = "local")]
    local_only: bool,

    /// URI of server. Required with -c
    #[arg(short = 'u', long = "server_uri", value_name = "URI")]
    server_uri: Option<String>,

    /// run_id of session. Required with -c
    #[arg(long = "run_id", value_name = "RUN_ID")]
    run_id: Option<String>,

    /// Wait for the registry to start before launching
    #[arg(long = "wait")]
    wait_for_master: bool,

    /// Registry port. Only valid if the registry is launched
    #[arg(short = 'p', long = "port", value_name = "PORT")]
    port: Option<u16>,

    /// Launch core services only
    #[arg(long = "core")]
    core: bool,

    /// Path to configuration file (overrides discovery)
    #[arg(long, env = "RLAUNCH_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Launch files
    #[arg(value_name = "FILES")]
    files: Vec<PathBuf>,
}

impl Cli {
    fn invocation(&self) -> InvocationContext {
        InvocationContext {
            child_name: self.child_name.clone(),
            server_uri: self.server_uri.clone(),
            run_id: self.run_id.clone(),
            launch_files: self.files.clone(),
            core_only: self.core,
            wait_for_master: self.wait_for_master,
            local_only: self.local_only,
            port: self.port,
            node_args_query: self.node_args.clone(),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "info,rlaunch=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => report(&e),
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let request = rlaunch::role::resolve_request(cli.invocation()).map_err(Error::from)?;

    let config = Config::load(cli.config.as_deref())?;
    tracing::debug!(registry = %config.registry, log_dir = %config.log_dir.display(), "loaded configuration");

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    let client = HttpRegistryClient::new(&config.registry, config.rpc_timeout)?;
    let bootstrapper = Bootstrapper::new(client, &config, cancel);

    match bootstrapper.bootstrap_request(request).await? {
        Launch::NodeArgs { node, files } => {
            Ok(rlaunch::runtime::introspect_node_args(&node, &files, &config).await?)
        }
        Launch::Dispatch(ctx) => {
            let runtime = select_runtime(ctx.role, &config);
            let log = ctx.log.clone();
            runtime.run(ctx).await.map_err(|e| {
                log.error(&e.to_string());
                e.into()
            })
        }
    }
}

/// Map a failure to its exit status, printing it on the way
fn report(e: &anyhow::Error) -> ExitCode {
    let Some(err) = e.downcast_ref::<Error>() else {
        eprintln!("{e:?}");
        return ExitCode::FAILURE;
    };

    match err.exit_class() {
        ExitClass::Usage => {
            let usage = Cli::command().error(ErrorKind::ArgumentConflict, err);
            let _ = usage.print();
            ExitCode::from(USAGE_STATUS)
        }
        ExitClass::Cancelled => {
            tracing::warn!("bootstrap cancelled");
            ExitCode::from(CANCELLED_STATUS)
        }
        ExitClass::Domain => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
        ExitClass::Unclassified => {
            eprintln!("{e:?}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use rlaunch::role::resolve_request;
    use rlaunch::{Request, Role, UsageError};

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("rlaunch").chain(args.iter().copied())).unwrap()
    }

    fn status(code: ExitCode) -> String {
        format!("{code:?}")
    }

    #[test]
    fn core_flag_resolves_to_core_parent() {
        let ctx = parse(&["--core"]).invocation();
        assert!(ctx.core_only);
        assert!(ctx.launch_files.is_empty());

        assert!(matches!(
            resolve_request(ctx),
            Ok(Request::Launch(Role::Parent { core_only: true }, _))
        ));
    }

    #[test]
    fn child_flags_map_into_the_context() {
        let ctx = parse(&["-c", "agent1", "-u", "http://host:11311", "--run_id", "abc123"])
            .invocation();
        assert_eq!(ctx.child_name.as_deref(), Some("agent1"));
        assert_eq!(ctx.server_uri.as_deref(), Some("http://host:11311"));
        assert_eq!(ctx.run_id.as_deref(), Some("abc123"));

        match resolve_request(ctx) {
            Ok(Request::Launch(Role::Child, params)) => {
                assert_eq!(params.run_id.as_deref(), Some("abc123"));
            }
            other => panic!("expected child launch, got {other:?}"),
        }
    }

    #[test]
    fn long_and_short_flags_agree() {
        let long = parse(&["--child", "a", "--server_uri", "http://h:1", "--run_id", "r"]);
        let short = parse(&["-c", "a", "-u", "http://h:1", "--run_id", "r"]);
        assert_eq!(long.invocation(), short.invocation());
    }

    #[test]
    fn missing_launch_file_is_named() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.xml");
        let ctx = parse(&[missing.to_str().unwrap()]).invocation();
        assert_eq!(ctx.launch_files, vec![missing.clone()]);

        let err = resolve_request(ctx).unwrap_err();
        assert_eq!(err, UsageError::MissingLaunchFiles(vec![missing]));
        assert!(err.to_string().contains("missing.xml"));
    }

    #[test]
    fn wait_with_core_is_rejected() {
        let ctx = parse(&["--wait", "--core"]).invocation();
        assert_eq!(resolve_request(ctx), Err(UsageError::WaitWithCore));
    }

    #[tokio::test]
    async fn usage_error_wins_over_unreadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("absent.toml");
        let cli = parse(&["--config", config.to_str().unwrap(), "--wait", "--core"]);

        let err = run(cli).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::Usage(UsageError::WaitWithCore))
        ));
        assert_eq!(status(report(&err)), status(ExitCode::from(USAGE_STATUS)));
    }

    #[tokio::test]
    async fn unreadable_config_is_a_domain_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("absent.toml");
        let cli = parse(&["--config", config.to_str().unwrap(), "--core"]);

        let err = run(cli).await.unwrap_err();

        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Config(_))));
        assert_eq!(status(report(&err)), status(ExitCode::FAILURE));
    }

    #[test]
    fn exit_statuses_follow_error_class() {
        let session = anyhow::Error::from(Error::Session("empty value".to_string()));
        assert_eq!(status(report(&session)), status(ExitCode::FAILURE));

        let cancelled = anyhow::Error::from(Error::Cancelled);
        assert_eq!(
            status(report(&cancelled)),
            status(ExitCode::from(CANCELLED_STATUS))
        );

        let other = anyhow::anyhow!("unexpected");
        assert_eq!(status(report(&other)), status(ExitCode::FAILURE));
    }
}
