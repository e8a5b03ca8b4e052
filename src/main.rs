//! roost - serve one HTTP service as a single process or a supervised pool
//! of worker processes sharing one port.
//!
//! The binary serves a built-in status responder; it exists to run and
//! observe topologies end to end. Real services embed the library and pass
//! their own handler to [`roost::Topology::establish`].

use std::path::{Path, PathBuf};

use anyhow::Result;
use bytes::Bytes;
use clap::Parser;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{self, HeaderValue};
use hyper::{Request, Response};
use tracing::{error, warn};

use roost::config::Config;
use roost::{logging, BindFailurePolicy, Topology, TransportCredentials};

const AFTER_HELP: &str = "\
EXAMPLES:
  roost                              Serve on port 3000, single process
  roost -p 8080 -w 4                 Four workers sharing port 8080
  roost -w 4 --abort-on-bind-failure Fail the whole pool on a bind race
  roost --tls-cert cert.pem --tls-key key.pem
                                     Serve over TLS
  RUST_LOG=debug roost -v            Debug logging

CONFIG:
  Settings are read from roost.toml (or --config PATH) and overridden by
  flags. See the [server] table: port, workers, quiet, on_bind_failure, tls.";

#[derive(Parser)]
#[command(name = "roost")]
#[command(version)]
#[command(about = "Serve an HTTP service as one process or a supervised worker pool")]
#[command(after_help = AFTER_HELP)]
struct Cli {
    /// Path to a TOML config file (default: roost.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Number of worker processes (1 = single process, no forking)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Suppress topology lifecycle log lines
    #[arg(short, long)]
    quiet: bool,

    /// PEM certificate chain enabling TLS
    #[arg(long, requires = "tls_key")]
    tls_cert: Option<PathBuf>,

    /// PEM private key for the certificate
    #[arg(long, requires = "tls_cert")]
    tls_key: Option<PathBuf>,

    /// PEM CA bundle for optional client-certificate verification
    #[arg(long, requires = "tls_cert")]
    tls_ca: Option<PathBuf>,

    /// Stop the whole pool if a worker loses the bind race at startup
    #[arg(long)]
    abort_on_bind_failure: bool,

    /// Enable verbose/debug output
    #[arg(short, long)]
    verbose: bool,
}

/// Built-in responder: 200 with the serving pid, any method, any path.
/// Handy for watching the kernel spread requests across a worker pool.
async fn status(_req: Request<Incoming>) -> Response<Full<Bytes>> {
    let body = format!("roost: serving from pid {}\n", std::process::id());
    let mut response = Response::new(Full::new(Bytes::from(body)));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::from_file(path),
        None => {
            let default_path = Path::new("roost.toml");
            if default_path.exists() {
                Config::from_file(default_path)
            } else {
                Ok(Config::default())
            }
        },
    }
}

fn load_credentials(cli: &Cli, config: &Config) -> roost::Result<Option<TransportCredentials>> {
    if let (Some(cert), Some(key)) = (&cli.tls_cert, &cli.tls_key) {
        return TransportCredentials::from_pem_files(cert, key, cli.tls_ca.as_deref()).map(Some);
    }
    match &config.server.tls {
        Some(tls) => {
            TransportCredentials::from_pem_files(&tls.cert, &tls.key, tls.ca.as_deref()).map(Some)
        },
        None => Ok(None),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    let config = load_config(&cli)?;
    let validation = config.validate()?;
    for warning in &validation.warnings {
        warn!("{warning}");
    }

    let port = cli.port.unwrap_or(config.server.port);
    let workers = cli.workers.unwrap_or(config.server.workers);
    let quiet = cli.quiet || config.server.quiet;
    let policy = if cli.abort_on_bind_failure {
        BindFailurePolicy::Abort
    } else {
        config.server.on_bind_failure
    };

    let credentials = match load_credentials(&cli, &config) {
        Ok(credentials) => credentials,
        Err(err) => {
            error!(error = %err, "failed to load transport credentials");
            std::process::exit(err.exit_code());
        },
    };

    let mut topology = Topology::new(port)
        .workers(workers)
        .quiet(quiet)
        .bind_failure_policy(policy);
    if let Some(credentials) = credentials {
        topology = topology.credentials(credentials);
    }

    let handle = match topology.establish(status).await {
        Ok(handle) => handle,
        Err(err) => {
            error!(error = %err, "failed to establish serving topology");
            std::process::exit(err.exit_code());
        },
    };

    handle.wait().await;
    Ok(())
}
