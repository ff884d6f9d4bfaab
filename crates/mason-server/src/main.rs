use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use mason_resolve::LocalRepositoryResolver;
use mason_server::{serve, ResolutionService, ServiceConfig, UnconfiguredTransport};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let args = Args::parse()?;
    init_tracing();

    info!(
        target: "mason.server",
        listen = ?args.listen,
        local_repo = %args.local_repo.display(),
        "starting resolution server"
    );

    let resolver = Arc::new(LocalRepositoryResolver::new(&args.local_repo));
    let service = ResolutionService::new(
        resolver,
        Arc::new(UnconfiguredTransport),
        ServiceConfig::default(),
    );

    match args.listen {
        Listen::Stdio => {
            let stdio = tokio::io::join(tokio::io::stdin(), tokio::io::stdout());
            serve(service, stdio).await?;
        }
        Listen::Tcp(addr) => {
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("bind {addr}"))?;
            let local = listener.local_addr().context("local addr")?;
            info!(target: "mason.server", addr = %local, "listening");
            let (stream, peer) = listener.accept().await.context("accept connection")?;
            info!(target: "mason.server", peer = %peer, "client connected");
            serve(service, stream).await?;
        }
    }

    info!(target: "mason.server", "server stopped");
    Ok(())
}

#[derive(Debug)]
enum Listen {
    Stdio,
    Tcp(SocketAddr),
}

struct Args {
    listen: Listen,
    local_repo: PathBuf,
}

impl Args {
    fn parse() -> Result<Self> {
        let mut listen = Listen::Stdio;
        let mut local_repo = default_local_repo();

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--listen" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--listen requires a value"))?;
                    listen = match value.as_str() {
                        "stdio" => Listen::Stdio,
                        other => match other.strip_prefix("tcp:") {
                            Some(addr) => Listen::Tcp(
                                addr.parse()
                                    .with_context(|| format!("invalid tcp address {addr}"))?,
                            ),
                            None => {
                                return Err(anyhow!(
                                    "unsupported listen address `{other}`; use `stdio` or `tcp:host:port`"
                                ))
                            }
                        },
                    };
                }
                "--local-repo" => {
                    local_repo = PathBuf::from(
                        args.next()
                            .ok_or_else(|| anyhow!("--local-repo requires a value"))?,
                    );
                }
                "--help" | "-h" => {
                    println!(
                        "usage: mason-server [--listen stdio|tcp:host:port] [--local-repo <path>]"
                    );
                    std::process::exit(0);
                }
                other => return Err(anyhow!("unknown argument `{other}`")),
            }
        }

        Ok(Self { listen, local_repo })
    }
}

fn default_local_repo() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .map(|home| home.join(".m2/repository"))
        .unwrap_or_else(|| PathBuf::from(".m2/repository"))
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("MASON_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
