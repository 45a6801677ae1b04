use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

use httpipe::config::Config;
use httpipe::{Client, IncomingRequest, Method, PipeDialer, PipeListener, Request, Response, Server};

#[derive(Parser)]
#[command(name = "httpipe", about = "HTTP/1.0 over named pipes")]
struct Cli {
    /// Pipe name, overriding the configuration.
    #[arg(long, global = true)]
    pipe: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an echo server until Ctrl-C.
    Serve,
    /// Send one request and print the response.
    Request {
        method: String,
        target: String,
        /// Request body.
        #[arg(long)]
        data: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut cfg = Config::load()?;
    if let Some(pipe) = cli.pipe {
        cfg.pipe.name = pipe;
    }

    match cli.command {
        Command::Serve => serve(cfg).await,
        Command::Request {
            method,
            target,
            data,
        } => request(cfg, &method, target, data).await,
    }
}

async fn echo(mut request: IncomingRequest) -> anyhow::Result<Response> {
    let mut body = Vec::new();
    request.body.read_to_end(&mut body).await?;

    Ok(Response::builder(200u16)
        .header("X-Method", request.head.method.as_str())
        .header("X-Target", request.head.target.as_str())
        .body(body)
        .build())
}

async fn serve(cfg: Config) -> anyhow::Result<()> {
    let server = Server::new(PipeListener::new(cfg.pipe), echo, cfg.codec);

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            }
        })
        .await?;
    Ok(())
}

async fn request(
    cfg: Config,
    method: &str,
    target: String,
    data: Option<String>,
) -> anyhow::Result<()> {
    let method: Method = method
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid method {method:?}"))?;

    let mut builder = Request::builder().method(method).target(target);
    if let Some(data) = data {
        builder = builder.body(data);
    }
    let request = builder.build().map_err(anyhow::Error::msg)?;

    let client = Client::new(PipeDialer::new(cfg.pipe), cfg.codec, cfg.client);
    let response = client.send(request).await?;

    println!("{} {}", response.status(), response.reason());
    for (name, values) in response.headers.iter() {
        println!("{name}: {}", values.join(httpipe::http::headers::value_separator(name)));
    }
    println!();
    print!("{}", response.text().await?);
    Ok(())
}
