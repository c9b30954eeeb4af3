use clap::{Parser, Subcommand};
use pixgate::{config, output, server};
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing_subscriber::EnvFilter;

static VERSION: LazyLock<String> = LazyLock::new(|| {
    version_from(env!("ON_RELEASE_TAG"), env!("CARGO_PKG_VERSION"), env!("GIT_HASH"))
});

fn version_from(on_tag: &str, release: &str, hash: &str) -> String {
    if on_tag == "true" {
        release.to_string()
    } else if hash.is_empty() {
        "dev@unknown".to_string()
    } else {
        format!("dev@{hash}")
    }
}

fn version_string() -> &'static str {
    VERSION.as_str()
}

#[derive(Parser)]
#[command(name = "pixgate")]
#[command(about = "On-the-fly image delivery gateway")]
#[command(long_about = "\
On-the-fly image delivery gateway

Every GET path names an image in the configured storage backend. Without a
query string the bytes are served as stored; with one they are transformed
and re-encoded in the source format.

Query parameters:

  w, h     target width / height in pixels
  fit      crop | scale (default: fit within w×h)
  rot      90 | 180 | 270
  flip     h | v | hv
  auto     compress (size-adaptive JPEG quality)

Responses carry Cache-Control: public,max-age=<cache_time> and Vary: Accept.

Run 'pixgate gen-config' to generate a documented pixgate.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Configuration file (stock defaults when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server
    Serve {
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
        /// Enable the /debug routes
        #[arg(long)]
        debug: bool,
    },
    /// Validate the configuration and print what the server would do
    Check,
    /// Print a stock pixgate.toml with all options documented
    GenConfig,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pixgate=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { port, debug } => {
            init_tracing();
            let mut gateway_config = config::load_config(cli.config.as_deref())?;
            if let Some(port) = port {
                gateway_config.port = port;
            }
            gateway_config.debug |= debug;
            tracing::info!(version = version_string(), "starting pixgate");
            server::serve(gateway_config).await?;
        }
        Command::Check => {
            let gateway_config = config::load_config(cli.config.as_deref())?;
            output::print_check_output(&gateway_config);
            println!("==> Configuration is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
