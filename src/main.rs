use std::{process::ExitCode, str::FromStr};

use clap::{Parser, Subcommand};
use tracing_subscriber::{
    EnvFilter, Layer as _, filter::Directive, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt as _,
};

use self::{engine::EngineOpts, prelude::*, ui::Ui};

mod async_utils;
mod cmd;
mod data_url;
mod elements;
mod engine;
mod normalize;
mod prelude;
mod server;
mod ui;

/// Find text in images using PaddleOCR, and print it as JSON.
#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    after_help = r#"
Environment Variables:
  - OCR_DEVICE: `auto`, `gpu` or `cpu`.
  - OCR_LANG: PaddleOCR language model.
  - OCR_WORKER_PROGRAM: Python interpreter used to run PaddleOCR.
  - OCR_WORKER_SCRIPT: Replacement worker script.
  - OCR_LISTEN: Address for `serve`.
  - RUST_LOG: Log filter. Logs are written to stderr.

  These variables may be set in a standard `.env` file.
"#
)]
struct Opts {
    /// Image to OCR.
    #[clap(value_name = "IMAGE_PATH")]
    image_path: Option<PathBuf>,

    #[clap(flatten)]
    engine: EngineOpts,

    #[clap(subcommand)]
    subcmd: Option<Cmd>,
}

/// The subcommands we support.
#[derive(Debug, Subcommand)]
enum Cmd {
    /// Run the HTTP API.
    Serve(cmd::serve::ServeOpts),
    /// Print schemas for input and output formats.
    Schema(cmd::schema::SchemaOpts),
}

/// Our entry point, which can return an error. [`anyhow::Result`] will
/// automatically print a nice error message with optional backtrace.
#[tokio::main]
async fn main() -> Result<ExitCode> {
    let ui = Ui::init();

    // Initialize tracing.
    let directive =
        Directive::from_str("info").expect("built-in directive should be valid");
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_writer(ui.get_stderr_writer())
        .with_filter(env_filter);

    tracing_subscriber::registry().with(subscriber).init();

    // Call our real `main` function now that logging is set up.
    real_main(ui).await
}

/// Our real entry point.
#[instrument(level = "debug", name = "main", skip_all)]
async fn real_main(ui: Ui) -> Result<ExitCode> {
    // Load environment variables from a `.env` file, if it exists.
    dotenvy::dotenv().ok();

    // Parse command-line arguments.
    let opts = match Opts::try_parse() {
        Ok(opts) => opts,
        Err(err) => return cmd::detect::report_parse_error(err),
    };
    debug!("Parsed options: {:?}", opts);

    match &opts.subcmd {
        None => {
            cmd::detect::cmd_detect(ui, &opts.engine, opts.image_path.as_deref()).await
        }
        Some(Cmd::Serve(serve_opts)) => {
            cmd::serve::cmd_serve(ui, &opts.engine, serve_opts).await?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Cmd::Schema(schema_opts)) => {
            cmd::schema::cmd_schema(schema_opts).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
