//! The `schema` subcommand.

use clap::{Args, ValueEnum};
use schemars::schema_for;
use tokio::io::{AsyncWrite, AsyncWriteExt as _};

use crate::{
    elements::{DetectedTextElement, OcrResult},
    prelude::*,
    server::ocr::{OcrRequest, OcrResponse},
};

/// The different schema types we support.
///
/// We parse these as PascalCase, because they represent type names.
#[derive(Debug, Clone, Copy, ValueEnum)]
#[clap(rename_all = "PascalCase")]
pub enum SchemaType {
    /// Command-line output.
    OcrResult,
    /// A single piece of detected text.
    DetectedTextElement,
    /// `POST /ocr` request body.
    OcrRequest,
    /// `POST /ocr` response body.
    OcrResponse,
}

/// Schema command line arguments.
#[derive(Debug, Args)]
pub struct SchemaOpts {
    /// The schema type to generate.
    #[clap(value_enum, value_name = "TYPE")]
    pub schema_type: SchemaType,

    /// The output path to write the schema to.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,
}

/// The `schema` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_schema(schema_opts: &SchemaOpts) -> Result<()> {
    let schema = match schema_opts.schema_type {
        SchemaType::OcrResult => schema_for!(OcrResult),
        SchemaType::DetectedTextElement => schema_for!(DetectedTextElement),
        SchemaType::OcrRequest => schema_for!(OcrRequest),
        SchemaType::OcrResponse => schema_for!(OcrResponse),
    };
    let mut schema_str =
        serde_json::to_string_pretty(&schema).context("failed to serialize schema")?;
    schema_str.push('\n');

    let mut wtr: Box<dyn AsyncWrite + Unpin + Send> = match &schema_opts.output_path {
        Some(path) => Box::new(
            tokio::fs::File::create(path)
                .await
                .with_context(|| format!("cannot create {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdout()),
    };
    wtr.write_all(schema_str.as_bytes())
        .await
        .context("failed to write schema")?;
    wtr.flush().await.context("failed to flush schema")?;
    Ok(())
}
