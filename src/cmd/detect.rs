//! The default command: OCR one image and print a JSON result.
//!
//! Callers parse our standard output, so it always gets exactly one line of
//! JSON, even when something goes wrong. Logs go to stderr.

use std::{io::Write as _, process::ExitCode};

use crate::{
    elements::OcrResult,
    engine::{EngineOpts, EngineProvider, detect_text},
    prelude::*,
    ui::Ui,
};

/// Usage message reported when no image path is given.
pub const USAGE: &str = concat!("Usage: ", env!("CARGO_PKG_NAME"), " <image_path>");

/// OCR `image_path` and print the result.
///
/// A missing path is a usage error, and exits with a failure code. Everything
/// else, including a broken OCR engine, is reported in the JSON and exits 0.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_detect(
    ui: Ui,
    engine_opts: &EngineOpts,
    image_path: Option<&Path>,
) -> Result<ExitCode> {
    let Some(image_path) = image_path else {
        print_result(&OcrResult::usage(USAGE))?;
        return Ok(ExitCode::FAILURE);
    };

    let provider = EngineProvider::new(engine_opts.clone());
    let spinner = ui.new_spinner("Running OCR", "OCR finished");
    let result = detect_text(&provider, image_path).await;
    spinner.finish_and_clear();

    print_result(&result)?;
    Ok(ExitCode::SUCCESS)
}

/// Report a command-line parse error.
///
/// `--help` and `--version` behave as usual. Anything else is reported as a
/// usage error in our JSON format, so callers don't need to scrape stderr.
pub fn report_parse_error(err: clap::Error) -> Result<ExitCode> {
    use clap::error::ErrorKind;
    match err.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => err.exit(),
        _ => {
            debug!("Command-line error: {}", err);
            print_result(&OcrResult::usage(USAGE))?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Write a result to standard output as a single line of JSON.
fn print_result(result: &OcrResult) -> Result<()> {
    let line = serde_json::to_string(result).context("cannot serialize OCR result")?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", line).context("cannot write to stdout")?;
    stdout.flush().context("cannot flush stdout")?;
    Ok(())
}
