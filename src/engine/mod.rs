//! OCR engine interface, and the per-process engine cache.
//!
//! Loading PaddleOCR is slow (model weights, possibly a first-run download),
//! so we do it once per process and share the result. Callers get the engine
//! from an [`EngineProvider`], which they pass around explicitly.

use std::sync::Arc;

use clap::Args;
use tokio::sync::OnceCell;

use crate::{
    elements::{DetectedTextElement, OcrResult},
    normalize::{RawOcrOutput, normalize},
    prelude::*,
};

use self::{device::DevicePreference, worker::PaddleWorkerEngine};

pub mod device;
pub mod worker;

/// A loaded OCR engine.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Run OCR on the image at `image_path` and return the engine's raw output.
    async fn detect(&self, image_path: &Path) -> Result<RawOcrOutput>;
}

/// Something that knows how to load an [`OcrEngine`].
#[async_trait]
pub trait EngineFactory: Send + Sync {
    /// Load a new engine. This may be very slow.
    async fn create(&self) -> Result<Arc<dyn OcrEngine>>;
}

/// Creates an engine on first use, then hands out the same engine forever.
pub struct EngineProvider {
    /// How to build the engine.
    factory: Box<dyn EngineFactory>,

    /// Empty until the first successful [`EngineProvider::acquire`].
    engine: OnceCell<Arc<dyn OcrEngine>>,
}

impl EngineProvider {
    /// Create a provider. Nothing is loaded until [`EngineProvider::acquire`].
    pub fn new(factory: impl EngineFactory + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            engine: OnceCell::new(),
        }
    }

    /// Get the engine, loading it if this is the first call. Concurrent first
    /// calls wait for a single load.
    pub async fn acquire(&self) -> Result<Arc<dyn OcrEngine>> {
        let engine = self
            .engine
            .get_or_try_init(|| async {
                info!("Loading OCR engine");
                self.factory.create().await
            })
            .await
            .context("cannot initialize OCR engine")?;
        Ok(engine.clone())
    }

    /// Has the engine been loaded yet?
    #[cfg(test)]
    pub fn is_loaded(&self) -> bool {
        self.engine.initialized()
    }
}

/// Options controlling how the OCR engine is loaded.
#[derive(Clone, Debug, Args)]
pub struct EngineOpts {
    /// Device to run OCR on. `auto` uses the GPU if PaddlePaddle reports one.
    #[clap(
        long,
        value_enum,
        env = "OCR_DEVICE",
        default_value = "auto",
        global = true
    )]
    pub device: DevicePreference,

    /// PaddleOCR language model to load.
    #[clap(long, env = "OCR_LANG", default_value = "en", global = true)]
    pub lang: String,

    /// Turn off text angle classification.
    #[clap(long, global = true)]
    pub no_angle_cls: bool,

    /// Program used to run the OCR worker.
    #[clap(
        long,
        env = "OCR_WORKER_PROGRAM",
        default_value = "python3",
        global = true
    )]
    pub worker_program: PathBuf,

    /// Worker script to run instead of the built-in one.
    #[clap(long, env = "OCR_WORKER_SCRIPT", global = true)]
    pub worker_script: Option<PathBuf>,

    /// Pass `HTTP_PROXY` and friends through to the worker. By default they are
    /// removed, because they break PaddleOCR's model downloads.
    #[clap(long, global = true)]
    pub keep_proxy_env: bool,
}

#[async_trait]
impl EngineFactory for EngineOpts {
    async fn create(&self) -> Result<Arc<dyn OcrEngine>> {
        Ok(Arc::new(PaddleWorkerEngine::start(self).await?))
    }
}

/// Run OCR on a single image and normalize the output.
#[instrument(level = "debug", skip_all, fields(path = %image_path.display()))]
pub async fn detect_elements(
    engine: &dyn OcrEngine,
    image_path: &Path,
) -> Result<Vec<DetectedTextElement>> {
    if !image_path.is_file() {
        bail!("image file not found: {}", image_path.display());
    }
    let raw = engine.detect(image_path).await?;
    let elements = normalize(&raw);
    debug!("Found {} text elements", elements.len());
    Ok(elements)
}

/// Acquire the engine and run OCR, with any failure (including a failure to
/// load the engine) folded into the result.
pub async fn detect_text(
    provider: &EngineProvider,
    image_path: &Path,
) -> OcrResult {
    let outcome = async {
        let engine = provider.acquire().await?;
        detect_elements(engine.as_ref(), image_path).await
    }
    .await;
    if let Err(err) = &outcome {
        error!("OCR failed: {:?}", err);
    }
    OcrResult::from_detection(outcome)
}
