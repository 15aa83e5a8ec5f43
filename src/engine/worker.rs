//! OCR engine backed by a PaddleOCR worker process.
//!
//! PaddleOCR is a Python library, so we run it in a child process and talk to
//! it over line-delimited JSON:
//!
//! 1. worker → `{"type":"probe", ...}`, reporting accelerator support.
//! 2. us → `{"type":"init", ...}`, with the device we picked.
//! 3. worker → `{"type":"ready"}` once the models are loaded.
//! 4. us → `{"type":"detect","image_path":...}`, answered by
//!    `{"type":"result","raw":...}`.
//!
//! Any step may instead be answered with `{"type":"error", ...}`. The worker's
//! stderr is copied into our log.
//!
//! Replies carry no request id, so each request must have its reply read
//! before the next request is sent. Exchanges therefore run in their own
//! task, which finishes even if the caller stops waiting.

use std::{process::Stdio, sync::Arc};

use tokio::{
    io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader, Lines},
    process::{Child, ChildStderr, ChildStdin, ChildStdout, Command},
    sync::Mutex,
};

use crate::{
    async_utils::spawn_propagating_panics, normalize::RawOcrOutput, prelude::*,
};

use super::{
    EngineOpts, OcrEngine,
    device::{AcceleratorProbe, Device, select_device},
};

/// The worker script we run when none is configured.
const WORKER_SCRIPT: &str = include_str!("paddle_worker.py");

/// Proxy variables which interfere with PaddleOCR's model downloads.
const PROXY_VARS: &[&str] = &[
    "HTTP_PROXY",
    "HTTPS_PROXY",
    "ALL_PROXY",
    "NO_PROXY",
    "http_proxy",
    "https_proxy",
    "all_proxy",
    "no_proxy",
];

/// Messages we send to the worker.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WorkerRequest<'a> {
    Init {
        device: Device,
        lang: &'a str,
        use_angle_cls: bool,
    },
    Detect {
        image_path: &'a Path,
    },
}

/// Messages the worker sends us.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WorkerReply {
    Probe(AcceleratorProbe),
    Ready,
    Result {
        #[serde(default)]
        raw: Option<RawOcrOutput>,
    },
    Error {
        message: String,
        #[serde(default)]
        traceback: Option<String>,
    },
}

/// Turn a worker error reply into an error, keeping the worker's traceback as
/// the underlying cause.
fn worker_error(message: String, traceback: Option<String>) -> anyhow::Error {
    match traceback {
        Some(traceback) => anyhow!("{}", traceback.trim_end()).context(message),
        None => anyhow!("{}", message),
    }
}

/// The worker's pipes.
struct WorkerIo {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl WorkerIo {
    async fn send(&mut self, request: &WorkerRequest<'_>) -> Result<()> {
        let mut line =
            serde_json::to_string(request).context("cannot serialize OCR worker request")?;
        line.push('\n');
        self.stdin
            .write_all(line.as_bytes())
            .await
            .context("cannot write to OCR worker")?;
        self.stdin
            .flush()
            .await
            .context("cannot flush OCR worker input")?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<WorkerReply> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await
                .context("cannot read from OCR worker")?;
            let Some(line) = line else {
                return Err(self.exit_error());
            };
            if line.trim().is_empty() {
                continue;
            }
            trace!(reply = %line, "OCR worker reply");
            return serde_json::from_str(&line).with_context(|| {
                format!(
                    "cannot parse OCR worker reply: {:?}",
                    line.chars().take(200).collect::<String>()
                )
            });
        }
    }

    /// Run OCR on one image. Both halves of the exchange happen here.
    async fn detect(&mut self, image_path: &Path) -> Result<RawOcrOutput> {
        self.send(&WorkerRequest::Detect { image_path }).await?;
        match self.receive().await? {
            WorkerReply::Result { raw } => Ok(raw.unwrap_or_default()),
            WorkerReply::Error { message, traceback } => {
                Err(worker_error(message, traceback))
            }
            other => bail!("unexpected reply from OCR worker: {:?}", other),
        }
    }

    fn exit_error(&mut self) -> anyhow::Error {
        match self.child.try_wait() {
            Ok(Some(status)) => anyhow!("OCR worker exited unexpectedly ({})", status),
            _ => anyhow!("OCR worker closed its output unexpectedly"),
        }
    }
}

/// An [`OcrEngine`] that runs PaddleOCR in a worker process.
///
/// The worker handles one image at a time, so requests are serialized. The
/// worker is killed when the engine is dropped.
pub struct PaddleWorkerEngine {
    io: Arc<Mutex<WorkerIo>>,
}

impl PaddleWorkerEngine {
    /// Start a worker and wait until its models are loaded.
    #[instrument(level = "debug", skip_all)]
    pub async fn start(opts: &EngineOpts) -> Result<Self> {
        let mut child = worker_command(opts).spawn().with_context(|| {
            format!("cannot start OCR worker {:?}", opts.worker_program)
        })?;
        let stdin = child.stdin.take().context("OCR worker has no stdin")?;
        let stdout = child.stdout.take().context("OCR worker has no stdout")?;
        let stderr = child.stderr.take().context("OCR worker has no stderr")?;
        tokio::spawn(forward_worker_stderr(stderr));

        let mut io = WorkerIo {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        };

        let probe = match io.receive().await? {
            WorkerReply::Probe(probe) => probe,
            WorkerReply::Error { message, traceback } => {
                return Err(worker_error(message, traceback));
            }
            other => bail!("expected probe from OCR worker, got {:?}", other),
        };
        let device = select_device(opts.device, &probe);
        info!(
            ?device,
            accelerator_available = probe.accelerator_available,
            accelerator_count = probe.accelerator_count,
            "Selected OCR device"
        );

        io.send(&WorkerRequest::Init {
            device,
            lang: &opts.lang,
            use_angle_cls: !opts.no_angle_cls,
        })
        .await?;
        match io.receive().await? {
            WorkerReply::Ready => {}
            WorkerReply::Error { message, traceback } => {
                return Err(worker_error(message, traceback));
            }
            other => bail!("expected OCR worker to be ready, got {:?}", other),
        }
        info!("OCR engine ready");

        Ok(Self {
            io: Arc::new(Mutex::new(io)),
        })
    }
}

#[async_trait]
impl OcrEngine for PaddleWorkerEngine {
    #[instrument(level = "debug", skip_all, fields(path = %image_path.display()))]
    async fn detect(&self, image_path: &Path) -> Result<RawOcrOutput> {
        let io = self.io.clone();
        let image_path = image_path.to_owned();
        spawn_propagating_panics(async move {
            let mut io = io.lock_owned().await;
            io.detect(&image_path).await
        })
        .await?
    }
}

/// Build the command that launches the worker.
fn worker_command(opts: &EngineOpts) -> Command {
    let mut cmd = Command::new(&opts.worker_program);
    match &opts.worker_script {
        Some(script) => cmd.arg(script),
        None => cmd.args(["-u", "-c", WORKER_SCRIPT]),
    };
    if !opts.keep_proxy_env {
        for var in PROXY_VARS {
            cmd.env_remove(var);
        }
    }
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// Copy the worker's stderr into our log until it closes.
async fn forward_worker_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => info!(target: "paddle_worker", "{}", line),
            Ok(None) => break,
            Err(err) => {
                warn!("cannot read OCR worker stderr: {}", err);
                break;
            }
        }
    }
}
