//! Load/save pipeline controller.
//!
//! Every load or save runs on its own worker thread and walks the states
//! `Parsing -> Validating -> Processing -> Complete`, or ends in `Error`.
//! The caller's listener hears about every transition and exactly one
//! terminal state. Returning [`ControlFlow::Break`] from the listener, or
//! calling [`Task::cancel`], stops the work at the next safe point and ends
//! the task with [`GltfError::Cancelled`].

use std::any::Any;
use std::fmt;
use std::fs;
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use gltfkit_core::document::Document;
use gltfkit_core::error::{GltfError, Result};
use gltfkit_core::CancelToken;

use crate::container::read_container;
use crate::extensions::check_support;
use crate::options::{ExportOptions, LoadOptions};
use crate::processing::process;
use crate::resolver::{parse_root, Resolver};
use crate::writer;

/// Pipeline state. Values are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Error = -1,
    Parsing = 1,
    Validating = 2,
    Processing = 3,
    Complete = 4,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Error | Status::Complete)
    }

    pub fn name(self) -> &'static str {
        match self {
            Status::Error => "error",
            Status::Parsing => "parsing",
            Status::Validating => "validating",
            Status::Processing => "processing",
            Status::Complete => "complete",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One progress report.
#[derive(Debug)]
pub struct Progress<'a, T> {
    /// Estimated completed fraction in `[0, 1]`.
    pub fraction: f32,
    pub status: Status,
    /// The result, only at `Complete`.
    pub output: Option<&'a T>,
    /// The failure, only at `Error`.
    pub error: Option<&'a GltfError>,
}

/// Progress callback. Return `ControlFlow::Break(())` to cancel.
pub type Listener<T> = Box<dyn FnMut(&Progress<'_, T>) -> ControlFlow<()> + Send + 'static>;

/// Handle to a running load or save.
pub struct Task<T> {
    cancel: CancelToken,
    /// `Err` when no worker thread could be started.
    handle: std::result::Result<JoinHandle<Result<T>>, GltfError>,
}

impl<T> Task<T> {
    /// Request cancellation. The task ends with `Cancelled` unless it already
    /// finished.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Block until the task ends and take its result.
    pub fn wait(self) -> Result<T> {
        self.handle?
            .join()
            .map_err(|_| GltfError::LoadFailed("pipeline worker panicked".into()))?
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Drives the listener and enforces the state machine.
struct Reporter<T> {
    listener: Listener<T>,
    cancel: CancelToken,
    status: Status,
    fraction: f32,
    started: Instant,
}

impl<T> Reporter<T> {
    fn new(listener: Listener<T>, cancel: CancelToken) -> Self {
        Reporter {
            listener,
            cancel,
            status: Status::Parsing,
            fraction: 0.0,
            started: Instant::now(),
        }
    }

    /// Report a non-terminal state, honouring cancellation on either side.
    fn stage(&mut self, status: Status, fraction: f32) -> Result<()> {
        self.cancel.check()?;
        if status != self.status {
            log::debug!(
                "{} -> {} after {:?}",
                self.status,
                status,
                self.started.elapsed()
            );
        }
        self.status = status;
        self.fraction = fraction;
        let report = Progress {
            fraction,
            status,
            output: None,
            error: None,
        };
        if (self.listener)(&report).is_break() {
            self.cancel.cancel();
            return Err(GltfError::Cancelled);
        }
        Ok(())
    }

    /// Make the single terminal report.
    fn finish(mut self, result: Result<T>) -> Result<T> {
        let result = result.and_then(|output| {
            self.cancel.check()?;
            Ok(output)
        });
        match &result {
            Ok(output) => {
                log::debug!("{} -> complete after {:?}", self.status, self.started.elapsed());
                let _ = (self.listener)(&Progress {
                    fraction: 1.0,
                    status: Status::Complete,
                    output: Some(output),
                    error: None,
                });
            }
            Err(error) => {
                log::debug!("{} -> error: {}", self.status, error);
                let _ = (self.listener)(&Progress {
                    fraction: self.fraction,
                    status: Status::Error,
                    output: None,
                    error: Some(error),
                });
            }
        }
        result
    }
}

fn spawn<T, F>(name: &str, listener: Listener<T>, work: F) -> Task<T>
where
    T: Send + 'static,
    F: FnOnce(&mut Reporter<T>, &CancelToken) -> Result<T> + Send + 'static,
{
    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();
    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let mut reporter = Reporter::new(listener, worker_cancel.clone());
            // a panic in the engine or in a registered decompressor still
            // ends with one Error report
            let result = panic::catch_unwind(AssertUnwindSafe(|| work(&mut reporter, &worker_cancel)))
                .unwrap_or_else(|payload| {
                    let message = panic_message(payload.as_ref());
                    log::error!("pipeline worker panicked: {}", message);
                    Err(GltfError::LoadFailed(format!("pipeline worker panicked: {}", message)))
                });
            reporter.finish(result)
        })
        .map_err(|e| {
            log::warn!("could not start {} worker: {}", name, e);
            GltfError::Io(e)
        });
    Task { cancel, handle }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ============================================================================
// Loading
// ============================================================================

enum Source {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

fn run_load(
    source: Source,
    options: LoadOptions,
    reporter: &mut Reporter<Document>,
    cancel: &CancelToken,
) -> Result<Document> {
    reporter.stage(Status::Parsing, 0.0)?;
    let (bytes, base_dir, url) = match source {
        Source::Path(path) => {
            let bytes = fs::read(&path).map_err(|e| GltfError::from_file_io(e, &path))?;
            let base_dir = options
                .asset_directory
                .clone()
                .or_else(|| path.parent().map(Path::to_path_buf));
            (bytes, base_dir, Some(path))
        }
        Source::Bytes(bytes) => (bytes, options.asset_directory.clone(), None),
    };
    let container = read_container(&bytes)?;
    let root = parse_root(container.json)?;

    reporter.stage(Status::Validating, 0.25)?;
    check_support(&root.extensions_used, &root.extensions_required, &options.registry)?;
    let mut doc = Resolver::new(container.first_bin(), base_dir.as_deref()).resolve(root)?;
    doc.url = url;
    doc.validate()?;

    reporter.stage(Status::Processing, 0.5)?;
    process(&mut doc, &options, cancel, &mut |f: f32| {
        reporter.stage(Status::Processing, 0.5 + 0.45 * f)
    })?;

    log::info!(
        "loaded {} bytes{}: {} nodes, {} meshes, {} accessors, {} buffers",
        bytes.len(),
        if container.is_binary { " (GLB)" } else { "" },
        doc.nodes.len(),
        doc.meshes.len(),
        doc.accessors.len(),
        doc.buffers.len()
    );
    Ok(doc)
}

/// Load a `.gltf` or `.glb` file on a worker thread.
///
/// Relative URIs resolve against `options.asset_directory`, or the file's
/// directory when that is unset.
pub fn load_path_async<F>(path: impl AsRef<Path>, options: LoadOptions, listener: F) -> Task<Document>
where
    F: FnMut(&Progress<'_, Document>) -> ControlFlow<()> + Send + 'static,
{
    let source = Source::Path(path.as_ref().to_path_buf());
    spawn("gltfkit-load", Box::new(listener), move |reporter, cancel| {
        run_load(source, options, reporter, cancel)
    })
}

/// Load glTF JSON or GLB bytes on a worker thread.
pub fn load_bytes_async<F>(bytes: Vec<u8>, options: LoadOptions, listener: F) -> Task<Document>
where
    F: FnMut(&Progress<'_, Document>) -> ControlFlow<()> + Send + 'static,
{
    spawn("gltfkit-load", Box::new(listener), move |reporter, cancel| {
        run_load(Source::Bytes(bytes), options, reporter, cancel)
    })
}

fn ignore<T>(_: &Progress<'_, T>) -> ControlFlow<()> {
    ControlFlow::Continue(())
}

/// Load a file and block until the pipeline finishes.
pub fn load_path(path: impl AsRef<Path>, options: LoadOptions) -> Result<Document> {
    load_path_async(path, options, ignore::<Document>).wait()
}

/// Load bytes and block until the pipeline finishes.
pub fn load_bytes(bytes: impl Into<Vec<u8>>, options: LoadOptions) -> Result<Document> {
    load_bytes_async(bytes.into(), options, ignore::<Document>).wait()
}

// ============================================================================
// Saving
// ============================================================================

fn run_save(
    doc: &Document,
    path: Option<&Path>,
    options: &ExportOptions,
    reporter: &mut Reporter<impl Sized>,
) -> Result<Vec<u8>> {
    reporter.stage(Status::Validating, 0.0)?;
    doc.check()?;
    writer::check_buffers(doc, options)?;

    reporter.stage(Status::Processing, 0.5)?;
    let bytes = writer::serialize(doc, options)?;
    if let Some(path) = path {
        reporter.stage(Status::Processing, 0.75)?;
        fs::write(path, &bytes).map_err(|e| GltfError::from_file_io(e, path))?;
    }
    log::info!(
        "serialized {} bytes ({}){}",
        bytes.len(),
        if options.binary { "GLB" } else { "glTF" },
        path.map(|p| format!(" to {}", p.display())).unwrap_or_default()
    );
    Ok(bytes)
}

/// Serialize a document and write it to `path` on a worker thread.
///
/// Companion files named by buffer or image URIs are the caller's to write.
pub fn write_path_async<F>(
    doc: impl Into<Arc<Document>>,
    path: impl AsRef<Path>,
    options: ExportOptions,
    listener: F,
) -> Task<()>
where
    F: FnMut(&Progress<'_, ()>) -> ControlFlow<()> + Send + 'static,
{
    let doc = doc.into();
    let path = path.as_ref().to_path_buf();
    spawn("gltfkit-save", Box::new(listener), move |reporter, _| {
        run_save(&doc, Some(&path), &options, reporter).map(|_| ())
    })
}

/// Serialize a document to bytes on a worker thread.
pub fn serialize_async<F>(doc: impl Into<Arc<Document>>, options: ExportOptions, listener: F) -> Task<Vec<u8>>
where
    F: FnMut(&Progress<'_, Vec<u8>>) -> ControlFlow<()> + Send + 'static,
{
    let doc = doc.into();
    spawn("gltfkit-save", Box::new(listener), move |reporter, _| {
        run_save(&doc, None, &options, reporter)
    })
}
