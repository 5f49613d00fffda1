//! Getting disk images in from the host filesystem without blocking the
//! thread that owns the device.

use log::{debug, info, warn};
use notify::{self, Event, EventKind, RecursiveMode, Watcher};
use notify::event::{AccessKind, AccessMode, CreateKind, ModifyKind, RenameMode};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use crate::error::{DiskError, DiskResult};

/// A single image file being read on a background thread.
pub struct ImageImport {
    path: PathBuf,
    rx: Option<Receiver<DiskResult<Vec<u8>>>>,
}

impl ImageImport {
    /// Start reading the file.
    pub fn spawn(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (tx, rx) = mpsc::channel();
        let thread_path = path.clone();
        thread::spawn(move || {
            let result = read_image(&thread_path);
            // The import may have been dropped; nobody wants the result.
            let _ = tx.send(result);
        });
        ImageImport { path, rx: Some(rx) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until the file has been read.
    pub fn wait(mut self) -> DiskResult<Vec<u8>> {
        match self.rx.take() {
            Some(rx) => rx.recv().unwrap_or_else(|_| Err(reader_died())),
            None => Err(already_taken()),
        }
    }

    /// Take the result if the read has finished. Returns `None` while it is
    /// still running and after the result has been taken.
    pub fn try_take(&mut self) -> Option<DiskResult<Vec<u8>>> {
        let result = match self.rx.as_ref()?.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(reader_died()),
        };
        self.rx = None;
        Some(result)
    }
}

fn read_image(path: &Path) -> DiskResult<Vec<u8>> {
    let bytes = fs::read(path)?;
    info!("Read image '{}' ({} bytes).", path.display(), bytes.len());
    Ok(bytes)
}

fn reader_died() -> DiskError {
    DiskError::Io(io::Error::new(io::ErrorKind::Other, "image reader thread exited"))
}

fn already_taken() -> DiskError {
    DiskError::Io(io::Error::new(io::ErrorKind::Other, "image already taken"))
}

/// An image file that appeared in an inbox.
#[derive(Debug)]
pub struct InboxDelivery {
    pub path: PathBuf,
    pub result: DiskResult<Vec<u8>>,
}

/// Watches a directory and reads every non-empty file created in it or renamed
/// into it. A file written in place may be delivered more than once, the
/// first time only part written; the last delivery holds the whole file.
pub struct ImageInbox {
    dir_path: PathBuf,
    watcher: notify::RecommendedWatcher,
    rx: Receiver<InboxDelivery>,
}

impl ImageInbox {
    /// Start watching. The directory must exist.
    pub fn start(dir_path: impl Into<PathBuf>) -> DiskResult<Self> {
        let dir_path = dir_path.into();
        if !dir_path.is_dir() {
            return Err(DiskError::InvalidConfig(
                format!("'{}' is not a directory", dir_path.display())));
        }
        let (tx, rx) = mpsc::channel();

        let mut watcher = notify::recommended_watcher(
                move |event: notify::Result<Event>| {
            match event {
                Ok(event) => handle_event(&tx, event),
                Err(e) => warn!("Inbox watcher error: {}", e),
            }
        })?;
        watcher.watch(&dir_path, RecursiveMode::NonRecursive)?;
        info!("Watching inbox '{}'.", dir_path.display());

        Ok(ImageInbox { dir_path, watcher, rx })
    }

    pub fn path(&self) -> &Path {
        &self.dir_path
    }

    /// Block until the next image arrives. `None` if the watcher has died.
    pub fn recv(&self) -> Option<InboxDelivery> {
        self.rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<InboxDelivery> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn try_recv(&self) -> Option<InboxDelivery> {
        self.rx.try_recv().ok()
    }

    /// Stop watching.
    pub fn stop(mut self) -> DiskResult<()> {
        self.watcher.unwatch(&self.dir_path)?;
        info!("Stopped watching inbox '{}'.", self.dir_path.display());
        Ok(())
    }
}

fn handle_event(tx: &Sender<InboxDelivery>, event: Event) {
    // A file moved in from outside the directory shows up as a Create. A file
    // written in place also fires Create, usually while still empty; the
    // close after writing delivers the finished file.
    let arrived = matches!(event.kind,
        EventKind::Create(CreateKind::File | CreateKind::Any)
        | EventKind::Access(AccessKind::Close(AccessMode::Write))
        | EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both | RenameMode::Any)));
    if !arrived {
        return;
    }
    // For a rename, the destination is last.
    let path = match event.paths.last() {
        Some(path) => path.clone(),
        None => return,
    };
    match fs::metadata(&path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => {}
        _ => {
            debug!("Ignoring inbox event for '{}'.", path.display());
            return;
        }
    }

    let result = read_image(&path);
    if let Err(e) = &result {
        warn!("Failed to read inbox image '{}': {}", path.display(), e);
    }
    let _ = tx.send(InboxDelivery { path, result });
}
