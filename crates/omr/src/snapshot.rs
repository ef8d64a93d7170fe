use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::GrayImage;
use crate::sheet::{LogObserver, PipelineEvent, PipelineObserver};

/// Observer that logs events like [`LogObserver`] and writes every
/// intermediate raster to `dir` as `NN_name.png`.
///
/// Write failures are logged and otherwise ignored.
#[derive(Debug)]
pub struct SnapshotDirObserver {
    dir: PathBuf,
    counter: AtomicUsize,
}

impl SnapshotDirObserver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            counter: AtomicUsize::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl PipelineObserver for SnapshotDirObserver {
    fn on_event(&self, event: &PipelineEvent) {
        LogObserver.on_event(event);
    }

    fn wants_snapshots(&self) -> bool {
        true
    }

    fn on_snapshot(&self, name: &str, image: &GrayImage) {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let path = self.dir.join(format!("{n:02}_{name}.png"));
        if let Err(e) = image.to_luma().save(&path) {
            log::warn!("failed to write snapshot {}: {e}", path.display());
        }
    }
}
