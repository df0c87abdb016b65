//! Destinations for extracted keyframes.
//!
//! The extractor itself never touches the filesystem; a [`KeyframeSink`]
//! turns its records into persistent images. [`DirectorySink`] writes one
//! JPEG per keyframe, named `{HH-MM-SS}.jpg`.
//!
//! # Example
//!
//! ```no_run
//! use chaptermark::{ChaptermarkError, DirectorySink, ExtractionConfig};
//!
//! let records = chaptermark::extract_keyframes("talk.mp4", &ExtractionConfig::new())?;
//! let mut sink = DirectorySink::create("chapters")?;
//! let written = chaptermark::drain_into(records, &mut sink)?;
//! println!("{written} keyframes saved");
//! # Ok::<(), ChaptermarkError>(())
//! ```

use std::{
    collections::HashSet,
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use image::codecs::jpeg::JpegEncoder;

use crate::{error::ChaptermarkError, extractor::KeyframeRecord};

/// Default JPEG quality for written keyframes.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Consumer of keyframe records.
pub trait KeyframeSink {
    /// Persist one record.
    fn write(&mut self, record: &KeyframeRecord) -> Result<(), ChaptermarkError>;

    /// Called once after the last record. Defaults to doing nothing.
    fn finish(&mut self) -> Result<(), ChaptermarkError> {
        Ok(())
    }
}

/// Feed every record from `records` into `sink`, then call
/// [`KeyframeSink::finish`].
///
/// Stops at the first error, whether it comes from extraction or from the
/// sink; records written before it stay written.
///
/// Returns the number of records written.
pub fn drain_into<I, K>(records: I, sink: &mut K) -> Result<usize, ChaptermarkError>
where
    I: IntoIterator<Item = Result<KeyframeRecord, ChaptermarkError>>,
    K: KeyframeSink + ?Sized,
{
    let mut written = 0;
    for record in records {
        sink.write(&record?)?;
        written += 1;
    }
    sink.finish()?;
    Ok(written)
}

/// Writes each keyframe as `{timestamp_label}.jpg` into one directory.
///
/// When two keyframes of the same run share a label, the later one
/// replaces the earlier file. Files that already existed before the run are
/// left alone unless [`overwrite_existing`](DirectorySink::overwrite_existing)
/// is enabled; writing over one is an error.
#[derive(Debug)]
pub struct DirectorySink {
    directory: PathBuf,
    quality: u8,
    overwrite_existing: bool,
    written_names: HashSet<String>,
    written_paths: Vec<PathBuf>,
}

impl DirectorySink {
    /// Create the sink, creating `directory` and its parents if needed.
    pub fn create<P: AsRef<Path>>(directory: P) -> Result<Self, ChaptermarkError> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            quality: DEFAULT_JPEG_QUALITY,
            overwrite_existing: false,
            written_names: HashSet::new(),
            written_paths: Vec::new(),
        })
    }

    /// Set the JPEG quality (1–100).
    #[must_use]
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    /// Allow replacing files that existed before this sink wrote anything.
    #[must_use]
    pub fn overwrite_existing(mut self, overwrite: bool) -> Self {
        self.overwrite_existing = overwrite;
        self
    }

    /// The output directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Paths written so far, in write order. A path replaced by a later
    /// keyframe with the same label is listed once per write.
    pub fn written(&self) -> &[PathBuf] {
        &self.written_paths
    }
}

impl KeyframeSink for DirectorySink {
    fn write(&mut self, record: &KeyframeRecord) -> Result<(), ChaptermarkError> {
        let filename = record.filename();
        let path = self.directory.join(&filename);

        if !self.overwrite_existing && !self.written_names.contains(&filename) && path.exists() {
            return Err(ChaptermarkError::IoError(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{} already exists", path.display()),
            )));
        }

        let mut writer = BufWriter::new(File::create(&path)?);
        JpegEncoder::new_with_quality(&mut writer, self.quality).encode_image(record.frame.image())?;
        writer.flush()?;

        log::debug!("Wrote keyframe {} -> {}", record.timestamp_label, path.display());

        self.written_names.insert(filename);
        self.written_paths.push(path);
        Ok(())
    }
}
