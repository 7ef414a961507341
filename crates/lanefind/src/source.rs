//! Ordered frame source over a still image or a directory of frames.

use crate::adapt::{load_rgb, AdaptError};
use crate::core::RgbImage;
use crate::session::image_files;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("failed to decode {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: AdaptError,
    },
    #[error("no image frames in {}", path.display())]
    Empty { path: PathBuf },
    #[error("input {} does not exist", path.display())]
    NotFound { path: PathBuf },
}

/// One decoded frame.
#[derive(Clone, Debug)]
pub struct Frame {
    pub index: usize,
    pub path: PathBuf,
    pub image: RgbImage,
}

/// Frames decoded lazily in file-name order.
#[derive(Debug)]
pub struct ImageSequence {
    root: PathBuf,
    files: Vec<PathBuf>,
    next: usize,
}

impl ImageSequence {
    /// A single image file, or every image directly under a directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let root = path.as_ref().to_path_buf();
        if !root.exists() {
            return Err(SourceError::NotFound { path: root });
        }
        let files = if root.is_dir() {
            image_files(&root)?
        } else {
            vec![root.clone()]
        };
        if files.is_empty() {
            return Err(SourceError::Empty { path: root });
        }
        log::info!("frame source {}: {} frames", root.display(), files.len());
        Ok(Self {
            root,
            files,
            next: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.files
    }
}

impl Iterator for ImageSequence {
    type Item = Result<Frame, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next;
        let path = self.files.get(index)?.clone();
        self.next += 1;
        Some(match load_rgb(&path) {
            Ok(image) => Ok(Frame { index, path, image }),
            Err(source) => Err(SourceError::Image { path, source }),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.files.len() - self.next;
        (rest, Some(rest))
    }
}

impl Drop for ImageSequence {
    fn drop(&mut self) {
        log::debug!(
            "frame source {} released after {}/{} frames",
            self.root.display(),
            self.next,
            self.files.len()
        );
    }
}

/// Open `path`, hand the sequence to `f` and release it on every exit path.
pub fn with_frame_source<T>(
    path: impl AsRef<Path>,
    f: impl FnOnce(&mut ImageSequence) -> T,
) -> Result<T, SourceError> {
    let mut source = ImageSequence::open(path)?;
    Ok(f(&mut source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapt::save_rgb;

    #[test]
    fn directory_frames_come_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        save_rgb(&RgbImage::filled(4, 3, [1, 1, 1]), dir.path().join("f_002.png")).unwrap();
        save_rgb(&RgbImage::filled(4, 3, [2, 2, 2]), dir.path().join("f_001.png")).unwrap();
        std::fs::write(dir.path().join("broken.png"), b"nope").unwrap();

        let frames = with_frame_source(dir.path(), |src| {
            assert_eq!(src.len(), 3);
            src.collect::<Vec<_>>()
        })
        .unwrap();
        assert!(matches!(frames[0], Err(SourceError::Image { .. })));
        let first = frames[1].as_ref().unwrap();
        assert_eq!((first.index, first.image.get(0, 0)), (1, [2, 2, 2]));
        assert_eq!(frames[2].as_ref().unwrap().index, 2);
    }

    #[test]
    fn missing_and_empty_inputs_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ImageSequence::open(dir.path()),
            Err(SourceError::Empty { .. })
        ));
        assert!(matches!(
            with_frame_source(dir.path().join("missing"), |_| ()),
            Err(SourceError::NotFound { .. })
        ));
    }

    #[test]
    fn single_file_is_one_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.png");
        save_rgb(&RgbImage::filled(2, 2, [9, 9, 9]), &path).unwrap();
        let mut seq = ImageSequence::open(&path).unwrap();
        assert_eq!(seq.size_hint(), (1, Some(1)));
        assert!(seq.next().unwrap().is_ok());
        assert!(seq.next().is_none());
    }
}
