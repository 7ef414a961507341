//! Calibration session backed by the on-disk correspondence cache.
//!
//! The cache is keyed by the chessboard pattern and a hash of the calibration
//! image set (file names and contents). A hit skips corner detection; a miss
//! runs detection over every image and rewrites the cache. Profiles for any
//! frame size are solved from the same correspondences.

use crate::adapt::{load_gray, AdaptError};
use crate::config::CalibrationConfig;
use lanefind_calib::{
    calibrate, CacheError, CalibrationCache, CalibrationCorrespondences, CalibrationError,
    CalibrationProfile,
};
use lanefind_core::GrayImage;
use siphasher::sip::SipHasher13;
use std::fs;
use std::hash::Hasher;
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::instrument;

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] AdaptError),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("no calibration images in {}", dir.display())]
    NoImages { dir: PathBuf },
    #[error("calibration.images_dir is not configured")]
    NotConfigured,
}

fn is_image_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Image files directly under `dir`, sorted by file name.
pub fn image_files(dir: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if is_image_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Hex SipHash-1-3 over the file names and contents, in order.
pub fn image_set_key(files: &[PathBuf]) -> Result<String, std::io::Error> {
    let mut hasher = SipHasher13::new();
    for path in files {
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        hasher.write(name.as_bytes());
        hasher.write_u8(0);
        let bytes = fs::read(path)?;
        hasher.write_u64(bytes.len() as u64);
        hasher.write(&bytes);
    }
    Ok(format!("{:016x}", hasher.finish()))
}

/// Correspondences for one calibration image set.
#[derive(Clone, Debug)]
pub struct CalibrationSession {
    files: Vec<PathBuf>,
    key: String,
    correspondences: CalibrationCorrespondences,
    from_cache: bool,
}

impl CalibrationSession {
    /// Load correspondences from the cache or detect them in `images_dir`.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip_all))]
    pub fn open(config: &CalibrationConfig) -> Result<Self, SessionError> {
        let dir = config.images_dir.as_deref().ok_or(SessionError::NotConfigured)?;
        let files = image_files(dir)?;
        if files.is_empty() {
            return Err(SessionError::NoImages {
                dir: dir.to_path_buf(),
            });
        }
        let key = image_set_key(&files)?;
        let (correspondences, from_cache) = load_or_collect(config, &files, &key)?;
        Ok(Self {
            files,
            key,
            correspondences,
            from_cache,
        })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn image_set_key(&self) -> &str {
        &self.key
    }

    pub fn correspondences(&self) -> &CalibrationCorrespondences {
        &self.correspondences
    }

    /// Whether the correspondences came from the cache.
    pub fn from_cache(&self) -> bool {
        self.from_cache
    }

    /// Size of the first calibration image.
    pub fn native_size(&self) -> Result<(usize, usize), SessionError> {
        let first = self.files.first().ok_or_else(|| SessionError::NoImages {
            dir: PathBuf::new(),
        })?;
        let (w, h) = ::image::image_dimensions(first).map_err(AdaptError::from)?;
        Ok((w as usize, h as usize))
    }

    /// Solve the camera model for frames of `width × height`.
    pub fn profile(&self, width: usize, height: usize) -> Result<CalibrationProfile, SessionError> {
        let profile = calibrate(&self.correspondences, (width, height))?;
        log::info!(
            "calibration for {width}x{height}: fx {:.1}, fy {:.1}, rms {:.3} px over {} views",
            profile.fx(),
            profile.fy(),
            profile.rms_reprojection_px,
            profile.views
        );
        Ok(profile)
    }
}

fn load_or_collect(
    config: &CalibrationConfig,
    files: &[PathBuf],
    key: &str,
) -> Result<(CalibrationCorrespondences, bool), SessionError> {
    let cache_path = &config.cache_path;
    match CalibrationCache::load_json(cache_path) {
        Ok(cache) if cache.matches(config.pattern, key) => {
            log::info!("calibration cache hit: {}", cache_path.display());
            return Ok((cache.to_correspondences(), true));
        }
        Ok(_) => log::info!("calibration cache {} is stale", cache_path.display()),
        Err(err) => log::debug!("no calibration cache at {}: {err}", cache_path.display()),
    }

    let mut images: Vec<GrayImage> = Vec::with_capacity(files.len());
    for path in files {
        match load_gray(path) {
            Ok(img) => images.push(img),
            Err(err) => log::warn!("skipping calibration image {}: {err}", path.display()),
        }
    }
    let corr = CalibrationCorrespondences::collect(
        images.iter().map(GrayImage::view),
        &config.chessboard_params(),
    )?;

    if let Err(err) = CalibrationCache::from_correspondences(&corr, key).write_json(cache_path) {
        log::warn!("failed to write calibration cache {}: {err}", cache_path.display());
    }
    Ok((corr, false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_images_are_listed_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.PNG", "a.jpg", "notes.txt", "c.bmp"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("d.png")).unwrap();
        let names: Vec<_> = image_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.jpg", "b.PNG", "c.bmp"]);
    }

    #[test]
    fn key_tracks_names_and_contents() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        fs::write(&a, b"one").unwrap();
        fs::write(&b, b"two").unwrap();

        let k1 = image_set_key(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(k1.len(), 16);
        assert_eq!(k1, image_set_key(&[a.clone(), b.clone()]).unwrap());
        assert_ne!(k1, image_set_key(&[a.clone()]).unwrap());

        fs::write(&b, b"three").unwrap();
        assert_ne!(k1, image_set_key(&[a, b]).unwrap());
    }

    #[test]
    fn matching_cache_skips_detection() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        fs::create_dir(&images).unwrap();
        // Not decodable: only a cache hit can succeed.
        fs::write(images.join("cal1.jpg"), b"not an image").unwrap();

        let cfg = CalibrationConfig {
            images_dir: Some(images.clone()),
            cache_path: dir.path().join("cache.json"),
            pattern: [3, 2],
            ..CalibrationConfig::default()
        };
        let key = image_set_key(&image_files(&images).unwrap()).unwrap();
        let mut corr = CalibrationCorrespondences::new([3, 2]);
        corr.object_points
            .push(CalibrationCorrespondences::board_points([3, 2]));
        corr.image_points.push(
            (0..6)
                .map(|i| nalgebra::Point2::new((i % 3) as f32 * 10.0, (i / 3) as f32 * 10.0))
                .collect(),
        );
        CalibrationCache::from_correspondences(&corr, key.as_str())
            .write_json(&cfg.cache_path)
            .unwrap();

        let session = CalibrationSession::open(&cfg).unwrap();
        assert!(session.from_cache());
        assert_eq!(session.image_set_key(), key);
        assert_eq!(session.correspondences(), &corr);

        // A different pattern invalidates the cache and falls back to detection.
        let stale = CalibrationConfig {
            pattern: [9, 6],
            ..cfg
        };
        assert!(matches!(
            CalibrationSession::open(&stale),
            Err(SessionError::Calibration(CalibrationError::NoUsableImages { tried: 0 }))
        ));
    }

    #[test]
    fn missing_or_empty_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = CalibrationConfig::default();
        assert!(matches!(
            CalibrationSession::open(&cfg),
            Err(SessionError::NotConfigured)
        ));
        cfg.images_dir = Some(dir.path().to_path_buf());
        assert!(matches!(
            CalibrationSession::open(&cfg),
            Err(SessionError::NoImages { .. })
        ));
    }
}
