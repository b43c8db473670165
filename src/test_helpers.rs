//! Shared test utilities.
//!
//! [`ClassTree`] builds the layout every ledger and listing test needs: a
//! parent directory holding one source directory of images, with class
//! folders created next to it on demand.
//!
//! ```text
//! <tmp>/                 ← root()
//! ├── batch/             ← source_dir()
//! │   ├── a.png          ← image("a.png")
//! │   └── b.png
//! └── cats/              ← class_dir("cats")
//! ```

use image::{ImageEncoder, RgbImage, RgbaImage};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

const SOURCE_DIR_NAME: &str = "batch";

// =========================================================================
// Fixture setup
// =========================================================================

pub struct ClassTree {
    tmp: TempDir,
}

impl ClassTree {
    /// Create the tree with a small valid image for each name.
    pub fn new(images: &[&str]) -> Self {
        let tmp = TempDir::new().unwrap();
        let tree = Self { tmp };
        std::fs::create_dir_all(tree.source_dir()).unwrap();
        for name in images {
            write_test_image(&tree.image(name), 8, 6);
        }
        tree
    }

    pub fn root(&self) -> &Path {
        self.tmp.path()
    }

    pub fn source_dir(&self) -> PathBuf {
        self.root().join(SOURCE_DIR_NAME)
    }

    pub fn image(&self, name: &str) -> PathBuf {
        self.source_dir().join(name)
    }

    pub fn class_dir(&self, class: &str) -> PathBuf {
        self.root().join(class)
    }
}

// =========================================================================
// File writers
// =========================================================================

pub fn write_bytes(path: &Path, bytes: &[u8]) {
    std::fs::write(path, bytes).unwrap();
}

/// Write a gradient image; the format follows the extension.
///
/// Extensions whose encoders are not compiled in (webp, ico, tiff, gif,
/// bmp) fall back to PNG bytes under the requested name, which is enough
/// for tests that never decode them.
pub fn write_test_image(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 20 % 256) as u8, (y * 20 % 256) as u8, 128])
    });
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    if ext == "jpg" || ext == "jpeg" {
        image::codecs::jpeg::JpegEncoder::new(writer)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
    } else {
        image::codecs::png::PngEncoder::new(writer)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
    }
}

/// Write a PNG that is fully transparent everywhere.
pub fn write_transparent_png(path: &Path, width: u32, height: u32) {
    let img = RgbaImage::from_pixel(width, height, image::Rgba([0, 0, 0, 0]));
    img.save_with_format(path, image::ImageFormat::Png).unwrap();
}

/// Set a file's modification time to `secs` after the epoch.
pub fn set_mtime(path: &Path, secs: u64) {
    std::fs::OpenOptions::new()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

// =========================================================================
// Permissions
// =========================================================================

/// Restores a directory's permissions when dropped.
#[cfg(unix)]
pub struct LockedDir {
    path: PathBuf,
    mode: u32,
}

#[cfg(unix)]
impl Drop for LockedDir {
    fn drop(&mut self) {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(self.mode));
    }
}

/// Make `dir` unreadable (mode 000).
///
/// Returns `None` when the directory can still be listed afterwards, as it
/// can for root; callers skip their assertions in that case.
#[cfg(unix)]
pub fn lock_dir(dir: &Path) -> Option<LockedDir> {
    use std::os::unix::fs::PermissionsExt;
    let mode = std::fs::metadata(dir).unwrap().permissions().mode();
    std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o000)).unwrap();
    let guard = LockedDir {
        path: dir.to_path_buf(),
        mode,
    };
    if std::fs::read_dir(dir).is_ok() {
        return None;
    }
    Some(guard)
}
