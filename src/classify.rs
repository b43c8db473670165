//! The classification ledger.
//!
//! Classification state lives entirely in the filesystem. An image at
//! `photos/batch-01/img.png` is classified as `cats` when a file named
//! `img.png` exists in the sibling folder `photos/cats/`:
//!
//! ```text
//! photos/
//! ├── batch-01/          # source directory (never a class folder)
//! │   ├── img.png
//! │   └── other.png
//! ├── cats/              # class folder
//! │   └── img.png        # ← img.png is classified as "cats"
//! └── dogs/              # class folder
//! ```
//!
//! There is no index file. [`reconcile`] rebuilds the state by scanning the
//! sibling folders, [`classify`] copies the image into its class folder, and
//! [`unclassify`] removes that copy.
//!
//! ## Exclusivity
//!
//! An image belongs to at most one class. Before copying, [`classify`]
//! deletes the basename from every other sibling folder. Failures during
//! that sweep are recorded as [`Warning`]s and logged; they never abort the
//! classification.
//!
//! ## Consistency caveats
//!
//! The ledger is not transactional. There is no rollback when the copy fails
//! after stale copies were already removed, and no lock protects an image
//! against two concurrent `classify` calls for different classes. Callers
//! serialize classification actions per image.

use crate::types::{ErrorKind, Warning};
use serde::Serialize;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("Image not found: {0}")]
    ImageNotFound(PathBuf),
    #[error("Invalid class name: {0:?}")]
    InvalidClassName(String),
    #[error("Class {class:?} is the source directory of {image}")]
    ClassIsSourceDir { class: String, image: PathBuf },
    #[error("Image path has no file name: {0}")]
    NoFileName(PathBuf),
    #[error("Failed to resolve {path}: {source}")]
    Resolve {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to copy image to {path}: {source}")]
    Copy {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to delete file {path}: {source}")]
    Delete {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ClassifyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClassifyError::ImageNotFound(_) => ErrorKind::NotFound,
            ClassifyError::InvalidClassName(_)
            | ClassifyError::ClassIsSourceDir { .. }
            | ClassifyError::NoFileName(_) => ErrorKind::InvalidArgument,
            ClassifyError::Resolve { source, .. } => ErrorKind::from_io(source),
            ClassifyError::CreateDir { .. }
            | ClassifyError::Copy { .. }
            | ClassifyError::Delete { .. } => ErrorKind::Io,
        }
    }
}

/// Result of a successful [`classify`].
#[derive(Debug, Clone, Serialize)]
pub struct ClassifyOutcome {
    pub target_path: PathBuf,
    pub class_name: String,
    /// Stale copies in other class folders that could not be removed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

/// Result of a successful [`unclassify`].
#[derive(Debug, Clone, Serialize)]
pub struct UnclassifyOutcome {
    pub target_path: PathBuf,
    /// `false` when there was nothing to remove.
    pub removed: bool,
}

/// Paths derived from an image path and a class name.
///
/// Everything the ledger touches is computed from these two inputs, so
/// unclassify never needs a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Placement {
    image_dir: PathBuf,
    parent_dir: PathBuf,
    target_dir: PathBuf,
    filename: std::ffi::OsString,
}

impl Placement {
    fn new(image_path: &Path, class_name: &str) -> Result<Self, ClassifyError> {
        validate_class_name(class_name)?;
        let filename = image_path
            .file_name()
            .ok_or_else(|| ClassifyError::NoFileName(image_path.to_path_buf()))?
            .to_os_string();
        let image_dir = image_path.parent().unwrap_or(image_path).to_path_buf();
        // The target would be the source file itself.
        if image_dir.file_name() == Some(OsStr::new(class_name)) {
            return Err(ClassifyError::ClassIsSourceDir {
                class: class_name.to_string(),
                image: image_path.to_path_buf(),
            });
        }
        let parent_dir = image_dir.parent().unwrap_or(&image_dir).to_path_buf();
        let target_dir = parent_dir.join(class_name);
        Ok(Self {
            image_dir,
            parent_dir,
            target_dir,
            filename,
        })
    }

    fn target_path(&self) -> PathBuf {
        self.target_dir.join(&self.filename)
    }
}

/// Check that a class name is a single plain directory name.
///
/// Rejects empty names, `.`/`..`, and anything containing a separator, so a
/// class folder can never land outside the source directory's parent.
pub fn validate_class_name(class_name: &str) -> Result<(), ClassifyError> {
    let mut components = Path::new(class_name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) if name == OsStr::new(class_name) => Ok(()),
        _ => Err(ClassifyError::InvalidClassName(class_name.to_string())),
    }
}

fn absolute(path: &Path) -> Result<PathBuf, ClassifyError> {
    std::path::absolute(path).map_err(|source| ClassifyError::Resolve {
        path: path.to_path_buf(),
        source,
    })
}

/// Copy `image_path` into the `class_name` folder next to its source directory.
///
/// Removes the image from every other sibling folder first. Returns the
/// target path; the copy either fully lands or an error is returned.
pub fn classify(image_path: &Path, class_name: &str) -> Result<ClassifyOutcome, ClassifyError> {
    let image_path = absolute(image_path)?;
    match image_path.try_exists() {
        Ok(true) => {}
        Ok(false) => return Err(ClassifyError::ImageNotFound(image_path)),
        Err(source) => {
            return Err(ClassifyError::Resolve {
                path: image_path,
                source,
            });
        }
    }
    let placement = Placement::new(&image_path, class_name)?;

    let warnings = remove_from_other_classes(&placement, class_name);

    if !placement.target_dir.is_dir() {
        fs::create_dir_all(&placement.target_dir).map_err(|source| ClassifyError::CreateDir {
            path: placement.target_dir.clone(),
            source,
        })?;
        debug!(dir = %placement.target_dir.display(), "created class folder");
    }

    let target_path = placement.target_path();
    copy_preserving_times(&image_path, &target_path).map_err(|source| ClassifyError::Copy {
        path: target_path.clone(),
        source,
    })?;
    debug!(
        image = %image_path.display(),
        class = class_name,
        "classified image"
    );

    Ok(ClassifyOutcome {
        target_path,
        class_name: class_name.to_string(),
        warnings,
    })
}

/// Delete the image's basename from every sibling folder except the target
/// class folder and the source directory itself.
fn remove_from_other_classes(placement: &Placement, class_name: &str) -> Vec<Warning> {
    let mut warnings = Vec::new();
    let source_name = placement.image_dir.file_name();

    let entries = match fs::read_dir(&placement.parent_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return warnings,
        Err(e) => {
            warn!(
                dir = %placement.parent_dir.display(),
                error = %e,
                "cannot scan for stale classifications"
            );
            warnings.push(Warning::new(&placement.parent_dir, e.to_string()));
            return warnings;
        }
    };

    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let name = entry.file_name();
        if !path.is_dir() || name == OsStr::new(class_name) || Some(name.as_os_str()) == source_name
        {
            continue;
        }
        let stale = path.join(&placement.filename);
        match fs::remove_file(&stale) {
            Ok(()) => debug!(path = %stale.display(), "removed stale classification"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(
                    path = %stale.display(),
                    error = %e,
                    "failed to remove old classification"
                );
                warnings.push(Warning::new(stale, e.to_string()));
            }
        }
    }

    warnings
}

/// Copy content and permissions, then carry over access and modification times.
fn copy_preserving_times(from: &Path, to: &Path) -> std::io::Result<()> {
    fs::copy(from, to)?;
    let meta = fs::metadata(from)?;
    let mut times = fs::FileTimes::new();
    if let Ok(accessed) = meta.accessed() {
        times = times.set_accessed(accessed);
    }
    if let Ok(modified) = meta.modified() {
        times = times.set_modified(modified);
    }
    let target = fs::OpenOptions::new().write(true).open(to)?;
    target.set_times(times)
}

/// Remove the image's copy from the `class_name` folder, if there is one.
pub fn unclassify(
    image_path: &Path,
    class_name: &str,
) -> Result<UnclassifyOutcome, ClassifyError> {
    let image_path = absolute(image_path)?;
    let placement = Placement::new(&image_path, class_name)?;
    let target_path = placement.target_path();

    let removed = match fs::remove_file(&target_path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(source) => {
            return Err(ClassifyError::Delete {
                path: target_path,
                source,
            });
        }
    };
    if removed {
        debug!(path = %target_path.display(), "removed classification");
    }

    Ok(UnclassifyOutcome {
        target_path,
        removed,
    })
}

/// Rebuild `image name → class name` for images of `source_dir`.
///
/// Scans the siblings of `source_dir`. When an image shows up in more than
/// one class folder, the first folder in directory enumeration order wins;
/// that order is OS-defined. Any failure to read the parent yields an empty
/// map, since class annotations are best-effort.
pub fn reconcile<S: AsRef<str>>(source_dir: &Path, image_names: &[S]) -> BTreeMap<String, String> {
    let mut classes = BTreeMap::new();
    if image_names.is_empty() {
        return classes;
    }

    let Ok(source_dir) = std::path::absolute(source_dir) else {
        return classes;
    };
    let Some(parent_dir) = source_dir.parent() else {
        return classes;
    };
    let source_name = source_dir.file_name();

    let entries = match fs::read_dir(parent_dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(
                dir = %parent_dir.display(),
                error = %e,
                "skipping classification detection"
            );
            return classes;
        }
    };

    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let name = entry.file_name();
        if !path.is_dir() || Some(name.as_os_str()) == source_name {
            continue;
        }
        let class_name = name.to_string_lossy();
        for image in image_names {
            let image = image.as_ref();
            if !classes.contains_key(image) && path.join(image).exists() {
                classes.insert(image.to_string(), class_name.to_string());
            }
        }
    }

    classes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ClassTree, write_bytes};

    // =========================================================================
    // classify
    // =========================================================================

    #[test]
    fn classify_copies_into_sibling_folder() {
        let tree = ClassTree::new(&["a.png"]);
        let image = tree.image("a.png");

        let outcome = classify(&image, "cats").unwrap();

        assert_eq!(outcome.target_path, tree.class_dir("cats").join("a.png"));
        assert_eq!(outcome.class_name, "cats");
        assert!(outcome.warnings.is_empty());
        assert_eq!(
            fs::read(&outcome.target_path).unwrap(),
            fs::read(&image).unwrap()
        );
        // Copy, never move
        assert!(image.exists());
    }

    #[test]
    fn classify_creates_missing_class_folder() {
        let tree = ClassTree::new(&["a.png"]);
        assert!(!tree.class_dir("new-class").exists());

        classify(&tree.image("a.png"), "new-class").unwrap();

        assert!(tree.class_dir("new-class").is_dir());
    }

    #[test]
    fn classify_moves_membership_between_classes() {
        let tree = ClassTree::new(&["a.png"]);
        let image = tree.image("a.png");

        classify(&image, "cats").unwrap();
        classify(&image, "dogs").unwrap();

        assert!(!tree.class_dir("cats").join("a.png").exists());
        assert!(tree.class_dir("dogs").join("a.png").exists());
    }

    #[test]
    fn classify_removes_duplicates_from_every_other_folder() {
        let tree = ClassTree::new(&["a.png"]);
        for class in ["x", "y", "z"] {
            fs::create_dir_all(tree.class_dir(class)).unwrap();
            write_bytes(&tree.class_dir(class).join("a.png"), b"stale");
        }

        classify(&tree.image("a.png"), "y").unwrap();

        assert!(!tree.class_dir("x").join("a.png").exists());
        assert!(!tree.class_dir("z").join("a.png").exists());
        assert!(tree.class_dir("y").join("a.png").exists());
    }

    #[test]
    fn classify_never_touches_source_directory() {
        let tree = ClassTree::new(&["a.png", "b.png"]);

        classify(&tree.image("a.png"), "cats").unwrap();

        assert!(tree.image("a.png").exists());
        assert!(tree.image("b.png").exists());
    }

    #[test]
    fn classify_leaves_other_images_alone() {
        let tree = ClassTree::new(&["a.png", "b.png"]);
        classify(&tree.image("b.png"), "cats").unwrap();

        classify(&tree.image("a.png"), "dogs").unwrap();

        assert!(tree.class_dir("cats").join("b.png").exists());
    }

    #[test]
    fn classify_same_class_twice_overwrites() {
        let tree = ClassTree::new(&["a.png"]);
        let image = tree.image("a.png");
        classify(&image, "cats").unwrap();
        write_bytes(&image, b"edited");

        let outcome = classify(&image, "cats").unwrap();

        assert_eq!(fs::read(outcome.target_path).unwrap(), b"edited");
    }

    #[test]
    fn classify_preserves_modification_time() {
        let tree = ClassTree::new(&["a.png"]);
        let image = tree.image("a.png");
        let old = std::time::SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000_000);
        fs::OpenOptions::new()
            .write(true)
            .open(&image)
            .unwrap()
            .set_modified(old)
            .unwrap();

        let outcome = classify(&image, "cats").unwrap();

        let copied = fs::metadata(outcome.target_path).unwrap().modified().unwrap();
        assert_eq!(copied, old);
    }

    #[test]
    fn classify_missing_image_is_not_found() {
        let tree = ClassTree::new(&[]);
        let err = classify(&tree.image("ghost.png"), "cats").unwrap_err();
        assert!(matches!(err, ClassifyError::ImageNotFound(_)));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!tree.class_dir("cats").exists());
    }

    #[test]
    fn classify_rejects_path_like_class_names() {
        let tree = ClassTree::new(&["a.png"]);
        for bad in ["", ".", "..", "a/b", "../escape"] {
            let err = classify(&tree.image("a.png"), bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "class {bad:?}");
        }
    }

    #[test]
    fn classify_into_own_source_directory_is_rejected() {
        let tree = ClassTree::new(&["a.png"]);
        let image = tree.image("a.png");
        let before = fs::read(&image).unwrap();

        let err = classify(&image, "batch").unwrap_err();

        assert!(matches!(err, ClassifyError::ClassIsSourceDir { .. }));
        assert_eq!(err.kind().status_code(), 400);
        assert_eq!(fs::read(&image).unwrap(), before);
    }

    #[test]
    fn classify_copy_failure_is_io_error() {
        let tree = ClassTree::new(&["a.png"]);
        // A directory squatting on the target file name makes the copy fail.
        fs::create_dir_all(tree.class_dir("cats").join("a.png")).unwrap();

        let err = classify(&tree.image("a.png"), "cats").unwrap_err();

        assert!(matches!(err, ClassifyError::Copy { .. }));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn classify_records_failed_cleanup_as_warning() {
        let tree = ClassTree::new(&["a.png"]);
        // remove_file on a directory fails, which must not abort classify.
        fs::create_dir_all(tree.class_dir("dogs").join("a.png")).unwrap();

        let outcome = classify(&tree.image("a.png"), "cats").unwrap();

        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].path, tree.class_dir("dogs").join("a.png"));
        assert!(outcome.target_path.exists());
    }

    #[test]
    fn validate_class_name_accepts_plain_names() {
        for ok in ["cats", "class 1", "1", "wubao", ".hidden"] {
            assert!(validate_class_name(ok).is_ok(), "{ok:?}");
        }
    }

    // =========================================================================
    // unclassify
    // =========================================================================

    #[test]
    fn unclassify_removes_copy() {
        let tree = ClassTree::new(&["a.png"]);
        let image = tree.image("a.png");
        classify(&image, "cats").unwrap();

        let outcome = unclassify(&image, "cats").unwrap();

        assert!(outcome.removed);
        assert!(!outcome.target_path.exists());
        assert!(image.exists());
    }

    #[test]
    fn unclassify_never_classified_is_noop() {
        let tree = ClassTree::new(&["a.png"]);

        let outcome = unclassify(&tree.image("a.png"), "cats").unwrap();

        assert!(!outcome.removed);
        assert!(!tree.class_dir("cats").exists());
    }

    #[test]
    fn unclassify_other_class_keeps_membership() {
        let tree = ClassTree::new(&["a.png"]);
        let image = tree.image("a.png");
        classify(&image, "cats").unwrap();

        unclassify(&image, "dogs").unwrap();

        assert!(tree.class_dir("cats").join("a.png").exists());
    }

    #[test]
    fn unclassify_does_not_require_source_to_exist() {
        let tree = ClassTree::new(&["a.png"]);
        let image = tree.image("a.png");
        classify(&image, "cats").unwrap();
        fs::remove_file(&image).unwrap();

        assert!(unclassify(&image, "cats").unwrap().removed);
    }

    #[test]
    fn unclassify_delete_failure_is_io_error() {
        let tree = ClassTree::new(&["a.png"]);
        fs::create_dir_all(tree.class_dir("cats").join("a.png")).unwrap();

        let err = unclassify(&tree.image("a.png"), "cats").unwrap_err();

        assert!(matches!(err, ClassifyError::Delete { .. }));
        assert_eq!(err.kind().status_code(), 500);
    }

    #[test]
    fn unclassify_from_own_source_directory_keeps_the_image() {
        let tree = ClassTree::new(&["a.png"]);
        let image = tree.image("a.png");

        let err = unclassify(&image, "batch").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(image.is_file());
    }

    // =========================================================================
    // reconcile
    // =========================================================================

    #[test]
    fn reconcile_reports_classified_images() {
        let tree = ClassTree::new(&["a.png", "b.png", "c.png"]);
        classify(&tree.image("a.png"), "cats").unwrap();
        classify(&tree.image("c.png"), "dogs").unwrap();

        let classes = reconcile(&tree.source_dir(), &["a.png", "b.png", "c.png"]);

        assert_eq!(classes.len(), 2);
        assert_eq!(classes["a.png"], "cats");
        assert_eq!(classes["c.png"], "dogs");
    }

    #[test]
    fn reconcile_ignores_source_directory() {
        let tree = ClassTree::new(&["a.png"]);
        let classes = reconcile(&tree.source_dir(), &["a.png"]);
        assert!(classes.is_empty());
    }

    #[test]
    fn reconcile_ignores_plain_files_in_parent() {
        let tree = ClassTree::new(&["a.png"]);
        write_bytes(&tree.root().join("a.png"), b"loose file");

        let classes = reconcile(&tree.source_dir(), &["a.png"]);

        assert!(classes.is_empty());
    }

    #[test]
    fn reconcile_duplicate_membership_reports_one_class() {
        let tree = ClassTree::new(&["a.png"]);
        for class in ["x", "y"] {
            fs::create_dir_all(tree.class_dir(class)).unwrap();
            write_bytes(&tree.class_dir(class).join("a.png"), b"dup");
        }

        let classes = reconcile(&tree.source_dir(), &["a.png"]);

        // Which one wins depends on enumeration order.
        assert!(classes["a.png"] == "x" || classes["a.png"] == "y");
    }

    #[cfg(unix)]
    #[test]
    fn reconcile_permission_denied_on_parent_is_empty() {
        let tree = ClassTree::new(&["a.png"]);
        classify(&tree.image("a.png"), "cats").unwrap();
        let Some(_locked) = crate::test_helpers::lock_dir(tree.root()) else {
            return;
        };

        let classes = reconcile(&tree.source_dir(), &["a.png"]);

        assert!(classes.is_empty());
    }

    #[test]
    fn reconcile_unreadable_parent_is_empty() {
        let classes = reconcile(Path::new("/nonexistent/deeply/nested"), &["a.png"]);
        assert!(classes.is_empty());
    }
}
