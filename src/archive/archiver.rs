//! Archiver - Packs a directory into a single deterministic ZIP archive
//!
//! Every regular file below the source directory is stored under its path
//! relative to the source root. Symbolic links are not followed and are left
//! out of the archive. Entries are written in sorted order with a
//! fixed timestamp and fixed permissions, so the same tree always produces
//! the same bytes. The archive is written to a temporary file next to its
//! final location and renamed into place only once it is complete.

use crate::core::error::PublishError;
use log::{debug, info};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Archive file extension
pub const ARCHIVE_EXTENSION: &str = "zip";

/// A finished archive on local storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    /// Final archive location
    pub path: PathBuf,

    /// Archive size in bytes
    pub size: u64,

    /// Stored entry names, in archive order
    pub entries: Vec<String>,
}

impl Archive {
    /// Base file name of the archive (e.g., "widget.zip")
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// A regular file scheduled for the archive
struct ArchiveEntry {
    source: PathBuf,
    name: String,
    len: u64,
}

/// Temporary archive file, removed on drop unless committed
struct PartialArchive {
    path: PathBuf,
    committed: bool,
}

impl PartialArchive {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    /// Move the finished file into place, replacing any previous archive
    fn commit(mut self, final_path: &Path) -> Result<(), PublishError> {
        if final_path.exists() {
            fs::remove_file(final_path).map_err(|e| PublishError::filesystem(final_path, e))?;
        }
        fs::rename(&self.path, final_path).map_err(|e| PublishError::filesystem(final_path, e))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartialArchive {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Creates archives in a fixed output directory
#[derive(Debug, Clone)]
pub struct Archiver {
    output_dir: PathBuf,
}

impl Archiver {
    /// Create an archiver writing into `output_dir`
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Create an archiver writing into the process working directory
    pub fn in_working_dir() -> Result<Self, PublishError> {
        let cwd = std::env::current_dir().map_err(|e| PublishError::filesystem(".", e))?;
        Ok(Self::new(cwd))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Deterministic archive path for a source directory: `<output_dir>/<dir name>.zip`
    pub fn archive_path_for(&self, source_dir: &Path) -> Result<PathBuf, PublishError> {
        let root = Self::resolve_source(source_dir)?;
        let base_name = Self::base_name(&root)?;
        Ok(self
            .output_dir
            .join(format!("{}.{}", base_name, ARCHIVE_EXTENSION)))
    }

    /// Pack `source_dir` into its deterministic archive path
    ///
    /// The whole tree is walked before anything is written; any unreadable
    /// entry fails the call and no archive is left behind.
    pub fn create(&self, source_dir: &Path) -> Result<Archive, PublishError> {
        let root = Self::resolve_source(source_dir)?;
        let base_name = Self::base_name(&root)?;
        let archive_file = format!("{}.{}", base_name, ARCHIVE_EXTENSION);
        let archive_path = self.output_dir.join(&archive_file);

        // Compare against the canonical location, the walk yields canonical paths
        let skip_path = self
            .output_dir
            .canonicalize()
            .map(|dir| dir.join(&archive_file))
            .unwrap_or_else(|_| archive_path.clone());

        let entries = Self::collect_entries(&root, &skip_path)?;
        debug!(
            "Collected {} files from {} for {}",
            entries.len(),
            root.display(),
            archive_path.display()
        );

        self.pack(&base_name, entries, archive_path)
    }

    /// Write collected entries through a temporary file into `archive_path`
    fn pack(
        &self,
        base_name: &str,
        entries: Vec<ArchiveEntry>,
        archive_path: PathBuf,
    ) -> Result<Archive, PublishError> {
        let partial_path = self.output_dir.join(format!(
            ".{}.{}.{}.partial",
            base_name,
            ARCHIVE_EXTENSION,
            uuid::Uuid::new_v4().simple()
        ));
        let partial = PartialArchive::new(partial_path);

        Self::write_archive(&partial.path, &entries)?;
        partial.commit(&archive_path)?;

        let size = fs::metadata(&archive_path)
            .map_err(|e| PublishError::filesystem(&archive_path, e))?
            .len();

        info!(
            "Created archive {} ({} entries, {} bytes)",
            archive_path.display(),
            entries.len(),
            size
        );

        Ok(Archive {
            path: archive_path,
            size,
            entries: entries.into_iter().map(|e| e.name).collect(),
        })
    }

    /// Canonicalize and check the source directory
    fn resolve_source(source_dir: &Path) -> Result<PathBuf, PublishError> {
        let root = source_dir
            .canonicalize()
            .map_err(|e| PublishError::filesystem(source_dir, e))?;

        if !root.is_dir() {
            return Err(PublishError::filesystem(source_dir, "not a directory"));
        }

        Ok(root)
    }

    fn base_name(root: &Path) -> Result<String, PublishError> {
        root.file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .ok_or_else(|| PublishError::filesystem(root, "directory has no UTF-8 base name"))
    }

    /// Walk the source tree, sorted by name, and collect every regular file
    ///
    /// The archive's own final path is skipped so that archiving a directory
    /// into itself never picks up a stale archive.
    fn collect_entries(
        root: &Path,
        archive_path: &Path,
    ) -> Result<Vec<ArchiveEntry>, PublishError> {
        let mut entries = Vec::new();

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                PublishError::filesystem(path, e)
            })?;

            if !entry.file_type().is_file() || entry.path() == archive_path {
                continue;
            }

            let metadata = entry
                .metadata()
                .map_err(|e| PublishError::filesystem(entry.path(), e))?;

            entries.push(ArchiveEntry {
                name: Self::entry_name(root, entry.path())?,
                source: entry.into_path(),
                len: metadata.len(),
            });
        }

        Ok(entries)
    }

    /// Relative path with `/` separators
    fn entry_name(root: &Path, path: &Path) -> Result<String, PublishError> {
        let relative = path
            .strip_prefix(root)
            .map_err(|e| PublishError::filesystem(path, e))?;

        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str().ok_or_else(|| {
                    PublishError::filesystem(path, "file name is not valid UTF-8")
                })?),
                _ => return Err(PublishError::filesystem(path, "unexpected path component")),
            }
        }

        Ok(parts.join("/"))
    }

    /// Fixed timestamp and permissions keep the output byte-stable
    fn entry_options(len: u64) -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default())
            .unix_permissions(0o644)
            .large_file(len >= u32::MAX as u64)
    }

    fn write_archive(path: &Path, entries: &[ArchiveEntry]) -> Result<(), PublishError> {
        let file = File::create(path).map_err(|e| PublishError::filesystem(path, e))?;
        let mut writer = ZipWriter::new(file);

        for entry in entries {
            let source = File::open(&entry.source)
                .map_err(|e| PublishError::filesystem(&entry.source, e))?;

            writer
                .start_file(entry.name.as_str(), Self::entry_options(entry.len))
                .map_err(|e| PublishError::filesystem(path, e))?;

            io::copy(&mut BufReader::new(source), &mut writer)
                .map_err(|e| PublishError::filesystem(&entry.source, e))?;
        }

        let file = writer
            .finish()
            .map_err(|e| PublishError::filesystem(path, e))?;
        file.sync_all().map_err(|e| PublishError::filesystem(path, e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::io::Read;
    use tempfile::TempDir;

    fn write_file(root: &Path, relative: &str, content: &[u8]) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn read_archive(path: &Path) -> BTreeMap<String, Vec<u8>> {
        let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut contents = BTreeMap::new();
        for i in 0..archive.len() {
            let mut file = archive.by_index(i).unwrap();
            let mut data = Vec::new();
            file.read_to_end(&mut data).unwrap();
            contents.insert(file.name().to_string(), data);
        }
        contents
    }

    fn source_tree() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("widget");
        write_file(&source, "README.md", b"# widget\n");
        write_file(&source, "bin/widget", &[0u8, 1, 2, 3, 255]);
        write_file(&source, "lib/nested/deep/data.json", br#"{"ok":true}"#);
        fs::create_dir_all(source.join("empty/dir")).unwrap();
        (temp_dir, source)
    }

    #[test]
    fn test_archive_round_trip() {
        let (_src_guard, source) = source_tree();
        let out_dir = TempDir::new().unwrap();

        let archive = Archiver::new(out_dir.path()).create(&source).unwrap();
        let contents = read_archive(&archive.path);

        let expected: BTreeMap<String, Vec<u8>> = [
            ("README.md", b"# widget\n".to_vec()),
            ("bin/widget", vec![0u8, 1, 2, 3, 255]),
            ("lib/nested/deep/data.json", br#"{"ok":true}"#.to_vec()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        assert_eq!(contents, expected);
        assert_eq!(archive.entries.len(), 3);
        assert_eq!(archive.size, fs::metadata(&archive.path).unwrap().len());
    }

    #[test]
    fn test_archive_path_is_derived_from_directory_name() {
        let (_src_guard, source) = source_tree();
        let out_dir = TempDir::new().unwrap();
        let archiver = Archiver::new(out_dir.path());

        let expected = out_dir.path().join("widget.zip");
        assert_eq!(archiver.archive_path_for(&source).unwrap(), expected);

        let archive = archiver.create(&source).unwrap();
        assert_eq!(archive.path, expected);
        assert_eq!(archive.file_name(), Some("widget.zip"));
    }

    #[test]
    fn test_archive_is_deterministic() {
        let (_src_guard, source) = source_tree();
        let out_dir = TempDir::new().unwrap();
        let archiver = Archiver::new(out_dir.path());

        let first = fs::read(archiver.create(&source).unwrap().path).unwrap();
        let second = fs::read(archiver.create(&source).unwrap().path).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_existing_archive_is_overwritten() {
        let (_src_guard, source) = source_tree();
        let out_dir = TempDir::new().unwrap();
        fs::write(out_dir.path().join("widget.zip"), b"stale").unwrap();

        let archive = Archiver::new(out_dir.path()).create(&source).unwrap();

        assert_eq!(read_archive(&archive.path).len(), 3);
    }

    #[test]
    fn test_no_partial_files_left_behind() {
        let (_src_guard, source) = source_tree();
        let out_dir = TempDir::new().unwrap();

        Archiver::new(out_dir.path()).create(&source).unwrap();

        let names: Vec<String> = fs::read_dir(out_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["widget.zip".to_string()]);
    }

    #[test]
    fn test_empty_directory_yields_empty_archive() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("empty");
        fs::create_dir_all(source.join("only/dirs")).unwrap();
        let out_dir = TempDir::new().unwrap();

        let archive = Archiver::new(out_dir.path()).create(&source).unwrap();

        assert!(archive.entries.is_empty());
        assert!(read_archive(&archive.path).is_empty());
    }

    #[test]
    fn test_archiving_into_source_skips_stale_archive() {
        let (_src_guard, source) = source_tree();
        let archiver = Archiver::new(&source);

        archiver.create(&source).unwrap();
        let archive = archiver.create(&source).unwrap();

        assert!(!archive.entries.iter().any(|e| e == "widget.zip"));
        assert_eq!(archive.entries.len(), 3);
    }

    #[test]
    fn test_missing_source_directory() {
        let out_dir = TempDir::new().unwrap();
        let result = Archiver::new(out_dir.path()).create(&out_dir.path().join("missing"));

        assert!(matches!(result, Err(PublishError::FilesystemError { .. })));
    }

    #[test]
    fn test_source_must_be_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("file.txt");
        fs::write(&file, b"x").unwrap();

        let result = Archiver::new(temp_dir.path()).create(&file);

        assert!(matches!(result, Err(PublishError::FilesystemError { .. })));
    }

    #[test]
    fn test_unwritable_output_directory() {
        let (_src_guard, source) = source_tree();
        let out_dir = TempDir::new().unwrap();
        let missing_out = out_dir.path().join("does/not/exist");

        let result = Archiver::new(missing_out).create(&source);

        assert!(matches!(result, Err(PublishError::FilesystemError { .. })));
    }

    fn output_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_failed_write_removes_partial_archive() {
        let (_src_guard, source) = source_tree();
        let out_dir = TempDir::new().unwrap();
        let archiver = Archiver::new(out_dir.path());
        let root = source.canonicalize().unwrap();
        let archive_path = out_dir.path().join("widget.zip");

        let entries = Archiver::collect_entries(&root, &archive_path).unwrap();
        // Last entry in walk order; earlier entries are already in the file
        fs::remove_file(root.join("lib/nested/deep/data.json")).unwrap();

        let result = archiver.pack("widget", entries, archive_path.clone());

        match result {
            Err(PublishError::FilesystemError { path, .. }) => {
                assert!(path.ends_with("lib/nested/deep/data.json"));
            }
            other => panic!("expected FilesystemError, got {:?}", other),
        }
        assert!(!archive_path.exists());
        assert!(output_names(out_dir.path()).is_empty());
    }

    #[test]
    fn test_failed_commit_removes_partial_archive() {
        let (_src_guard, source) = source_tree();
        let out_dir = TempDir::new().unwrap();
        // A non-empty directory occupies the final archive path
        write_file(&out_dir.path().join("widget.zip"), "keep", b"x");

        let result = Archiver::new(out_dir.path()).create(&source);

        assert!(matches!(result, Err(PublishError::FilesystemError { .. })));
        assert_eq!(output_names(out_dir.path()), vec!["widget.zip".to_string()]);
        assert!(out_dir.path().join("widget.zip/keep").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_archived() {
        let (_src_guard, source) = source_tree();
        std::os::unix::fs::symlink(source.join("README.md"), source.join("README.link")).unwrap();
        let out_dir = TempDir::new().unwrap();

        let archive = Archiver::new(out_dir.path()).create(&source).unwrap();

        assert!(!archive.entries.iter().any(|e| e == "README.link"));
        assert_eq!(archive.entries.len(), 3);
    }
}
