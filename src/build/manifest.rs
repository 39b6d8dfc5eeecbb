//! Change manifest for incremental shader compilation.
//!
//! The manifest remembers the last observed modification time of every
//! shader source, keyed by its path relative to the shader source root.
//! A source is recompiled when it is newer than the remembered time or when
//! any of its declared outputs is missing or older than the remembered time.
//!
//! # Manifest Format
//!
//! Plain text, one entry per line, sorted by path:
//!
//! ```text
//! Common/blit.vert.glsl=1705314600123456789
//! lit.frag.glsl=1705314612000000000
//! ```
//!
//! Timestamps are nanoseconds since the Unix epoch. Lines that cannot be
//! parsed are skipped with a warning.
//!
//! # Persistence
//!
//! The manifest is written when the [`ChangeManifest`] is dropped. The file is
//! replaced atomically (temp file in the same directory, then rename), so an
//! aborted run leaves the previous manifest in place and every file seen in
//! that run is checked again next time.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::NamedTempFile;

/// Suffix appended to the manifest name to form its file name.
pub const MANIFEST_SUFFIX: &str = "FileManifest.manifest";

/// Error during manifest operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ManifestError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Replacing the manifest file failed
    #[error("Failed to replace manifest: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Persisted source path to timestamp store.
#[derive(Debug)]
pub struct ChangeManifest {
    /// Root that entry keys are relative to
    source_root: PathBuf,
    /// Manifest file location
    path: PathBuf,
    /// Relative path to last observed modification ticks
    entries: BTreeMap<String, u64>,
    /// Whether dropping the manifest writes it back to disk
    persist_on_drop: bool,
}

impl ChangeManifest {
    /// Open the manifest `<name>FileManifest.manifest` inside `manifest_dir`.
    ///
    /// A missing file yields an empty manifest. The directory is created if needed.
    pub fn open(name: &str, source_root: &Path, manifest_dir: &Path) -> Result<Self, ManifestError> {
        fs::create_dir_all(manifest_dir)?;
        let path = manifest_path(name, manifest_dir);
        let entries = Self::load_entries(&path)?;

        tracing::debug!(
            manifest = %path.display(),
            entries = entries.len(),
            "loaded change manifest"
        );

        Ok(Self { source_root: normalize_path(source_root), path, entries, persist_on_drop: true })
    }

    /// Open a manifest that is never written back, for inspecting staleness.
    pub fn open_read_only(
        name: &str,
        source_root: &Path,
        manifest_dir: &Path,
    ) -> Result<Self, ManifestError> {
        let path = manifest_path(name, manifest_dir);
        let entries = Self::load_entries(&path)?;
        Ok(Self { source_root: normalize_path(source_root), path, entries, persist_on_drop: false })
    }

    /// Read entries from a manifest file. Returns an empty map if it doesn't exist.
    pub fn load_entries(path: &Path) -> Result<BTreeMap<String, u64>, ManifestError> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(parse_entries(&contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Check whether `source` changed since it was last seen, updating the entry if so.
    ///
    /// `outputs` are the files the source produces; a missing or stale output
    /// counts as a change. A source that does not exist is reported as changed.
    pub fn is_newer(&mut self, source: &Path, outputs: &[&Path]) -> bool {
        let Some((key, current)) = self.observe(source) else {
            return true;
        };

        match self.entries.get(&key).copied() {
            None => {
                self.entries.insert(key, current);
                true
            }
            Some(remembered) => {
                if !is_changed(remembered, current, outputs) {
                    return false;
                }
                self.entries.insert(key, current);
                true
            }
        }
    }

    /// Same verdict as [`is_newer`](Self::is_newer) without touching any entry.
    pub fn probe(&self, source: &Path, outputs: &[&Path]) -> bool {
        let Some((key, current)) = self.observe(source) else {
            return true;
        };
        match self.entries.get(&key) {
            None => true,
            Some(&remembered) => is_changed(remembered, current, outputs),
        }
    }

    /// Manifest key and current modification ticks of a source file.
    fn observe(&self, source: &Path) -> Option<(String, u64)> {
        let current = match file_ticks(source) {
            Ok(ticks) => ticks,
            Err(e) => {
                tracing::warn!(
                    source = %source.display(),
                    error = %e,
                    "shader source vanished after discovery; treating as changed"
                );
                return None;
            }
        };
        Some((self.key_for(source), current))
    }

    /// Path of `source` relative to the source root, with `..` resolved and `/` separators.
    pub fn key_for(&self, source: &Path) -> String {
        let normalized = normalize_path(source);
        let relative = normalized.strip_prefix(&self.source_root).unwrap_or(&normalized);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Remembered ticks for a relative key.
    pub fn get(&self, key: &str) -> Option<u64> {
        self.entries.get(key).copied()
    }

    /// Set the remembered ticks for a relative key.
    pub fn insert(&mut self, key: impl Into<String>, ticks: u64) {
        self.entries.insert(key.into(), ticks);
    }

    pub fn entries(&self) -> &BTreeMap<String, u64> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Location of the manifest file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the manifest file with the in-memory entries.
    pub fn save(&self) -> Result<(), ManifestError> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let mut file = NamedTempFile::new_in(dir)?;
        for (key, ticks) in &self.entries {
            writeln!(file, "{}={}", key, ticks)?;
        }
        file.as_file().sync_all()?;
        file.persist(&self.path)?;
        Ok(())
    }
}

impl Drop for ChangeManifest {
    fn drop(&mut self) {
        if !self.persist_on_drop {
            return;
        }
        match self.save() {
            Ok(()) => tracing::debug!(
                manifest = %self.path.display(),
                entries = self.entries.len(),
                "saved change manifest"
            ),
            Err(e) => tracing::error!(
                manifest = %self.path.display(),
                error = %e,
                "failed to save change manifest"
            ),
        }
    }
}

/// Location of the manifest file `<name>FileManifest.manifest` inside `manifest_dir`.
pub fn manifest_path(name: &str, manifest_dir: &Path) -> PathBuf {
    manifest_dir.join(format!("{}{}", name, MANIFEST_SUFFIX))
}

/// Decide whether a source with a remembered timestamp must be rebuilt.
fn is_changed(remembered: u64, current: u64, outputs: &[&Path]) -> bool {
    if current > remembered {
        return true;
    }
    // Outputs must postdate the remembered source time; this also catches a
    // previous run that recorded the source but died before producing outputs.
    outputs.iter().any(|output| match file_ticks(output) {
        Ok(ticks) => ticks <= remembered,
        Err(_) => true,
    })
}

/// Parse manifest text, skipping malformed lines.
fn parse_entries(contents: &str) -> BTreeMap<String, u64> {
    let mut entries = BTreeMap::new();
    for (number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parsed = line
            .rsplit_once('=')
            .and_then(|(key, value)| value.trim().parse::<u64>().ok().map(|ticks| (key.trim(), ticks)));
        match parsed {
            Some((key, ticks)) if !key.is_empty() => {
                entries.insert(key.to_string(), ticks);
            }
            _ => {
                tracing::warn!(line = number + 1, content = line, "cannot parse file timestamp");
            }
        }
    }
    entries
}

/// Modification time of a file as nanoseconds since the Unix epoch.
pub fn file_ticks(path: &Path) -> io::Result<u64> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(system_time_ticks(modified))
}

/// Convert a [`SystemTime`] to manifest ticks.
pub fn system_time_ticks(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH).map(|d| d.as_nanos() as u64).unwrap_or(0)
}

/// Lexically resolve `.` and `..` components.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(normalized.components().next_back(), Some(Component::Normal(_))) {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn set_mtime(path: &Path, secs: u64) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(UNIX_EPOCH + Duration::from_secs(secs)).unwrap();
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
        assert_eq!(normalize_path(Path::new("a/../../b")), PathBuf::from("../b"));
        assert_eq!(normalize_path(Path::new("/../a")), PathBuf::from("/a"));
    }

    #[test]
    fn test_key_resolves_parent_segments() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("src");
        let manifest = ChangeManifest::open_read_only("Test", &root, temp.path()).unwrap();

        let source = root.join("Common/../Lit/lit.frag.glsl");
        assert_eq!(manifest.key_for(&source), "Lit/lit.frag.glsl");
    }

    #[test]
    fn test_parse_skips_malformed_lines() {
        let entries = parse_entries("x/y.frag.glsl=100\nno separator here\n\nz.vert.glsl=abc\n");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries.get("x/y.frag.glsl"), Some(&100));
    }

    #[test]
    fn test_parse_trims_keys() {
        let entries = parse_entries("a.vert.glsl = 5\n  Post/b.frag.glsl=6\n = 7\n");
        let expected =
            BTreeMap::from([("Post/b.frag.glsl".to_string(), 6), ("a.vert.glsl".to_string(), 5)]);
        assert_eq!(entries, expected);
    }

    /// Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_malformed_lines_are_warned() {
        let capture = CaptureWriter::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let entries = tracing::subscriber::with_default(subscriber, || {
            parse_entries("lit.frag.glsl=1\nno separator here\n\nsky.frag.glsl=abc\n")
        });
        assert_eq!(entries.len(), 1);

        let logged = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        let warnings: Vec<_> =
            logged.lines().filter(|l| l.contains("WARN") && l.contains("cannot parse file timestamp")).collect();
        assert_eq!(warnings.len(), 2, "{}", logged);
        assert!(warnings[0].contains("line=2"));
        assert!(warnings[1].contains("line=4"));
    }

    #[test]
    fn test_manifest_round_trip() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("src");

        {
            let mut manifest = ChangeManifest::open("Shader", &root, temp.path()).unwrap();
            manifest.insert("x/y.frag.glsl", 100);
            manifest.insert("z.vert.glsl", 200);
        }

        let reloaded = ChangeManifest::open_read_only("Shader", &root, temp.path()).unwrap();
        let expected =
            BTreeMap::from([("x/y.frag.glsl".to_string(), 100), ("z.vert.glsl".to_string(), 200)]);
        assert_eq!(reloaded.entries(), &expected);
    }

    #[test]
    fn test_manifest_file_format() {
        let temp = TempDir::new().unwrap();
        let path = {
            let mut manifest = ChangeManifest::open("Shader", temp.path(), temp.path()).unwrap();
            manifest.insert("b.frag.glsl", 2);
            manifest.insert("a.vert.glsl", 1);
            manifest.path().to_path_buf()
        };

        assert!(path.ends_with("ShaderFileManifest.manifest"));
        let contents = fs::read_to_string(path).unwrap();
        assert_eq!(contents, "a.vert.glsl=1\nb.frag.glsl=2\n");
    }

    #[test]
    fn test_load_tolerates_malformed_file() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "ShaderFileManifest.manifest", "lit.frag.glsl=42\ngarbage\n");

        let manifest = ChangeManifest::open_read_only("Shader", temp.path(), temp.path()).unwrap();
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.get("lit.frag.glsl"), Some(42));
    }

    #[test]
    fn test_new_source_is_newer_and_recorded() {
        let temp = TempDir::new().unwrap();
        let source = create_test_file(temp.path(), "src/lit.frag.glsl", "void mainFS() {}");
        set_mtime(&source, 1_000);

        let mut manifest =
            ChangeManifest::open_read_only("Shader", &temp.path().join("src"), temp.path()).unwrap();
        assert!(manifest.is_newer(&source, &[]));
        assert_eq!(manifest.get("lit.frag.glsl"), Some(1_000 * 1_000_000_000));
    }

    #[test]
    fn test_unchanged_source_with_fresh_outputs() {
        let temp = TempDir::new().unwrap();
        let source = create_test_file(temp.path(), "src/lit.frag.glsl", "");
        let output = create_test_file(temp.path(), "out/lit.frag.shader", "");
        set_mtime(&source, 1_000);
        set_mtime(&output, 2_000);

        let mut manifest =
            ChangeManifest::open_read_only("Shader", &temp.path().join("src"), temp.path()).unwrap();
        assert!(manifest.is_newer(&source, &[&output]));
        assert!(!manifest.is_newer(&source, &[&output]));
        assert!(!manifest.probe(&source, &[&output]));
    }

    #[test]
    fn test_touched_source_is_newer() {
        let temp = TempDir::new().unwrap();
        let source = create_test_file(temp.path(), "src/lit.frag.glsl", "");
        let output = create_test_file(temp.path(), "out/lit.frag.shader", "");
        set_mtime(&source, 1_000);
        set_mtime(&output, 5_000);

        let mut manifest =
            ChangeManifest::open_read_only("Shader", &temp.path().join("src"), temp.path()).unwrap();
        manifest.is_newer(&source, &[&output]);

        set_mtime(&source, 3_000);
        assert!(manifest.probe(&source, &[&output]));
        assert!(manifest.is_newer(&source, &[&output]));
        assert_eq!(manifest.get("lit.frag.glsl"), Some(3_000 * 1_000_000_000));
        assert!(!manifest.is_newer(&source, &[&output]));
    }

    #[test]
    fn test_missing_output_forces_rebuild() {
        let temp = TempDir::new().unwrap();
        let source = create_test_file(temp.path(), "src/lit.frag.glsl", "");
        set_mtime(&source, 1_000);
        let output = temp.path().join("out/lit.frag.shader");

        let mut manifest =
            ChangeManifest::open_read_only("Shader", &temp.path().join("src"), temp.path()).unwrap();
        assert!(manifest.is_newer(&source, &[&output]));
        assert!(manifest.is_newer(&source, &[&output]));
    }

    #[test]
    fn test_output_older_than_remembered_source_forces_rebuild() {
        let temp = TempDir::new().unwrap();
        let source = create_test_file(temp.path(), "src/lit.frag.glsl", "");
        let output = create_test_file(temp.path(), "out/lit.frag.shader", "");
        set_mtime(&source, 2_000);
        set_mtime(&output, 2_000);

        let mut manifest =
            ChangeManifest::open_read_only("Shader", &temp.path().join("src"), temp.path()).unwrap();
        manifest.insert("lit.frag.glsl", 2_000 * 1_000_000_000);

        // Output is not strictly newer than the remembered source time
        assert!(manifest.is_newer(&source, &[&output]));
    }

    #[test]
    fn test_missing_source_reports_changed() {
        let temp = TempDir::new().unwrap();
        let mut manifest =
            ChangeManifest::open_read_only("Shader", temp.path(), temp.path()).unwrap();

        assert!(manifest.is_newer(&temp.path().join("gone.vert.glsl"), &[]));
        assert!(manifest.is_empty());
    }

    #[test]
    fn test_forgotten_manifest_is_not_persisted() {
        let temp = TempDir::new().unwrap();
        let source = create_test_file(temp.path(), "src/lit.vert.glsl", "");
        let root = temp.path().join("src");

        let mut manifest = ChangeManifest::open("Shader", &root, temp.path()).unwrap();
        assert!(manifest.is_newer(&source, &[]));
        let path = manifest.path().to_path_buf();
        std::mem::forget(manifest);

        assert!(!path.exists());
        let mut manifest = ChangeManifest::open("Shader", &root, temp.path()).unwrap();
        assert!(manifest.is_newer(&source, &[]));
    }
}
