//! Build-output resolution and tar.gz packaging.

use super::InputPattern;
use crate::errors::PackagingError;
use flate2::write::GzEncoder;
use flate2::Compression;
use glob::Pattern;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::File;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Result of writing a release archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSummary {
    /// Where the archive was written.
    pub path: PathBuf,
    /// Archive members, relative to the build output directory.
    pub files: Vec<PathBuf>,
    /// Archive size in bytes.
    pub bytes: u64,
    /// Hex SHA-256 of the archive.
    pub sha256: String,
}

/// Strips `dir` from a glob match, tolerating a leading `./` on either side.
fn relative_to(dir: &Path, path: &Path) -> PathBuf {
    let normalize = |p: &Path| -> PathBuf {
        p.components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect()
    };
    let dir = normalize(dir);
    let path = normalize(path);
    path.strip_prefix(&dir).map(Path::to_path_buf).unwrap_or(path)
}

/// Expands `pattern` relative to `dir` and returns matching regular files,
/// relative to `dir`.
fn glob_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, PackagingError> {
    Pattern::new(pattern).map_err(|e| PackagingError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;

    let full = format!(
        "{}/{}",
        Pattern::escape(&dir.to_string_lossy()),
        pattern
    );
    let paths = glob::glob(&full).map_err(|e| PackagingError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;

    Ok(paths
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .map(|p| relative_to(dir, &p))
        .collect())
}

/// Resolves input patterns against the build output directory.
///
/// Returns matched files relative to `output_dir`, in pattern order and
/// without duplicates.
///
/// # Errors
///
/// Fails fast on the first required pattern that matches nothing, and fails
/// when the combined match set is empty.
pub fn resolve_inputs(
    output_dir: &Path,
    patterns: &[InputPattern],
) -> Result<Vec<PathBuf>, PackagingError> {
    let mut seen = HashSet::new();
    let mut resolved = Vec::new();

    for input in patterns {
        let matches = glob_files(output_dir, &input.pattern)?;
        debug!(pattern = %input.pattern, matches = matches.len(), "resolved input pattern");

        if matches.is_empty() && input.required {
            return Err(PackagingError::NoMatch {
                pattern: input.pattern.clone(),
                output_dir: output_dir.to_path_buf(),
            });
        }

        for relative in matches {
            if seen.insert(relative.clone()) {
                resolved.push(relative);
            }
        }
    }

    if resolved.is_empty() {
        return Err(PackagingError::Empty {
            output_dir: output_dir.to_path_buf(),
        });
    }

    Ok(resolved)
}

/// Writes a gzip-compressed tar archive of `files` (relative to `output_dir`).
///
/// Missing parent directories of `archive_path` are created.
///
/// # Errors
///
/// Returns `PackagingError::Archive` on any IO failure.
pub fn write_archive(
    output_dir: &Path,
    files: &[PathBuf],
    archive_path: &Path,
) -> Result<ArchiveSummary, PackagingError> {
    let archive_err = |source: std::io::Error| PackagingError::Archive {
        archive: archive_path.to_path_buf(),
        source,
    };

    if let Some(parent) = archive_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(archive_err)?;
    }
    let file = File::create(archive_path).map_err(archive_err)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for relative in files {
        builder
            .append_path_with_name(output_dir.join(relative), relative)
            .map_err(archive_err)?;
    }

    let encoder = builder.into_inner().map_err(archive_err)?;
    let file = encoder.finish().map_err(archive_err)?;
    let bytes = file.metadata().map(|m| m.len()).map_err(archive_err)?;
    drop(file);

    let contents = std::fs::read(archive_path).map_err(archive_err)?;
    let sha256 = hex::encode(Sha256::digest(&contents));

    info!(
        archive = %archive_path.display(),
        files = files.len(),
        bytes = bytes,
        sha256 = %sha256,
        "release archive written"
    );

    Ok(ArchiveSummary {
        path: archive_path.to_path_buf(),
        files: files.to_vec(),
        bytes,
        sha256,
    })
}

/// Collects release assets in `dir` matching `asset_glob`, sorted by path.
///
/// # Errors
///
/// Returns `PackagingError::InvalidPattern` if the glob does not parse.
pub fn collect_assets(dir: &Path, asset_glob: &str) -> Result<Vec<PathBuf>, PackagingError> {
    let mut assets: Vec<PathBuf> = glob_files(dir, asset_glob)?
        .into_iter()
        .map(|relative| dir.join(relative))
        .collect();
    assets.sort();
    Ok(assets)
}

/// Lists the immediate entries of the build output directory.
///
/// Directories are suffixed with `/`. Entries are sorted by name.
///
/// # Errors
///
/// Returns an IO error if the directory cannot be read.
pub fn list_directory(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() {
            name.push('/');
        }
        entries.push(name);
    }
    entries.sort();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use pretty_assertions::assert_eq;

    fn build_output() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("gen_inds"), b"\x7fELF binary").unwrap();
        std::fs::write(dir.path().join("libgen_inds.rlib"), b"rlib").unwrap();
        std::fs::write(dir.path().join("libgen_inds.so"), b"so").unwrap();
        std::fs::write(dir.path().join("other_tool"), b"unrelated").unwrap();
        std::fs::create_dir(dir.path().join("deps")).unwrap();
        std::fs::write(dir.path().join("deps").join("libgen_inds-abc.so"), b"dep").unwrap();
        dir
    }

    #[test]
    fn test_resolve_inputs_in_pattern_order() {
        let dir = build_output();
        let files = resolve_inputs(
            dir.path(),
            &[
                InputPattern::required("gen_inds"),
                InputPattern::required("libgen_inds*"),
            ],
        )
        .unwrap();

        assert_eq!(
            files,
            vec![
                PathBuf::from("gen_inds"),
                PathBuf::from("libgen_inds.rlib"),
                PathBuf::from("libgen_inds.so"),
            ]
        );
    }

    #[test]
    fn test_resolve_inputs_dedups_and_keeps_subdirs() {
        let dir = build_output();
        let files = resolve_inputs(
            dir.path(),
            &[
                InputPattern::required("libgen_inds.so"),
                InputPattern::required("libgen_inds*"),
                InputPattern::required("deps/libgen_inds-*.so"),
            ],
        )
        .unwrap();

        assert_eq!(
            files,
            vec![
                PathBuf::from("libgen_inds.so"),
                PathBuf::from("libgen_inds.rlib"),
                PathBuf::from("deps/libgen_inds-abc.so"),
            ]
        );
    }

    #[test]
    fn test_required_pattern_without_match_fails() {
        let dir = build_output();
        let err = resolve_inputs(
            dir.path(),
            &[
                InputPattern::required("gen_inds"),
                InputPattern::required("*.dll"),
            ],
        )
        .unwrap_err();

        assert!(matches!(err, PackagingError::NoMatch { ref pattern, .. } if pattern == "*.dll"));
    }

    #[test]
    fn test_optional_patterns_without_any_match_fail() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_inputs(dir.path(), &[InputPattern::optional("gen_inds*")]).unwrap_err();
        assert!(matches!(err, PackagingError::Empty { .. }));
    }

    #[test]
    fn test_directories_are_not_inputs() {
        let dir = build_output();
        let err = resolve_inputs(dir.path(), &[InputPattern::required("dep*")]).unwrap_err();
        assert!(matches!(err, PackagingError::NoMatch { .. }));
    }

    #[test]
    fn test_invalid_pattern() {
        let dir = build_output();
        let err = resolve_inputs(dir.path(), &[InputPattern::required("[")]).unwrap_err();
        assert!(matches!(err, PackagingError::InvalidPattern { .. }));
    }

    #[test]
    fn test_write_archive_preserves_relative_paths() {
        let dir = build_output();
        let out = tempfile::tempdir().unwrap();
        let archive_path = out.path().join("gen_inds_v1.0.0.tar.gz");
        let files = vec![
            PathBuf::from("gen_inds"),
            PathBuf::from("deps/libgen_inds-abc.so"),
        ];

        let summary = write_archive(dir.path(), &files, &archive_path).unwrap();
        assert_eq!(summary.files, files);
        assert_eq!(summary.sha256.len(), 64);
        assert!(summary.bytes > 0);

        let mut archive = tar::Archive::new(GzDecoder::new(File::open(&archive_path).unwrap()));
        let members: Vec<PathBuf> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().into_owned())
            .collect();
        assert_eq!(members, files);
    }

    #[test]
    fn test_write_archive_creates_missing_directories() {
        let dir = build_output();
        let out = tempfile::tempdir().unwrap();
        let archive_path = out.path().join("dist").join("v1").join("out.tar.gz");

        let summary = write_archive(dir.path(), &[PathBuf::from("gen_inds")], &archive_path).unwrap();
        assert_eq!(summary.path, archive_path);
        assert!(archive_path.is_file());
    }

    #[test]
    fn test_write_archive_parent_is_a_file() {
        let dir = build_output();
        let archive_path = dir.path().join("gen_inds").join("out.tar.gz");
        let err = write_archive(dir.path(), &[PathBuf::from("gen_inds")], &archive_path).unwrap_err();
        assert!(matches!(err, PackagingError::Archive { .. }));
    }

    #[test]
    fn test_collect_assets() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.tar.gz"), b"b").unwrap();
        std::fs::write(dir.path().join("a.tar.gz"), b"a").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"n").unwrap();

        let assets = collect_assets(dir.path(), "*.tar.gz").unwrap();
        assert_eq!(
            assets,
            vec![dir.path().join("a.tar.gz"), dir.path().join("b.tar.gz")]
        );
    }

    #[test]
    fn test_relative_to_handles_curdir() {
        assert_eq!(
            relative_to(Path::new("./target/release"), Path::new("target/release/gen_inds")),
            PathBuf::from("gen_inds")
        );
        assert_eq!(
            relative_to(Path::new("target/release"), Path::new("./target/release/deps/a.so")),
            PathBuf::from("deps/a.so")
        );
    }

    #[test]
    fn test_list_directory() {
        let dir = build_output();
        let entries = list_directory(dir.path()).unwrap();
        assert_eq!(
            entries,
            vec!["deps/", "gen_inds", "libgen_inds.rlib", "libgen_inds.so", "other_tool"]
        );
    }
}
