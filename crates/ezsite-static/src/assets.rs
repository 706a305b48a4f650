//! Asset copying and precompression.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// zstd level used for precompressed files.
const ZSTD_LEVEL: i32 = 19;

/// Extensions worth shipping a compressed sibling for.
const COMPRESSIBLE: &[&str] = &[
    "html", "css", "js", "mjs", "json", "svg", "xml", "txt", "wasm",
];

/// Asset pipeline utilities.
pub struct AssetPipeline;

impl AssetPipeline {
    /// Copy a file, creating parent directories as needed.
    pub fn copy(source: &Path, dest: &Path) -> io::Result<u64> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source, dest)
    }

    /// Whether a file gets a `.zst` sibling when precompressing.
    pub fn is_compressible(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| COMPRESSIBLE.contains(&ext.to_ascii_lowercase().as_str()))
    }

    /// Write `<file>.zst` next to every compressible file under `dir`.
    ///
    /// Returns the paths of the compressed files written.
    pub fn precompress(dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut written = Vec::new();

        let mut files = Vec::new();
        for entry in WalkDir::new(dir) {
            let entry = entry?;
            if entry.file_type().is_file() && Self::is_compressible(entry.path()) {
                files.push(entry.into_path());
            }
        }

        for path in files {
            let data = fs::read(&path)?;
            let compressed = zstd::encode_all(data.as_slice(), ZSTD_LEVEL)?;

            let mut target = path.clone().into_os_string();
            target.push(".zst");
            let target = PathBuf::from(target);

            fs::write(&target, compressed)?;
            tracing::debug!("Compressed {}", path.display());
            written.push(target);
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn detects_compressible_files() {
        assert!(AssetPipeline::is_compressible(Path::new("index.html")));
        assert!(AssetPipeline::is_compressible(Path::new("app.CSS")));
        assert!(!AssetPipeline::is_compressible(Path::new("logo.png")));
        assert!(!AssetPipeline::is_compressible(Path::new("README")));
    }

    #[test]
    fn precompresses_text_files() {
        let temp = tempdir().unwrap();
        let html = "<p>hello</p>".repeat(100);
        fs::create_dir_all(temp.path().join("docs")).unwrap();
        fs::write(temp.path().join("docs/index.html"), &html).unwrap();
        fs::write(temp.path().join("logo.png"), [0u8; 16]).unwrap();

        let written = AssetPipeline::precompress(temp.path()).unwrap();

        assert_eq!(written, vec![temp.path().join("docs/index.html.zst")]);
        let decoded = zstd::decode_all(fs::read(&written[0]).unwrap().as_slice()).unwrap();
        assert_eq!(decoded, html.as_bytes());
        assert!(!temp.path().join("logo.png.zst").exists());
    }

    #[test]
    fn copies_into_new_directories() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("a.txt");
        fs::write(&source, "hi").unwrap();

        let dest = temp.path().join("out/nested/a.txt");
        AssetPipeline::copy(&source, &dest).unwrap();

        assert_eq!(fs::read_to_string(dest).unwrap(), "hi");
    }
}
