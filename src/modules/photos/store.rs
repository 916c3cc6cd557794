//! Flat directory of uploaded photos.

use std::path::{Path, PathBuf};

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

#[derive(Error, Debug)]
pub enum PhotoError {
    #[error("no file was provided")]
    NoFileProvided,

    #[error("'{0}' does not contain a usable file name")]
    InvalidFilename(String),

    #[error("photo storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug)]
pub struct PhotoStore {
    dir: PathBuf,
}

impl PhotoStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the upload directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> Result<(), PhotoError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Write `bytes` under the sanitized form of `client_filename`, replacing any
    /// file of the same name. Returns the stored name.
    pub async fn save(&self, client_filename: &str, bytes: &[u8]) -> Result<String, PhotoError> {
        if client_filename.is_empty() {
            return Err(PhotoError::NoFileProvided);
        }

        let filename = secure_filename(client_filename);
        if filename.is_empty() {
            return Err(PhotoError::InvalidFilename(client_filename.to_string()));
        }

        tokio::fs::write(self.dir.join(&filename), bytes).await?;
        tracing::info!(%filename, bytes = bytes.len(), "photo saved");
        Ok(filename)
    }

    /// Names of every entry in the upload directory, in enumeration order.
    pub async fn list(&self) -> Result<Vec<String>, PhotoError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }
}

/// Reduce a client-supplied name to a safe, flat file name.
///
/// The name is NFKD-normalized so accented letters keep their base letter, then
/// non-ASCII characters are dropped, path separators become word breaks, words
/// are joined with `_`, anything outside `[A-Za-z0-9_.-]` is removed and
/// leading/trailing `.`/`_` are stripped. The result may be empty.
pub fn secure_filename(name: &str) -> String {
    let ascii: String = name
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");

    joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn secure_filename_strips_traversal() {
        assert_eq!(secure_filename("../../evil.jpg"), "evil.jpg");
        assert_eq!(secure_filename("..\\..\\evil.jpg"), "evil.jpg");
        assert_eq!(secure_filename("/etc/passwd"), "etc_passwd");
    }

    #[test]
    fn secure_filename_cleans_odd_characters() {
        assert_eq!(secure_filename("My cabin 2021.jpg"), "My_cabin_2021.jpg");
        assert_eq!(secure_filename("caf\u{e9} <b>.png"), "cafe_b.png");
        assert_eq!(secure_filename("Cr\u{e8}me br\u{fb}l\u{e9}e.jpg"), "Creme_brulee.jpg");
        assert_eq!(secure_filename("\u{65e5}\u{672c}.jpg"), "jpg");
        assert_eq!(secure_filename(".hidden"), "hidden");
        assert_eq!(secure_filename("../.."), "");
    }

    #[tokio::test]
    async fn save_lands_inside_upload_dir() {
        let temp_dir = TempDir::new().unwrap();
        let uploads = temp_dir.path().join("pics");
        let store = PhotoStore::new(&uploads);
        store.ensure_dir().await.unwrap();

        let name = store.save("../../evil.jpg", b"jpeg").await.unwrap();

        assert_eq!(name, "evil.jpg");
        assert_eq!(std::fs::read(uploads.join("evil.jpg")).unwrap(), b"jpeg");
        assert!(!temp_dir.path().join("evil.jpg").exists());
    }

    #[tokio::test]
    async fn save_overwrites_same_name() {
        let temp_dir = TempDir::new().unwrap();
        let store = PhotoStore::new(temp_dir.path());

        store.save("cat.png", b"first").await.unwrap();
        store.save("./cat.png", b"second").await.unwrap();

        assert_eq!(store.list().await.unwrap(), vec!["cat.png".to_string()]);
        assert_eq!(
            std::fs::read(temp_dir.path().join("cat.png")).unwrap(),
            b"second"
        );
    }

    #[tokio::test]
    async fn save_rejects_missing_and_unusable_names() {
        let temp_dir = TempDir::new().unwrap();
        let store = PhotoStore::new(temp_dir.path());

        assert!(matches!(
            store.save("", b"x").await,
            Err(PhotoError::NoFileProvided)
        ));
        assert!(matches!(
            store.save("../..", b"x").await,
            Err(PhotoError::InvalidFilename(_))
        ));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_returns_every_entry() {
        let temp_dir = TempDir::new().unwrap();
        let store = PhotoStore::new(temp_dir.path());
        store.save("b.jpg", b"b").await.unwrap();
        store.save("a.jpg", b"a").await.unwrap();

        let mut names = store.list().await.unwrap();
        names.sort();
        assert_eq!(names, vec!["a.jpg", "b.jpg"]);
    }
}
