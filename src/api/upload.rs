//! Uploaded videos as scoped temporary files.

use anyhow::{Context, Result};
use rand::RngCore;
use regex::Regex;
use std::io::Write;
use std::path::Path;
use std::sync::OnceLock;
use tempfile::NamedTempFile;

/// Reduce a client file name to a safe single path component.
///
/// Separators become spaces, whitespace runs become `_`, anything outside
/// `[A-Za-z0-9_.-]` is dropped and leading/trailing dots and underscores are
/// trimmed. The result may be empty.
pub fn secure_filename(name: &str) -> String {
    let name = name.replace(['/', '\\'], " ");
    let joined = name.split_whitespace().collect::<Vec<_>>().join("_");
    static UNSAFE_RE: OnceLock<Regex> = OnceLock::new();
    let re = UNSAFE_RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_.-]").unwrap());
    let cleaned = re.replace_all(&joined, "");
    cleaned.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Write `data` to a uniquely named file in `dir`. The file is removed when
/// the returned handle drops.
pub fn save_upload(dir: &Path, safe_name: &str, data: &[u8]) -> Result<NamedTempFile> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create upload dir {}", dir.display()))?;
    let mut id = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut id);
    let suffix = if safe_name.is_empty() {
        String::new()
    } else {
        format!("_{}", safe_name)
    };
    let mut file = tempfile::Builder::new()
        .prefix(&hex::encode(id))
        .suffix(&suffix)
        .tempfile_in(dir)
        .with_context(|| format!("failed to create upload file in {}", dir.display()))?;
    file.write_all(data).context("failed to write upload")?;
    file.flush().context("failed to flush upload")?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_paths_and_unsafe_characters() {
        assert_eq!(secure_filename("My Video.mp4"), "My_Video.mp4");
        assert_eq!(secure_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(secure_filename("C:\\Users\\kid\\clip.MOV"), "C_Users_kid_clip.MOV");
        assert_eq!(secure_filename("vidéo.mp4"), "vido.mp4");
        assert_eq!(secure_filename("..."), "");
    }

    #[test]
    fn upload_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let file = save_upload(dir.path(), "clip.mp4", b"data").unwrap();
        let path = file.path().to_path_buf();
        assert!(path.starts_with(dir.path()));
        assert!(path.to_string_lossy().ends_with("_clip.mp4"));
        assert_eq!(std::fs::read(&path).unwrap(), b"data");
        drop(file);
        assert!(!path.exists());
    }
}
