//! Directory holding media uploaded by the operator.

use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct UploadDir {
    base: PathBuf,
}

impl UploadDir {
    /// Opens `base`, creating it if needed.
    pub async fn open(base: impl Into<PathBuf>) -> std::io::Result<Self> {
        let base = base.into();
        tokio::fs::create_dir_all(&base).await?;
        Ok(Self { base })
    }

    /// Stores `bytes` under a fresh `<uuid><extension>` name, keeping only
    /// the extension of `original_name`. Returns the identifier and the path
    /// of the new file.
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> std::io::Result<(Uuid, PathBuf)> {
        let id = Uuid::new_v4();
        let mut file_name = id.to_string();
        if let Some(ext) = Path::new(original_name).extension() {
            file_name.push('.');
            file_name.push_str(&ext.to_string_lossy());
        }

        let path = self.base.join(file_name);
        tokio::fs::write(&path, bytes).await?;
        info!(path = %path.display(), size = bytes.len(), "File uploaded");
        Ok((id, path))
    }
}
