use futures::{Stream, TryStreamExt};
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

use crate::{
    errors::{AppError, Result},
    models::ImageUpload,
};

/// Reads a reference image from disk, guessing its MIME type from the extension.
pub async fn load_image(path: &Path) -> Result<ImageUpload> {
    let data = tokio::fs::read(path).await?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| AppError::Validation(format!("Invalid file name: {}", path.display())))?
        .to_string();
    let content_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();

    Ok(ImageUpload::new(filename, content_type, data))
}

/// Joins `filename` under `dir`, refusing anything that would escape it.
pub fn download_path(dir: &Path, filename: &str) -> Result<PathBuf> {
    let candidate = Path::new(filename);
    let mut components = candidate.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(dir.join(candidate)),
        _ => Err(AppError::Validation(format!(
            "Refusing to write download outside {}: {}",
            dir.display(),
            filename
        ))),
    }
}

pub async fn ensure_directory_exists(file_path: &Path) -> Result<()> {
    if let Some(parent) = file_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

/// Streams a body into `file_path`, returning the number of bytes written.
pub async fn save_stream<S, B, E>(file_path: &Path, stream: S) -> Result<u64>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: tokio_util::bytes::Buf,
    E: std::error::Error + Send + Sync + 'static,
{
    ensure_directory_exists(file_path).await?;

    let mut reader = StreamReader::new(
        stream.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
    );
    let mut file = tokio::fs::File::create(file_path).await?;
    let written = tokio::io::copy(&mut reader, &mut file).await?;
    file.flush().await?;

    Ok(written)
}
