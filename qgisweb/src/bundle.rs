use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read as _};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::{QwError, QwResult};

/// Result of [`bundle`].
#[derive(Debug)]
pub struct BundleOutcome {
    /// Path of the created zip archive
    pub archive_path: PathBuf,
    /// Set when the bundled source file could not be removed afterwards.
    /// The archive itself is complete in that case.
    pub cleanup_error: Option<String>,
}

/// Sibling path of `path` with the extension replaced by `zip`.
#[must_use]
pub fn bundle_path(path: &Path) -> PathBuf {
    path.with_extension("zip")
}

/// Stores the container at `path` as the only entry of a deflate zip archive next to it,
/// then removes the original file.
///
/// The entry is named after the file. Failing to remove the original is not an error;
/// it is logged and reported in [`BundleOutcome::cleanup_error`].
pub fn bundle(path: &Path) -> QwResult<BundleOutcome> {
    let entry_name = path
        .file_name()
        .ok_or_else(|| QwError::MissingFileName(path.to_path_buf()))?
        .to_string_lossy()
        .to_string();
    let archive_path = bundle_path(path);
    if archive_path == path {
        return Err(QwError::BundleOverwritesSource(archive_path));
    }
    let zip_err = |e| QwError::ZipError(e, archive_path.clone());

    let mut input =
        BufReader::new(File::open(path).map_err(|e| QwError::ReadFailed(e, path.to_path_buf()))?);
    let out = File::create(&archive_path)
        .map_err(|e| QwError::CreateFailed(e, archive_path.clone()))?;

    let mut zip = ZipWriter::new(BufWriter::new(out));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(entry_name.as_str(), options).map_err(zip_err)?;
    io::copy(&mut input, &mut zip).map_err(|e| QwError::WriteFailed(e, archive_path.clone()))?;
    zip.finish()
        .map_err(zip_err)?
        .into_inner()
        .map_err(|e| QwError::WriteFailed(e.into_error(), archive_path.clone()))?;
    drop(input);
    debug!("Bundled {} into {}", path.display(), archive_path.display());

    let cleanup_error = remove_bundled(path, &archive_path);
    Ok(BundleOutcome {
        archive_path,
        cleanup_error,
    })
}

/// Removes a container that was stored in `archive_path`, returning the failure message.
fn remove_bundled(path: &Path, archive_path: &Path) -> Option<String> {
    fs::remove_file(path).err().map(|e| {
        let msg = format!(
            "Unable to remove {} after bundling it into {}: {e}",
            path.display(),
            archive_path.display()
        );
        warn!("{msg}");
        msg
    })
}

/// Reads the single entry of a bundle, returning its name and raw content.
pub fn read_bundle(path: &Path) -> QwResult<(String, Vec<u8>)> {
    let file = File::open(path).map_err(|e| QwError::ReadFailed(e, path.to_path_buf()))?;
    let mut archive =
        ZipArchive::new(BufReader::new(file)).map_err(|e| QwError::ZipError(e, path.to_path_buf()))?;
    if archive.len() != 1 {
        return Err(QwError::UnexpectedBundleLayout(
            path.to_path_buf(),
            archive.len(),
        ));
    }
    let mut entry = archive
        .by_index(0)
        .map_err(|e| QwError::ZipError(e, path.to_path_buf()))?;
    let name = entry.name().to_string();
    let mut content = Vec::new();
    entry
        .read_to_end(&mut content)
        .map_err(|e| QwError::ReadFailed(e, path.to_path_buf()))?;
    Ok((name, content))
}
