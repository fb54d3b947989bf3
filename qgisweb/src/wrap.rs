use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read as _, Write as _};
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use base64::write::EncoderWriter;
use log::debug;
use serde::Deserialize as _;
use serde::de::IgnoredAny;

use crate::{Container, QwError, QwResult, read_bundle};

/// Replaces the plain JSON document at `path` with its base64 encoding.
///
/// The document is first parsed (without being materialized) to make sure it is
/// well-formed. The encoded text is streamed into a sibling temporary file which then
/// replaces the original, so decoding the result gives back the exact original bytes.
pub fn wrap_document(path: &Path) -> QwResult<()> {
    validate_document(path)?;

    let tmp = temp_sibling(path)?;
    if let Err(e) = encode_into(path, &tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        QwError::WriteFailed(e, path.to_path_buf())
    })?;
    debug!("Encoded container {}", path.display());
    Ok(())
}

fn validate_document(path: &Path) -> QwResult<()> {
    let file = File::open(path).map_err(|e| QwError::ReadFailed(e, path.to_path_buf()))?;
    let mut de = serde_json::Deserializer::from_reader(BufReader::new(file));
    IgnoredAny::deserialize(&mut de)
        .and_then(|_| de.end())
        .map_err(|e| QwError::InvalidDocument(e, path.to_path_buf()))
}

fn encode_into(src: &Path, dst: &Path) -> QwResult<()> {
    let mut input = File::open(src).map_err(|e| QwError::ReadFailed(e, src.to_path_buf()))?;
    let out = File::create(dst).map_err(|e| QwError::CreateFailed(e, dst.to_path_buf()))?;
    let write_err = |e| QwError::WriteFailed(e, dst.to_path_buf());

    let mut encoder = EncoderWriter::new(BufWriter::new(out), &STANDARD);
    io::copy(&mut input, &mut encoder).map_err(write_err)?;
    let mut out = encoder.finish().map_err(write_err)?;
    out.flush().map_err(write_err)?;
    out.get_ref().sync_all().map_err(write_err)
}

fn temp_sibling(path: &Path) -> QwResult<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| QwError::MissingFileName(path.to_path_buf()))?;
    let mut tmp = OsString::from(".");
    tmp.push(name);
    tmp.push(".tmp");
    Ok(path.with_file_name(tmp))
}

/// Decodes the base64 text of a container into the plain JSON document bytes.
///
/// Surrounding whitespace, such as a trailing newline added by an editor, is ignored.
pub fn decode_document(encoded: &[u8]) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(encoded.trim_ascii())
}

/// Reads the plain JSON document bytes of a container file.
///
/// Files with a `zip` extension are treated as bundles and their single entry is read.
pub fn read_document(path: &Path) -> QwResult<Vec<u8>> {
    let encoded = if is_bundle(path) {
        read_bundle(path)?.1
    } else {
        let mut buf = Vec::new();
        File::open(path)
            .and_then(|mut f| f.read_to_end(&mut buf))
            .map_err(|e| QwError::ReadFailed(e, path.to_path_buf()))?;
        buf
    };
    decode_document(&encoded).map_err(|e| QwError::InvalidEncoding(e, path.to_path_buf()))
}

/// Reads and parses a container file, either plain or bundled.
pub fn read_container(path: &Path) -> QwResult<Container> {
    let document = read_document(path)?;
    serde_json::from_slice(&document).map_err(|e| QwError::InvalidDocument(e, path.to_path_buf()))
}

pub(crate) fn is_bundle(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}
