//! Layer archive extraction.

use std::io::{self, Cursor, Read};
use std::path::Path;

use copyfs_common::{CopyFsError, CopyFsResult};
use flate2::read::GzDecoder;

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xb5, 0x2f, 0xfd];

/// Extract a layer archive into `dest`.
///
/// The stream is a tar archive, optionally gzip or zstd compressed (detected
/// from its first bytes). Entries overwrite whatever already exists at the
/// same path, in archive order. Permission bits and modification times come
/// from the entry headers; header ownership is applied only when running as
/// root. Extended attributes recorded in the archive are not restored.
///
/// # Errors
///
/// Returns [`CopyFsError::Extract`] if the stream cannot be decoded or an
/// entry cannot be written.
pub fn extract(archive: impl Read, dest: &Path) -> CopyFsResult<()> {
    let extract_error = |source: io::Error| CopyFsError::Extract {
        path: dest.to_path_buf(),
        source,
    };

    let mut archive = archive;
    let mut magic = Vec::with_capacity(ZSTD_MAGIC.len());
    archive
        .by_ref()
        .take(ZSTD_MAGIC.len() as u64)
        .read_to_end(&mut magic)
        .map_err(extract_error)?;
    let is_gzip = magic.starts_with(GZIP_MAGIC);
    let is_zstd = magic.starts_with(ZSTD_MAGIC);
    let stream = Cursor::new(magic).chain(archive);

    let result = if is_gzip {
        tracing::debug!(dest = %dest.display(), "Extracting gzip layer");
        unpack(GzDecoder::new(stream), dest)
    } else if is_zstd {
        tracing::debug!(dest = %dest.display(), "Extracting zstd layer");
        let decoder = zstd::stream::read::Decoder::new(stream).map_err(extract_error)?;
        unpack(decoder, dest)
    } else {
        tracing::debug!(dest = %dest.display(), "Extracting tar layer");
        unpack(stream, dest)
    };
    result.map_err(extract_error)
}

fn unpack(reader: impl Read, dest: &Path) -> io::Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_preserve_mtime(true);
    archive.set_preserve_ownerships(rustix::process::geteuid().is_root());
    archive.set_overwrite(true);
    archive.unpack(dest)
}
