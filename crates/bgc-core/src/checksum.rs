//! Checksums for HMM database files.

use std::io::Read;
use std::path::Path;

use crate::error::Result;

/// Compute the hex MD5 digest of a file.
pub fn file_md5(path: impl AsRef<Path>) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    reader_md5(&mut file)
}

/// Compute the hex MD5 digest of any readable source.
pub fn reader_md5<R: Read>(reader: &mut R) -> Result<String> {
    let mut context = md5::Context::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        context.consume(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", context.compute()))
}
