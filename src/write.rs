use std::io;
use std::io::Read;
use std::io::Write;
use std::path::Path;

use thiserror::Error;

use crate::AtomicFile;

const COPY_BUF_SIZE: usize = 8 * 1024;

/// Replace `target` with `data`, all at once.
///
/// If creating the temporary or writing to it fails, it is cancelled, and the target is left
/// alone. Commit failures are returned after the temporary has been cleaned up.
///
/// ```rust
/// # let dir = tempfile::TempDir::new().unwrap();
/// # let path = dir.path().join("writedata.txt");
/// atomicfile::write_data(&path, b"99 Luftballons", 0o600).unwrap();
/// assert_eq!("99 Luftballons", std::fs::read_to_string(&path).unwrap());
/// ```
pub fn write_data<P: AsRef<Path>>(target: P, data: &[u8], mode: u32) -> io::Result<()> {
    let mut file = AtomicFile::new(target, mode)?;
    if let Err(e) = file.write_all(data) {
        file.cancel();
        return Err(e);
    }
    file.commit()
}

/// Replace `target` with everything read from `reader`, all at once.
///
/// Returns the number of bytes copied. On failure, the count of bytes that made it into the
/// temporary before the failure is returned along with the error, in a [`WriteAllError`]. If
/// reading or writing fails, the temporary is cancelled before returning.
///
/// ```rust
/// # let dir = tempfile::TempDir::new().unwrap();
/// # let path = dir.path().join("writeall.txt");
/// let copied = atomicfile::write_all(&path, &b"I knew you were trouble"[..], 0o640).unwrap();
/// assert_eq!(23, copied);
/// ```
pub fn write_all<P: AsRef<Path>, R: Read>(
    target: P,
    mut reader: R,
    mode: u32,
) -> Result<u64, WriteAllError> {
    let mut file = AtomicFile::new(target, mode).map_err(|error| WriteAllError {
        written: 0,
        error,
    })?;

    let mut written = 0u64;
    if let Err(error) = copy(&mut reader, &mut file, &mut written) {
        file.cancel();
        return Err(WriteAllError { written, error });
    }

    file.commit()
        .map_err(|error| WriteAllError { written, error })?;

    Ok(written)
}

/// Like `io::copy`, but keeps the running total somewhere the caller can see it after a failure.
fn copy<R: Read, W: Write>(reader: &mut R, writer: &mut W, written: &mut u64) -> io::Result<()> {
    let mut buf = [0u8; COPY_BUF_SIZE];
    loop {
        let len = match reader.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(len) => len,
            Err(ref e) if io::ErrorKind::Interrupted == e.kind() => continue,
            Err(e) => return Err(e),
        };

        let mut chunk = &buf[..len];
        while !chunk.is_empty() {
            match writer.write(chunk) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write whole buffer",
                    ))
                }
                Ok(n) => {
                    *written += n as u64;
                    chunk = &chunk[n..];
                }
                Err(ref e) if io::ErrorKind::Interrupted == e.kind() => {}
                Err(e) => return Err(e),
            }
        }
    }
}

/// Error returned when [`write_all`] fails.
#[derive(Debug, Error)]
#[error("{error} (after writing {written} bytes)")]
pub struct WriteAllError {
    /// How many bytes reached the temporary file before the failure.
    pub written: u64,
    /// The underlying IO error.
    pub error: io::Error,
}

impl From<WriteAllError> for io::Error {
    fn from(e: WriteAllError) -> Self {
        e.error
    }
}
