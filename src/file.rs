use std::fmt;
use std::fs;
use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use crate::staging;
use crate::staging::Staged;

/// A file that replaces its target all at once, or not at all.
///
/// Writes go to a temporary file created in the same directory as the target. Nothing happens
/// to the target until [`commit`](AtomicFile::commit), which renames the temporary over it in one
/// step. An observer of the target path sees either the old contents, or the new contents, never
/// a mix.
///
/// [`cancel`](AtomicFile::cancel) throws the temporary away instead. Dropping an `AtomicFile`
/// without committing it also cancels, so an early return or a panic leaves the target alone.
///
/// Once committed or cancelled, the file is finalized: further writes and commits fail.
///
/// The rename is the only durability guarantee: the file is not `fsync()`'d, and the parent
/// directory must already exist.
///
/// # Example
///
/// ```rust
/// # use std::io::Write;
/// # let dir = tempfile::TempDir::new().unwrap();
/// # let path = dir.path().join("example.txt");
/// let mut file = atomicfile::AtomicFile::new(&path, 0o600).unwrap();
/// writeln!(file, "Hello, world!").unwrap();
/// file.commit().unwrap();
/// # assert_eq!("Hello, world!\n", std::fs::read_to_string(&path).unwrap());
/// ```
pub struct AtomicFile {
    target: PathBuf,
    temp: Option<Staged>,
}

impl AtomicFile {
    /// Create an `AtomicFile` which will eventually replace `target`, with the given mode.
    ///
    /// The target does not have to exist, but its directory does. The temporary is created, and
    /// its mode set, immediately; if setting the mode fails, the temporary is removed again.
    ///
    /// On unix, `mode` is applied exactly, ignoring the umask. Elsewhere, only the owner-write
    /// bit is honoured, as the readonly flag.
    pub fn new<P: AsRef<Path>>(target: P, mode: u32) -> io::Result<AtomicFile> {
        let target = target.as_ref().to_path_buf();
        let temp = Staged::create_beside(&target, mode)?;

        tracing::trace!(
            path = %target.display(),
            temp = %temp.path.display(),
            mode = format_args!("{:o}", mode),
            "staging"
        );

        Ok(AtomicFile {
            target,
            temp: Some(temp),
        })
    }

    /// The path which will be replaced on commit.
    pub fn path(&self) -> &Path {
        &self.target
    }

    /// Where the output is being staged, or `None` once finalized.
    pub fn temp_path(&self) -> Option<&Path> {
        self.temp.as_ref().map(|staged| staged.path.as_path())
    }

    /// Has this file been committed or cancelled?
    pub fn is_finalized(&self) -> bool {
        self.temp.is_none()
    }

    /// Close the temporary and rename it over the target.
    ///
    /// The file is finalized whether or not this succeeds. If closing or renaming fails, the
    /// temporary is removed (if possible) and the error returned; the target is untouched, as the
    /// rename either happens completely, or not at all.
    ///
    /// Fails if the file was already finalized.
    pub fn commit(&mut self) -> io::Result<()> {
        let Staged { file, path } = self.temp.take().ok_or_else(finalized)?;

        if let Err(e) = staging::close(file) {
            staging::remove_quietly(&path);
            return Err(e);
        }

        if let Err(e) = fs::rename(&path, &self.target) {
            staging::remove_quietly(&path);
            return Err(e);
        }

        tracing::trace!(path = %self.target.display(), temp = %path.display(), "committed");
        Ok(())
    }

    /// Discard the temporary, leaving the target as it was.
    ///
    /// Errors closing or removing the temporary are ignored. This is a no-op if the file is
    /// already finalized; in particular, it's safe to `cancel()` after a successful `commit()`,
    /// and a file that has since appeared at the old temporary path is not touched.
    pub fn cancel(&mut self) {
        if let Some(staged) = self.temp.take() {
            tracing::trace!(path = %self.target.display(), temp = %staged.path.display(), "cancelled");
            staged.discard();
        }
    }

    fn staged_file(&mut self) -> io::Result<&mut fs::File> {
        self.temp
            .as_mut()
            .map(|staged| &mut staged.file)
            .ok_or_else(finalized)
    }
}

fn finalized() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "file already finalized")
}

/// Writes go straight to the temporary file, unbuffered, in order.
impl io::Write for AtomicFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.staged_file()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.staged_file()?.flush()
    }
}

impl Drop for AtomicFile {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for AtomicFile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AtomicFile")
            .field("target", &self.target)
            .field("temp", &self.temp_path())
            .finish()
    }
}
