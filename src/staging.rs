use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use rand::Rng;

/// How many names to try before giving up on finding a free one.
const NAME_ATTEMPTS: usize = 32768;

/// An open temporary file, and the name it was created under.
pub struct Staged {
    pub file: fs::File,
    pub path: PathBuf,
}

impl Staged {
    /// Create a new, empty, temporary file beside `target`, and set its mode.
    ///
    /// The name is `tmp.<target file name><random hex>`, created exclusively, so neither an
    /// existing file nor a concurrent caller can be handed the same name.
    pub fn create_beside(target: &Path, mode: u32) -> io::Result<Staged> {
        let name = target.file_name().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "target must name a file")
        })?;
        let dir = target.parent().unwrap_or_else(|| Path::new(""));

        let mut rng = ::rand::thread_rng();

        for _ in 0..NAME_ATTEMPTS {
            let path = dir.join(temp_name(name, rng.gen()));

            let file = match open_exclusive(&path) {
                Ok(file) => file,
                Err(ref e) if io::ErrorKind::AlreadyExists == e.kind() => continue,
                Err(e) => return Err(e),
            };

            if let Err(e) = set_mode(&file, mode) {
                drop(file);
                remove_quietly(&path);
                return Err(e);
            }

            return Ok(Staged { file, path });
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "couldn't create temporary file",
        ))
    }

    /// Throw the temporary away. Nothing here is reported; there's nobody left to tell.
    pub fn discard(self) {
        if let Err(e) = close(self.file) {
            tracing::debug!(temp = %self.path.display(), error = %e, "closing discarded temporary");
        }
        remove_quietly(&self.path);
    }
}

fn temp_name(target_name: &std::ffi::OsStr, token: u64) -> OsString {
    let mut name = OsString::from("tmp.");
    name.push(target_name);
    name.push(format!("{:x}", token));
    name
}

fn open_exclusive(path: &Path) -> io::Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    options.open(path)
}

/// Best-effort removal, for cleaning up after some other failure.
pub fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        tracing::warn!(temp = %path.display(), error = %e, "couldn't remove temporary file");
    }
}

#[cfg(unix)]
fn set_mode(file: &fs::File, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(mode))
}

// Only the owner-write bit means anything here.
#[cfg(not(unix))]
fn set_mode(file: &fs::File, mode: u32) -> io::Result<()> {
    let mut permissions = file.metadata()?.permissions();
    permissions.set_readonly(0 == mode & 0o200);
    file.set_permissions(permissions)
}

/// Close the file, reporting any error the OS gives us, which `drop` would swallow.
#[cfg(unix)]
pub fn close(file: fs::File) -> io::Result<()> {
    use std::os::unix::io::IntoRawFd;

    let fd = file.into_raw_fd();
    zero_success(unsafe { libc::close(fd) })
}

#[cfg(not(unix))]
pub fn close(file: fs::File) -> io::Result<()> {
    drop(file);
    Ok(())
}

#[cfg(unix)]
fn zero_success(err: libc::c_int) -> io::Result<()> {
    if 0 == err {
        return Ok(());
    }

    Err(io::Error::last_os_error())
}
