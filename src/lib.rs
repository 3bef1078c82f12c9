//! All-or-nothing replacement of a file's contents.
//!
//! Output is staged in a temporary file next to the target, then renamed over the target in one
//! step. If anything goes wrong before that, the target is left as it was, and the temporary is
//! removed.
//!
//! The replacement is only as atomic as the platform's `rename`. POSIX requires it to be atomic,
//! and the temporary is always in the target's directory, so the rename never crosses a
//! filesystem.

#[cfg(unix)]
extern crate libc;

mod file;
mod staging;
mod write;

pub use file::AtomicFile;
pub use write::write_all;
pub use write::write_data;
pub use write::WriteAllError;
