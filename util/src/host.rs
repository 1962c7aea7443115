//! Host platform (linux for example) utility functions

use uname;

/// Retrieve uname information.
pub fn get_uname() -> std::io::Result<uname::Info> {
    uname::uname()
}

/// Format the uname information as a single line, `sysname release (machine)`.
pub fn describe(info: &uname::Info) -> String {
    format!("{} {} ({})", info.sysname, info.release, info.machine)
}
