//! Config path resolution
//!
//! The config sits beside the injected shared object, whose location is
//! recovered from one of its own code addresses with `dladdr`.

use std::ffi::CStr;
use std::path::PathBuf;

/// Environment variable naming an explicit config path
pub const CONFIG_ENV: &str = "EGLHUD_CONFIG";

pub const CONFIG_FILE_NAME: &str = "eglhud.toml";

/// Directory containing the shared object this code was linked into
pub fn module_dir() -> Option<PathBuf> {
    let mut info: libc::Dl_info = unsafe { std::mem::zeroed() };
    let anchor = module_dir as *const libc::c_void;

    if unsafe { libc::dladdr(anchor, &mut info) } == 0 || info.dli_fname.is_null() {
        return None;
    }

    let fname = unsafe { CStr::from_ptr(info.dli_fname) };
    let path = PathBuf::from(fname.to_string_lossy().into_owned());
    path.parent().map(PathBuf::from)
}

/// Where the config is read from
///
/// `EGLHUD_CONFIG` wins; otherwise `eglhud.toml` next to the module.
pub fn config_path() -> Option<PathBuf> {
    if let Some(explicit) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(explicit));
    }
    module_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_dir_resolves_test_binary() {
        let dir = module_dir().expect("test binary has a path");
        assert!(dir.is_dir());
    }

    #[test]
    fn test_default_file_name() {
        if std::env::var_os(CONFIG_ENV).is_none() {
            let path = config_path().unwrap();
            assert!(path.ends_with(CONFIG_FILE_NAME));
        }
    }
}
