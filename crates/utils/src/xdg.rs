use pdict_core::APP_DIR_NAME;
use std::env;
use std::path::PathBuf;

/// XDG Base Directory paths for pdict
pub struct XdgPaths;

impl XdgPaths {
    /// Get XDG_CONFIG_HOME/pdict or fallback
    pub fn config_dir() -> PathBuf {
        env::var_os("XDG_CONFIG_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(dirs::config_dir)
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(APP_DIR_NAME)
    }

    /// Get XDG_DATA_HOME/pdict, falling back to the working directory
    pub fn data_dir() -> PathBuf {
        env::var_os("XDG_DATA_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(dirs::data_dir)
            .map(|dir| dir.join(APP_DIR_NAME))
            .or_else(|| env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Get the JSON config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join(pdict_core::CONFIG_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn with_var<F: FnOnce()>(name: &str, value: &str, f: F) {
        let original = env::var_os(name);
        env::set_var(name, value);
        f();
        match original {
            Some(val) => env::set_var(name, val),
            None => env::remove_var(name),
        }
    }

    #[test]
    #[serial]
    fn test_xdg_paths_with_env() {
        with_var("XDG_CONFIG_HOME", "/tmp/config", || {
            assert_eq!(XdgPaths::config_dir(), PathBuf::from("/tmp/config/pdict"));
            assert_eq!(
                XdgPaths::config_file(),
                PathBuf::from("/tmp/config/pdict/config.json")
            );
        });
        with_var("XDG_DATA_HOME", "/tmp/data", || {
            assert_eq!(XdgPaths::data_dir(), PathBuf::from("/tmp/data/pdict"));
        });
    }
}
