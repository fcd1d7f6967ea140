use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};

/// Stores references to all the paths relevant to islandbar, and abstracts access to these files and directories
#[derive(Debug, Clone)]
pub struct BarPaths {
    pub ipc_socket_file: PathBuf,
    pub config_dir: PathBuf,
}

impl BarPaths {
    /// The config directory doesn't need to exist; without it the defaults are used.
    pub fn from_config_dir<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref();
        if config_dir.is_file() {
            bail!("Please provide the path to the config directory, not a file within it")
        }
        let config_dir = if config_dir.exists() { config_dir.canonicalize()? } else { config_dir.to_path_buf() };

        let mut hasher = DefaultHasher::new();
        format!("{}", config_dir.display()).hash(&mut hasher);
        // daemon_id is a hash of the config dir path to ensure that, given a normal XDG_RUNTIME_DIR,
        // the absolute path to the socket stays under the 108 bytes limit. (see man 7 unix)
        let daemon_id = format!("{:x}", hasher.finish());

        let ipc_socket_file = std::env::var("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
            .join(format!("islandbar-server_{}", daemon_id));

        // 100 as the limit isn't quite 108 everywhere (i.e 104 on BSD or mac)
        if format!("{}", ipc_socket_file.display()).len() > 100 {
            log::warn!("The IPC socket file's absolute path exceeds 100 bytes, the socket may fail to create.");
        }

        Ok(BarPaths { config_dir, ipc_socket_file })
    }

    pub fn default() -> Result<Self> {
        let config_home = match std::env::var("XDG_CONFIG_HOME") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => PathBuf::from(std::env::var("HOME").context("Neither XDG_CONFIG_HOME nor HOME is set")?).join(".config"),
        };
        Self::from_config_dir(config_home.join("islandbar"))
    }

    pub fn get_ipc_socket_file(&self) -> &Path {
        self.ipc_socket_file.as_path()
    }

    pub fn get_config_file(&self) -> PathBuf {
        self.config_dir.join("islandbar.toml")
    }
}

impl std::fmt::Display for BarPaths {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "config-dir: {}, ipc-socket: {}", self.config_dir.display(), self.ipc_socket_file.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_depends_on_config_dir() {
        let a = BarPaths::from_config_dir("/nonexistent/a").unwrap();
        let b = BarPaths::from_config_dir("/nonexistent/b").unwrap();
        assert_ne!(a.get_ipc_socket_file(), b.get_ipc_socket_file());
        assert_eq!(a.get_ipc_socket_file(), BarPaths::from_config_dir("/nonexistent/a").unwrap().get_ipc_socket_file());
        assert_eq!(a.get_config_file(), PathBuf::from("/nonexistent/a/islandbar.toml"));
    }
}
