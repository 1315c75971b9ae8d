//! # Config Module
//!
//! `config.json`, read from the base directory.
//!
//! ```json
//! {
//!   "workers": 8,
//!   "targets": [
//!     { "name": "home", "target_type": "local",
//!       "collections": ["/srv/photos"], "cameras": ["X-T30"] },
//!     { "name": "nas", "target_type": "ssh", "work_dir": "/srv/photo/",
//!       "ssh_host": "nas.lan", "ssh_user": "photo",
//!       "collections": ["/volume1/photo"] }
//!   ]
//! }
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::thread;

/// File name of the configuration inside the base directory
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Where a target's photos live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// Collections are reachable from this machine
    Local,
    /// Collections live on a peer reached over SSH
    Ssh,
}

/// A photo archive that local photos are matched against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    #[serde(rename = "target_type")]
    pub kind: TargetKind,
    /// Remote directory holding the executable, config and cache
    #[serde(default)]
    pub work_dir: String,
    /// Executable name on the remote; defaults to the running executable's
    #[serde(default)]
    pub ssh_exe: String,
    #[serde(default)]
    pub ssh_host: String,
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
    #[serde(default)]
    pub ssh_user: String,
    #[serde(default = "default_path_separator")]
    pub ssh_path_separator: String,
    /// Directory trees that make up the archive
    #[serde(default)]
    pub collections: Vec<PathBuf>,
    /// Cameras reported by `stats`
    #[serde(default)]
    pub cameras: Vec<String>,
    /// Ignore files whose photos are never reported
    #[serde(default)]
    pub ignore: Vec<PathBuf>,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_path_separator() -> String {
    "/".to_string()
}

impl Target {
    /// A local target over the given collections
    pub fn local(name: impl Into<String>, collections: Vec<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind: TargetKind::Local,
            work_dir: String::new(),
            ssh_exe: String::new(),
            ssh_host: String::new(),
            ssh_port: default_ssh_port(),
            ssh_user: String::new(),
            ssh_path_separator: default_path_separator(),
            collections,
            cameras: Vec::new(),
            ignore: Vec::new(),
        }
    }

    /// An SSH target
    pub fn ssh(
        name: impl Into<String>,
        host: impl Into<String>,
        user: impl Into<String>,
        work_dir: impl Into<String>,
    ) -> Self {
        Self {
            kind: TargetKind::Ssh,
            ssh_host: host.into(),
            ssh_user: user.into(),
            work_dir: work_dir.into(),
            ..Self::local(name, Vec::new())
        }
    }

    /// Join `name` onto the remote work dir using the remote separator
    pub fn remote_path(&self, name: &str) -> String {
        let sep = self.ssh_path_separator.as_str();
        let dir = self.work_dir.trim_end_matches(|c| sep.contains(c));
        if dir.is_empty() && self.work_dir.starts_with(sep) {
            return format!("{}{}", sep, name);
        }
        format!("{}{}{}", dir, sep, name)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidTarget {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name is empty"));
        }
        if self.name.contains(['/', '\\']) || self.name == "." || self.name == ".." {
            return Err(invalid("name must not look like a path"));
        }

        match self.kind {
            TargetKind::Local => {}
            TargetKind::Ssh => {
                if self.ssh_host.is_empty() {
                    return Err(invalid("ssh_host is required for ssh targets"));
                }
                if self.ssh_user.is_empty() {
                    return Err(invalid("ssh_user is required for ssh targets"));
                }
                if self.work_dir.is_empty() {
                    return Err(invalid("work_dir is required for ssh targets"));
                }
                if self.ssh_path_separator.is_empty() {
                    return Err(invalid("ssh_path_separator must not be empty"));
                }
            }
        }
        Ok(())
    }
}

/// Contents of `config.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Analysis workers; 0 uses every available core
    #[serde(default)]
    pub workers: usize,
    #[serde(default)]
    pub targets: Vec<Target>,
}

impl Config {
    /// Read and validate `config.json` from `base_dir`
    pub fn load(base_dir: &Path) -> Result<Self, ConfigError> {
        let path = base_dir.join(CONFIG_FILE_NAME);
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::parse(&path, &content)?;
        tracing::debug!(path = %path.display(), targets = config.targets.len(), "configuration loaded");
        Ok(config)
    }

    fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, target) in self.targets.iter().enumerate() {
            target.validate()?;
            if self.targets[..i].iter().any(|t| t.name == target.name) {
                return Err(ConfigError::InvalidTarget {
                    name: target.name.clone(),
                    reason: "defined more than once".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn target(&self, name: &str) -> Result<&Target, ConfigError> {
        self.targets
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| ConfigError::UnknownTarget {
                name: name.to_string(),
            })
    }

    /// Worker count to use, resolving 0 to the available parallelism
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"{
        "workers": 3,
        "targets": [
            { "name": "home", "target_type": "local",
              "collections": ["/srv/photos", "/srv/more"], "cameras": ["X-T30"] },
            { "name": "nas", "target_type": "ssh", "work_dir": "/srv/photo/",
              "ssh_exe": "photo", "ssh_host": "nas.lan", "ssh_user": "photo",
              "collections": ["/volume1/photo"] }
        ]
    }"#;

    fn write_config(content: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), content).unwrap();
        dir
    }

    #[test]
    fn loads_targets_with_defaults() {
        let dir = write_config(SAMPLE);
        let config = Config::load(dir.path()).unwrap();

        assert_eq!(config.worker_count(), 3);
        let home = config.target("home").unwrap();
        assert_eq!(home.kind, TargetKind::Local);
        assert_eq!(home.collections.len(), 2);

        let nas = config.target("nas").unwrap();
        assert_eq!(nas.kind, TargetKind::Ssh);
        assert_eq!(nas.ssh_port, 22);
        assert_eq!(nas.ssh_path_separator, "/");
    }

    #[test]
    fn unknown_target_is_an_error() {
        let dir = write_config(SAMPLE);
        let config = Config::load(dir.path()).unwrap();
        assert!(matches!(
            config.target("attic"),
            Err(ConfigError::UnknownTarget { .. })
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(Config::load(dir.path()), Err(ConfigError::Read { .. })));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let dir = write_config("{ \"workers\": ");
        assert!(matches!(Config::load(dir.path()), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn unknown_target_type_is_a_parse_error() {
        let dir = write_config(r#"{"targets":[{"name":"x","target_type":"ftp"}]}"#);
        assert!(matches!(Config::load(dir.path()), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn ssh_target_requires_host() {
        let dir = write_config(
            r#"{"targets":[{"name":"nas","target_type":"ssh","work_dir":"/w/","ssh_user":"u"}]}"#,
        );
        assert!(matches!(
            Config::load(dir.path()),
            Err(ConfigError::InvalidTarget { .. })
        ));
    }

    #[test]
    fn path_like_names_are_rejected() {
        let target = Target::local("../evil", vec![]);
        assert!(target.validate().is_err());
        assert!(Target::local("", vec![]).validate().is_err());
        assert!(Target::local("home", vec![]).validate().is_ok());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let config = Config {
            workers: 1,
            targets: vec![Target::local("a", vec![]), Target::local("a", vec![])],
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_workers_uses_available_parallelism() {
        let config = Config::default();
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn remote_path_joins_with_target_separator() {
        let mut target = Target::ssh("nas", "h", "u", "/srv/photo/");
        assert_eq!(target.remote_path("config.json"), "/srv/photo/config.json");

        target.work_dir = "/srv/photo".to_string();
        assert_eq!(target.remote_path("config.json"), "/srv/photo/config.json");

        target.work_dir = "C:\\photo\\".to_string();
        target.ssh_path_separator = "\\".to_string();
        assert_eq!(target.remote_path("nas_cache.json.gz"), "C:\\photo\\nas_cache.json.gz");

        target.work_dir = "/".to_string();
        target.ssh_path_separator = "/".to_string();
        assert_eq!(target.remote_path("photo"), "/photo");
    }
}
