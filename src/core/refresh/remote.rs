//! Rebuilds an SSH target's cache on the peer that holds its photos.
//!
//! ## Steps
//! 1. Create the remote work dir
//! 2. Upload `config.json` and the executable, make it executable
//! 3. Run `localupdate <target>` remotely
//! 4. `cat` the remote cache and store it locally
//!
//! Every step is blocking and any failure aborts the rebuild.

use super::Rebuild;
use crate::config::{Target, CONFIG_FILE_NAME};
use crate::core::cache::{cache_file_name, CacheStore};
use crate::error::{RemoteError, Result};
use crate::events::EventSender;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, info};

/// Runs commands on, and copies files to, a remote target
pub trait RemoteTransport: Send + Sync {
    /// Run a shell command remotely and return its stdout
    fn run_remote_command(&self, target: &Target, command: &str) -> std::result::Result<Vec<u8>, RemoteError>;

    /// Copy a local file to a remote path
    fn copy_file(&self, target: &Target, local: &Path, remote: &str) -> std::result::Result<(), RemoteError>;
}

/// Transport driving the system `ssh` and `scp` binaries
///
/// Runs in batch mode, so key-based authentication must already work.
#[derive(Debug, Clone)]
pub struct SshTransport {
    ssh_program: String,
    scp_program: String,
}

impl SshTransport {
    pub fn new() -> Self {
        Self {
            ssh_program: "ssh".to_string(),
            scp_program: "scp".to_string(),
        }
    }

    pub fn with_programs(ssh_program: impl Into<String>, scp_program: impl Into<String>) -> Self {
        Self {
            ssh_program: ssh_program.into(),
            scp_program: scp_program.into(),
        }
    }

    fn destination(target: &Target) -> String {
        format!("{}@{}", target.ssh_user, target.ssh_host)
    }

    fn output(program: &str, command: &mut Command) -> std::result::Result<Output, RemoteError> {
        command.output().map_err(|source| RemoteError::Spawn {
            program: program.to_string(),
            source,
        })
    }
}

impl Default for SshTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteTransport for SshTransport {
    fn run_remote_command(&self, target: &Target, command: &str) -> std::result::Result<Vec<u8>, RemoteError> {
        debug!(target = %target.name, command, "ssh");
        let output = Self::output(
            &self.ssh_program,
            Command::new(&self.ssh_program)
                .arg("-p")
                .arg(target.ssh_port.to_string())
                .args(["-o", "BatchMode=yes"])
                .arg(Self::destination(target))
                .arg(command),
        )?;

        if !output.status.success() {
            return Err(RemoteError::CommandFailed {
                target: target.name.clone(),
                command: command.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    fn copy_file(&self, target: &Target, local: &Path, remote: &str) -> std::result::Result<(), RemoteError> {
        debug!(target = %target.name, local = %local.display(), remote, "scp");
        let output = Self::output(
            &self.scp_program,
            Command::new(&self.scp_program)
                .arg("-P")
                .arg(target.ssh_port.to_string())
                .args(["-o", "BatchMode=yes", "-q"])
                .arg(local)
                .arg(format!("{}:{}", Self::destination(target), remote)),
        )?;

        if !output.status.success() {
            return Err(RemoteError::CopyFailed {
                target: target.name.clone(),
                local: local.to_path_buf(),
                remote: remote.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Delegates a rebuild to the remote peer
pub struct RemoteRebuilder {
    transport: Box<dyn RemoteTransport>,
    base_dir: PathBuf,
    running_exe: Option<PathBuf>,
}

impl RemoteRebuilder {
    /// `base_dir` holds `config.json` and, when a target sets `ssh_exe`,
    /// the executable built for the peer
    pub fn new(transport: Box<dyn RemoteTransport>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            transport,
            base_dir: base_dir.into(),
            running_exe: None,
        }
    }

    /// Executable uploaded when a target does not set `ssh_exe`
    pub fn with_running_exe(mut self, exe: impl Into<PathBuf>) -> Self {
        self.running_exe = Some(exe.into());
        self
    }

    /// Local file to upload and the name it gets on the peer
    fn executable(&self, target: &Target) -> std::result::Result<(PathBuf, String), RemoteError> {
        let missing = |reason: String| RemoteError::MissingLocalFile {
            target: target.name.clone(),
            what: "executable",
            reason,
        };

        if !target.ssh_exe.is_empty() {
            let local = self.base_dir.join(&target.ssh_exe);
            if !local.is_file() {
                return Err(missing(format!("{} does not exist", local.display())));
            }
            return Ok((local, target.ssh_exe.clone()));
        }

        let local = match &self.running_exe {
            Some(exe) => exe.clone(),
            None => std::env::current_exe().map_err(|e| missing(e.to_string()))?,
        };
        let name = local
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| missing(format!("{} has no file name", local.display())))?;
        Ok((local, name))
    }

    fn run(&self, target: &Target, command: &str) -> std::result::Result<Vec<u8>, RemoteError> {
        self.transport.run_remote_command(target, command)
    }
}

impl Rebuild for RemoteRebuilder {
    fn rebuild(&self, target: &Target, store: &CacheStore, _events: &EventSender) -> Result<()> {
        let local_config = self.base_dir.join(CONFIG_FILE_NAME);
        if !local_config.is_file() {
            return Err(RemoteError::MissingLocalFile {
                target: target.name.clone(),
                what: "configuration",
                reason: format!("{} does not exist", local_config.display()),
            }
            .into());
        }
        let (local_exe, exe_name) = self.executable(target)?;

        let remote_config = target.remote_path(CONFIG_FILE_NAME);
        let remote_exe = target.remote_path(&exe_name);
        let remote_cache = target.remote_path(&cache_file_name(&target.name));

        info!(target = %target.name, host = %target.ssh_host, "preparing remote work dir");
        self.run(target, &format!("mkdir -p {}", shell_quote(&target.work_dir)))?;
        self.transport.copy_file(target, &local_config, &remote_config)?;
        self.transport.copy_file(target, &local_exe, &remote_exe)?;
        self.run(target, &format!("chmod +x {}", shell_quote(&remote_exe)))?;

        info!(target = %target.name, "running remote update");
        self.run(
            target,
            &format!(
                "{} --base-dir {} localupdate {}",
                shell_quote(&remote_exe),
                shell_quote(&target.work_dir),
                shell_quote(&target.name)
            ),
        )?;

        let bytes = self.run(target, &format!("cat {}", shell_quote(&remote_cache)))?;
        store.store_raw(&target.name, &bytes)?;
        info!(target = %target.name, bytes = bytes.len(), "remote cache retrieved");
        Ok(())
    }
}

/// Quote a string for a POSIX shell
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::{write_snapshot, CacheSnapshot};
    use crate::error::{CacheError, PhotoCacheError};
    use crate::events::null_sender;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records every call and answers `cat` with a prepared cache
    #[derive(Default)]
    struct FakeTransport {
        log: Mutex<Vec<String>>,
        cache_bytes: Vec<u8>,
        fail_on: Option<&'static str>,
    }

    impl FakeTransport {
        fn calls(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    impl RemoteTransport for FakeTransport {
        fn run_remote_command(&self, target: &Target, command: &str) -> std::result::Result<Vec<u8>, RemoteError> {
            self.log.lock().unwrap().push(format!("run {}", command));
            if self.fail_on.is_some_and(|p| command.starts_with(p)) {
                return Err(RemoteError::CommandFailed {
                    target: target.name.clone(),
                    command: command.to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "boom".to_string(),
                });
            }
            if command.starts_with("cat ") {
                return Ok(self.cache_bytes.clone());
            }
            Ok(Vec::new())
        }

        fn copy_file(&self, _: &Target, local: &Path, remote: &str) -> std::result::Result<(), RemoteError> {
            let name = local.file_name().unwrap().to_string_lossy();
            self.log.lock().unwrap().push(format!("copy {} {}", name, remote));
            Ok(())
        }
    }

    /// Transport shared with the test through an Arc
    struct Shared(std::sync::Arc<FakeTransport>);

    impl RemoteTransport for Shared {
        fn run_remote_command(&self, target: &Target, command: &str) -> std::result::Result<Vec<u8>, RemoteError> {
            self.0.run_remote_command(target, command)
        }

        fn copy_file(&self, target: &Target, local: &Path, remote: &str) -> std::result::Result<(), RemoteError> {
            self.0.copy_file(target, local, remote)
        }
    }

    fn remote_cache_bytes() -> Vec<u8> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nas_cache.json.gz");
        write_snapshot(&CacheSnapshot::new("nas", 1_700_000_000), &path).unwrap();
        std::fs::read(path).unwrap()
    }

    fn base_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("photo"), b"\x7fELF").unwrap();
        dir
    }

    fn target() -> Target {
        let mut target = Target::ssh("nas", "nas.lan", "photo", "/srv/photo/");
        target.ssh_exe = "photo".to_string();
        target
    }

    #[test]
    fn runs_steps_in_order_and_stores_cache() {
        let base = base_dir();
        let transport = std::sync::Arc::new(FakeTransport {
            cache_bytes: remote_cache_bytes(),
            ..FakeTransport::default()
        });
        let rebuilder = RemoteRebuilder::new(Box::new(Shared(transport.clone())), base.path());
        let store = CacheStore::new(base.path());

        rebuilder.rebuild(&target(), &store, &null_sender()).unwrap();

        assert_eq!(
            transport.calls(),
            vec![
                "run mkdir -p '/srv/photo/'",
                "copy config.json /srv/photo/config.json",
                "copy photo /srv/photo/photo",
                "run chmod +x '/srv/photo/photo'",
                "run '/srv/photo/photo' --base-dir '/srv/photo/' localupdate 'nas'",
                "run cat '/srv/photo/nas_cache.json.gz'",
            ]
        );
        let snapshot = store.load("nas").unwrap();
        assert_eq!(snapshot.built_at, 1_700_000_000);
    }

    #[test]
    fn remote_command_failure_aborts() {
        let base = base_dir();
        let transport = std::sync::Arc::new(FakeTransport {
            cache_bytes: remote_cache_bytes(),
            fail_on: Some("chmod"),
            ..FakeTransport::default()
        });
        let rebuilder = RemoteRebuilder::new(Box::new(Shared(transport.clone())), base.path());
        let store = CacheStore::new(base.path());

        let result = rebuilder.rebuild(&target(), &store, &null_sender());

        assert!(matches!(result, Err(PhotoCacheError::Remote(_))));
        assert!(transport.calls().iter().all(|c| !c.contains("localupdate")));
        assert!(!store.path_for("nas").exists());
    }

    #[test]
    fn invalid_remote_cache_keeps_previous_file() {
        let base = base_dir();
        let store = CacheStore::new(base.path());
        let previous = CacheSnapshot::new("nas", 42);
        store.save(&previous).unwrap();

        let transport = FakeTransport {
            cache_bytes: b"cat: No such file or directory".to_vec(),
            ..FakeTransport::default()
        };
        let rebuilder = RemoteRebuilder::new(Box::new(transport), base.path());

        let result = rebuilder.rebuild(&target(), &store, &null_sender());

        assert!(matches!(
            result,
            Err(PhotoCacheError::Cache(CacheError::Corrupted { .. }))
        ));
        assert_eq!(store.load("nas").unwrap(), previous);
    }

    #[test]
    fn missing_config_is_reported() {
        let base = TempDir::new().unwrap();
        let rebuilder = RemoteRebuilder::new(Box::new(FakeTransport::default()), base.path());

        let result = rebuilder.rebuild(&target(), &CacheStore::new(base.path()), &null_sender());

        assert!(matches!(
            result,
            Err(PhotoCacheError::Remote(RemoteError::MissingLocalFile { what: "configuration", .. }))
        ));
    }

    #[test]
    fn running_exe_is_uploaded_when_no_ssh_exe() {
        let base = base_dir();
        let exe = base.path().join("photo-cli");
        std::fs::write(&exe, b"bin").unwrap();
        let transport = std::sync::Arc::new(FakeTransport {
            cache_bytes: remote_cache_bytes(),
            ..FakeTransport::default()
        });
        let rebuilder = RemoteRebuilder::new(Box::new(Shared(transport.clone())), base.path())
            .with_running_exe(&exe);

        let mut target = target();
        target.ssh_exe.clear();
        rebuilder
            .rebuild(&target, &CacheStore::new(base.path()), &null_sender())
            .unwrap();

        assert!(transport
            .calls()
            .contains(&"copy photo-cli /srv/photo/photo-cli".to_string()));
    }

    #[test]
    fn quoting_escapes_single_quotes() {
        assert_eq!(shell_quote("/srv/it's here"), r"'/srv/it'\''s here'");
    }
}
