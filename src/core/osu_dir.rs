use log::{debug, info, warn};
#[cfg(any(windows, test))]
use once_cell::sync::Lazy;
#[cfg(any(windows, test))]
use regex::Regex;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

const OSU_EXECUTABLE: &str = "osu!.exe";
const INSTALL_ROOT_VARS: [&str; 3] = ["LOCALAPPDATA", "ProgramFiles(x86)", "ProgramW6432"];

#[cfg(any(windows, test))]
static QUOTED_EXECUTABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""(.*?osu!\.exe)""#).expect("static regex"));

/// osu! installation discovery. A found directory is cached and re-used for
/// as long as it still exists; failures are retried on the next call.
#[derive(Debug, Default)]
pub struct OsuInstall {
    configured: Option<PathBuf>,
    found: Mutex<Option<PathBuf>>,
}

impl OsuInstall {
    pub fn new(configured: Option<PathBuf>) -> Self {
        Self { configured, found: Mutex::new(None) }
    }

    pub fn directory(&self) -> Option<PathBuf> {
        let mut found = self.found.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(dir) = found.as_ref() {
            if dir.is_dir() {
                return Some(dir.clone());
            }
            warn!("osu! directory '{}' disappeared, searching again", dir.display());
            *found = None;
        }
        let dir = self.probe()?;
        info!("osu! directory: {}", dir.display());
        *found = Some(dir.clone());
        Some(dir)
    }

    /// Configured path, then the running game, then the registered URL
    /// handler, then the usual install roots.
    fn probe(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.configured {
            if dir.is_dir() {
                return Some(dir.clone());
            }
            warn!("Configured osu! directory '{}' does not exist", dir.display());
        }
        if let Some(dir) = from_running_process() {
            debug!("osu! found from its running process");
            return Some(dir);
        }
        if let Some(dir) = from_registry() {
            debug!("osu! found from the registry");
            return Some(dir);
        }
        INSTALL_ROOT_VARS
            .iter()
            .filter_map(|var| env::var_os(var))
            .map(|root| Path::new(&root).join("osu!"))
            .find(|candidate| is_install(candidate))
    }
}

#[inline(always)]
fn is_install(dir: &Path) -> bool {
    dir.join(OSU_EXECUTABLE).is_file()
}

/// `"C:\...\osu!.exe" "%1"` → the quoted executable path.
#[cfg(any(windows, test))]
fn executable_from_command(command: &str) -> Option<PathBuf> {
    QUOTED_EXECUTABLE.captures(command).map(|c| PathBuf::from(&c[1]))
}

/// Directory of `exe`, provided the file is really there.
#[cfg(any(windows, test))]
fn install_of(exe: PathBuf) -> Option<PathBuf> {
    if !exe.is_file() {
        return None;
    }
    exe.parent().map(Path::to_path_buf)
}

#[cfg(windows)]
fn from_running_process() -> Option<PathBuf> {
    crate::core::platform::win32::running_process_path(OSU_EXECUTABLE).and_then(install_of)
}

#[cfg(not(windows))]
fn from_running_process() -> Option<PathBuf> {
    None
}

#[cfg(windows)]
fn from_registry() -> Option<PathBuf> {
    crate::core::platform::win32::osu_open_command()
        .and_then(|command| executable_from_command(&command))
        .and_then(install_of)
}

#[cfg(not(windows))]
fn from_registry() -> Option<PathBuf> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_directory_wins_and_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let install = OsuInstall::new(Some(dir.path().to_path_buf()));
        assert_eq!(install.directory().as_deref(), Some(dir.path()));

        let cached = install.directory();
        assert_eq!(install.directory(), cached, "a found directory is remembered");

        let gone = dir.path().to_path_buf();
        drop(dir);
        assert_ne!(install.directory(), Some(gone), "a vanished directory is not handed out");
    }

    #[test]
    fn registry_command_yields_the_quoted_executable() {
        let command = r#""C:\Games\osu!\osu!.exe" "%1""#;
        assert_eq!(executable_from_command(command), Some(PathBuf::from(r"C:\Games\osu!\osu!.exe")));
        assert_eq!(executable_from_command("notepad.exe %1"), None);
    }

    #[test]
    fn install_of_requires_an_existing_executable() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join(OSU_EXECUTABLE);
        assert_eq!(install_of(exe.clone()), None);
        std::fs::write(&exe, b"").unwrap();
        assert_eq!(install_of(exe).as_deref(), Some(dir.path()));
    }

    #[test]
    fn install_requires_the_executable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_install(dir.path()));
        std::fs::write(dir.path().join(OSU_EXECUTABLE), b"").unwrap();
        assert!(is_install(dir.path()));
    }
}
