use errata_ports::storage::{SettingsDto, StorageError, StoragePort};
use std::fs;
use std::path::{Path, PathBuf};

pub struct FsStorage {
    settings_path: PathBuf,
}

impl FsStorage {
    /// Settings stored as `settings.json` inside `base_dir`.
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            settings_path: base_dir.join("settings.json"),
        }
    }

    /// Settings stored in an explicit file.
    pub fn with_path(settings_path: PathBuf) -> Self {
        Self { settings_path }
    }

    pub fn default_base_dir() -> Result<PathBuf, StorageError> {
        let base = dirs_next::config_dir()
            .ok_or_else(|| StorageError::Io("config dir not found".to_string()))?;
        Ok(base.join("Errata"))
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
        let data = fs::read(path).map_err(|e| StorageError::Io(format!("{}: {e}", path.display())))?;
        serde_json::from_slice(&data)
            .map_err(|e| StorageError::Serde(format!("{}: {e}", path.display())))
    }

    fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
        let data =
            serde_json::to_vec_pretty(value).map_err(|e| StorageError::Serde(e.to_string()))?;
        write_atomic(path, &data)
    }
}

impl Default for FsStorage {
    fn default() -> Self {
        let base_dir = Self::default_base_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::new(base_dir)
    }
}

impl StoragePort for FsStorage {
    fn load_settings(&self) -> Result<SettingsDto, StorageError> {
        if !self.settings_path.exists() {
            return Ok(SettingsDto::default());
        }
        Self::read_json(&self.settings_path)
    }

    fn save_settings(&self, s: &SettingsDto) -> Result<(), StorageError> {
        Self::write_json(&self.settings_path, s)
    }
}

/// Writes `data` next to `path` under a temporary name, then renames it into
/// place so readers never see a partial file.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    let io_err = |e: std::io::Error| StorageError::Io(format!("{}: {e}", path.display()));

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(io_err)?;

    let file_name = path
        .file_name()
        .ok_or_else(|| StorageError::Io(format!("{}: not a file path", path.display())))?;
    let tmp = parent.join(format!(
        ".{}.tmp-{}",
        file_name.to_string_lossy(),
        std::process::id()
    ));

    fs::write(&tmp, data).map_err(io_err)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(e));
    }
    Ok(())
}
