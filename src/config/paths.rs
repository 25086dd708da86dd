//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings + phrase book):
//!   Windows: %APPDATA%\aligned-reader\
//!   macOS:   ~/Library/Application Support/aligned-reader/
//!   Linux:   ~/.config/aligned-reader/
//!
//! Data dir (stored passages and audio):
//!   Windows: %LOCALAPPDATA%\aligned-reader\passages\
//!   macOS:   ~/Library/Application Support/aligned-reader/passages/
//!   Linux:   ~/.local/share/aligned-reader/passages/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml` and `phrases.json`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Full path to `phrases.json`.
    pub phrases_file: PathBuf,
    /// Default directory for passage records and their audio.
    pub passages_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "aligned-reader";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let phrases_file = config_dir.join("phrases.json");
        let passages_dir = data_dir.join("passages");

        Self {
            config_dir,
            settings_file,
            phrases_file,
            passages_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
