use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Credex";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "credex=info,warn"
}

/// Get the application data directory.
/// `CREDEX_DATA_DIR` if set, else the platform data dir (e.g.
/// ~/.local/share/credex), else ./credex-data.
pub fn app_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("CREDEX_DATA_DIR").filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .map(|d| d.join("credex"))
        .unwrap_or_else(|| PathBuf::from("credex-data"))
}

/// Where accepted uploads are kept, one file per document id.
pub fn uploads_dir() -> PathBuf {
    app_data_dir().join("uploads")
}

/// Where extraction records are persisted.
pub fn records_dir() -> PathBuf {
    app_data_dir().join("records")
}
