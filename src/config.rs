use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Medichron";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the application data directory (~/Medichron/ on all platforms)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Medichron")
}

/// Default location of the ledger database
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("medichron.db")
}

/// Default tracing filter when RUST_LOG is unset
pub fn default_log_filter() -> &'static str {
    "medichron=debug,info"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_under_home() {
        let dir = app_data_dir();
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir.ends_with("Medichron"));
    }

    #[test]
    fn db_path_under_app_data() {
        let path = default_db_path();
        assert!(path.starts_with(app_data_dir()));
        assert!(path.ends_with("medichron.db"));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }
}
