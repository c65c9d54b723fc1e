//! Host platform gate.

use triage_core::config::CollectConfig;
use triage_core::TriageError;

/// Refuse to run off Windows unless the config allows it.
pub fn verify_platform(config: &CollectConfig) -> Result<(), TriageError> {
    if config.require_windows && !cfg!(windows) {
        return Err(TriageError::UnsupportedPlatform(format!(
            "this tool is designed for Windows systems only (running on {})",
            std::env::consts::OS
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_can_be_disabled() {
        let config = CollectConfig {
            require_windows: false,
            ..CollectConfig::default()
        };
        assert!(verify_platform(&config).is_ok());
    }

    #[cfg(not(windows))]
    #[test]
    fn test_non_windows_rejected_by_default() {
        let result = verify_platform(&CollectConfig::default());
        assert!(matches!(result, Err(TriageError::UnsupportedPlatform(_))));
    }

    #[cfg(windows)]
    #[test]
    fn test_windows_accepted() {
        assert!(verify_platform(&CollectConfig::default()).is_ok());
    }
}
