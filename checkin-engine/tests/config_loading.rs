//! Layered configuration loading
//!
//! Kept in its own test binary because it sets process environment
//! variables.

use checkin_engine::{CheckInConfig, ConfigError};
use std::io::Write;

#[test]
fn test_file_and_environment_layers_override_defaults() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    writeln!(
        file,
        "inactivity_timeout_minutes = 20\nmax_session_minutes = 15\n\n[synthesis_retry]\nmax_attempts = 4"
    )
    .unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let from_file = CheckInConfig::load(Some(&path)).unwrap();
    assert_eq!(from_file.inactivity_timeout_minutes, 20);
    assert_eq!(from_file.max_session_minutes, 15);
    assert_eq!(from_file.synthesis_retry.max_attempts, 4);
    assert_eq!(from_file.sweep_interval_secs, 60);

    std::env::set_var("CHECKIN_SYNTHESIS_RETRY__MAX_ATTEMPTS", "7");
    std::env::set_var("CHECKIN_FINALIZATION_GRACE_SECS", "300");

    let from_env = CheckInConfig::from_env().unwrap();
    assert_eq!(from_env.synthesis_retry.max_attempts, 7);
    assert_eq!(from_env.finalization_grace_secs, 300);
    assert_eq!(from_env.inactivity_timeout_minutes, 30);

    let layered = CheckInConfig::load(Some(&path)).unwrap();
    assert_eq!(layered.synthesis_retry.max_attempts, 7);
    assert_eq!(layered.inactivity_timeout_minutes, 20);

    std::env::set_var("CHECKIN_SYNTHESIS_RETRY__MAX_ATTEMPTS", "0");
    assert!(matches!(
        CheckInConfig::from_env(),
        Err(ConfigError::Invalid(_))
    ));

    std::env::remove_var("CHECKIN_SYNTHESIS_RETRY__MAX_ATTEMPTS");
    std::env::remove_var("CHECKIN_FINALIZATION_GRACE_SECS");
}
