use clap::Parser;
use metrics_monitor::{load_env_file, Config};
use std::fs;

// Single test: the process environment is shared by every test in this binary.
#[test]
fn env_file_fills_unset_variables_only() {
    let dir = std::env::temp_dir().join(format!("metrics-monitor-env-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(".env");
    fs::write(&path, "METRICS_INTERVAL_SECONDS=7\nPORT=9000\n# comment\nDB_NAME=from_file\n").unwrap();

    std::env::set_var("PORT", "8181");
    std::env::remove_var("METRICS_INTERVAL_SECONDS");
    std::env::remove_var("DB_NAME");

    assert!(load_env_file(&path).unwrap());
    let config = Config::try_parse_from(["metrics-monitor"]).unwrap();

    assert_eq!(config.interval_secs, 7);
    assert_eq!(config.db_name, "from_file");
    assert_eq!(config.port, 8181, "existing variables win over the file");

    assert!(!load_env_file(&dir.join("missing.env")).unwrap());

    fs::remove_dir_all(&dir).unwrap();
}
