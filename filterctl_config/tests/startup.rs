use filterctl_config::{load_toml, ConfigError, StartupConfig};

#[test]
fn empty_config_uses_defaults() {
    let config = load_toml("").expect("parse empty config");
    assert_eq!(config, StartupConfig::default());
    assert_eq!(config.thresholds.high2, 2);
    assert_eq!(config.positions.in_beam, [0; 4]);
}

#[test]
fn full_config_parses() {
    let config = load_toml(
        r#"
        mode = 1
        timeout = 1.5

        [positions]
        in = [100, 200, 300, 400]
        out = [0, 0, 0, -50]

        [thresholds]
        high2 = 10
        low1 = 0
    "#,
    )
    .expect("parse config");

    assert_eq!(config.mode, Some(1));
    assert_eq!(config.timeout, Some(1.5));
    assert_eq!(config.positions.in_beam, [100, 200, 300, 400]);
    assert_eq!(config.positions.out_beam, [0, 0, 0, -50]);
    assert_eq!(config.thresholds.high2, 10);
    assert_eq!(config.thresholds.low1, 0);
    // Unset bins keep their defaults.
    assert_eq!(config.thresholds.high3, 2);
}

#[test]
fn out_of_range_mode_is_rejected() {
    assert!(matches!(load_toml("mode = 7"), Err(ConfigError::Invalid(_))));
}

#[test]
fn negative_timeout_is_rejected() {
    assert!(matches!(
        load_toml("timeout = -1.0"),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn unknown_keys_are_rejected() {
    assert!(matches!(
        load_toml("banana = 1"),
        Err(ConfigError::Toml(_))
    ));
    assert!(matches!(
        load_toml("[positions]\nsideways = [1, 2, 3, 4]"),
        Err(ConfigError::Toml(_))
    ));
}

#[test]
fn wrong_arity_positions_are_rejected() {
    assert!(load_toml("[positions]\nin = [1, 2, 3]").is_err());
}
