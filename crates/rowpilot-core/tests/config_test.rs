use rowpilot_core::RowpilotConfig;
use rowpilot_core::selector::is_semantic_with;

#[test]
fn test_partial_config_uses_defaults() {
    let yaml = r#"
execution:
  action_timeout_ms: 2500
selectors:
  max_length: 12
  framework_prefixes: ["acme-"]
"#;
    let config: RowpilotConfig = serde_yaml::from_str(yaml).unwrap();

    assert_eq!(config.execution.action_timeout_ms, 2500);
    assert!(config.execution.stop_on_error);
    assert!(!config.execution.self_heal);
    assert_eq!(config.selectors.min_length, 2);
    assert_eq!(config.selectors.max_widening_depth, 3);
    assert_eq!(config.selectors.text_tags, vec!["button", "a"]);
    assert!(!config.browser.visible);

    assert!(!is_semantic_with("acme-button", &config.selectors));
    assert!(is_semantic_with("ember-card", &config.selectors));
    assert!(!is_semantic_with("navigation-menu", &config.selectors));
}

#[test]
fn test_empty_config_is_default() {
    let config: RowpilotConfig = serde_yaml::from_str("{}").unwrap();
    assert_eq!(config.execution.action_timeout_ms, 5000);
    assert_eq!(config.execution.pick_timeout_ms, 60_000);
    assert_eq!(config.selectors.testing_attributes[0], "data-testid");
}

#[test]
fn test_self_heal_forces_visible_browser() {
    let mut config: RowpilotConfig =
        serde_yaml::from_str("execution:\n  self_heal: true\n").unwrap();
    assert!(config.ensure_pickable());
    assert!(config.browser.visible);
    assert!(!config.ensure_pickable());

    let mut headless = RowpilotConfig::default();
    assert!(!headless.ensure_pickable());
    assert!(!headless.browser.visible);
}
