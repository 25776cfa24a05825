use super::*;
use std::collections::HashMap;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn defaults_match_dashboard_behavior() {
    let settings = ClientSettings::default();
    assert_eq!(settings.page_size, 10);
    assert_eq!(settings.search_debounce(), Duration::from_millis(500));
    assert_eq!(settings.unauthorized_policy, UnauthorizedPolicy::Demote);
}

#[test]
fn env_overrides_take_precedence() {
    let mut settings = ClientSettings::default();
    apply_overrides(
        &mut settings,
        lookup_from(&[
            ("API_BASE_URL", "http://generic:1"),
            ("VENDOR_PORTAL__API_BASE_URL", "https://api.example.test"),
            ("VENDOR_PORTAL__PAGE_SIZE", "25"),
            ("VENDOR_PORTAL__UNAUTHORIZED_POLICY", "sign-out"),
        ]),
    );
    assert_eq!(settings.api_base_url, "https://api.example.test");
    assert_eq!(settings.page_size, 25);
    assert_eq!(settings.unauthorized_policy, UnauthorizedPolicy::SignOut);
}

#[test]
fn invalid_values_are_ignored() {
    let mut settings = ClientSettings::default();
    apply_overrides(
        &mut settings,
        lookup_from(&[
            ("VENDOR_PORTAL__PAGE_SIZE", "0"),
            ("VENDOR_PORTAL__REQUEST_TIMEOUT_SECS", "soon"),
            ("VENDOR_PORTAL__UNAUTHORIZED_POLICY", "panic"),
        ]),
    );
    assert_eq!(settings, ClientSettings::default());
}

#[test]
fn reads_settings_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(SETTINGS_FILE);
    fs::write(
        &path,
        r#"
api_base_url = "https://vendors.example.test/api"
page_size = 20
search_debounce_ms = 250
unauthorized_policy = "ignore"
"#,
    )
    .unwrap();

    let settings = load_settings_from(&path);
    assert_eq!(settings.api_base_url, "https://vendors.example.test/api");
    assert_eq!(settings.page_size, 20);
    assert_eq!(settings.search_debounce_ms, 250);
    assert_eq!(settings.unauthorized_policy, UnauthorizedPolicy::Ignore);
    assert_eq!(settings.database_url, ClientSettings::default().database_url);
}

#[test]
fn missing_or_broken_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(
        load_settings_from(&dir.path().join("absent.toml")),
        ClientSettings::default()
    );

    let path = dir.path().join("broken.toml");
    fs::write(&path, "page_size = [").unwrap();
    assert_eq!(load_settings_from(&path), ClientSettings::default());
}
