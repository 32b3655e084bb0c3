use config::FixtureConfig;

/// Returns `false` (and says so) when no Docker daemon is reachable.
pub fn docker_or_skip(test: &str) -> bool {
    testkit::init_test_tracing();
    if testkit::docker_available() {
        return true;
    }
    eprintln!("Skipping {}: Docker not available", test);
    false
}

/// Env over `FX_CONFIG_FILE` over defaults.
pub fn fixture_config() -> FixtureConfig {
    config::load_config().expect("fixture configuration")
}
