use heistline::config::Config;

#[tokio::test]
async fn default_file_round_trips() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.toml");
    let path = path.to_str().unwrap();
    Config::create_default(path).await.unwrap();

    let config = Config::load(path).await.unwrap();
    assert_eq!(config.server.clock_interval_secs, 30);
    assert_eq!(config.game.rob_cooldown_ms, 60_000);
    assert_eq!(config.notifications.debounce_ms, 5_000);
    let names: Vec<&str> = config.game.locations.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["London", "Paris", "New York", "Dubai", "Tokyo"]);
}

#[tokio::test]
async fn broken_world_is_rejected_on_load() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.toml");
    let mut config = Config::default();
    config.game.locations[1].name = config.game.locations[0].name.clone();
    std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

    let err = Config::load(path.to_str().unwrap()).await.unwrap_err();
    assert!(err.to_string().contains("duplicate location"), "{err}");
}
