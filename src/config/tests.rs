use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.public_addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_are_sensible() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.public_addr.port(), DEFAULT_PORT);
    assert_eq!(settings.database.max_connections.get(), 8);
    assert_eq!(settings.github.api_base.as_str(), DEFAULT_GITHUB_API_BASE);
    assert!(!settings.github.is_configured());
    assert!(settings.webhook.secret.is_none());
    assert_eq!(settings.cache.capacity, DEFAULT_CACHE_CAPACITY);
    assert!(settings.sync.resolve_unlisted);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_port_is_rejected() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(0);

    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "server.port",
            ..
        })
    ));
}

#[test]
fn base_urls_gain_a_trailing_slash() {
    let mut raw = RawSettings::default();
    raw.github.api_base = Some("https://github.example.com/api/v3".to_string());
    raw.site.url = Some("https://example.com".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(
        settings.github.api_base.as_str(),
        "https://github.example.com/api/v3/"
    );
    assert_eq!(settings.site.public_url.as_str(), "https://example.com/");
}

#[test]
fn blank_secrets_read_as_absent() {
    let mut raw = RawSettings::default();
    raw.webhook.secret = Some("   ".to_string());
    raw.github.token = Some(String::new());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.webhook.secret.is_none());
    assert!(settings.github.token.is_none());
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["folio"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_resync_arguments() {
    let args = CliArgs::parse_from(["folio", "resync", "--database-url", "sqlite://folio.db"]);

    match args.command.expect("resync command") {
        Command::Resync(resync) => {
            assert_eq!(
                resync.database.database_url.as_deref(),
                Some("sqlite://folio.db")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}
