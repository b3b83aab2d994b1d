use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        common: CommonOverrides {
            log_level: Some("debug".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_resolve_without_any_source() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.to_string(), "127.0.0.1:3000");
    assert_eq!(settings.server.graceful_shutdown, Duration::from_secs(30));
    assert_eq!(settings.upstream.base_url, "https://api.github.com");
    assert!(settings.upstream.token.is_none());
    assert_eq!(settings.upstream.per_page, 100);
    assert_eq!(settings.upstream.max_records, 300);
    assert_eq!(settings.cache.body_ttl_seconds, 300);
    assert_eq!(settings.cache.token_ttl_seconds, 1800);
    assert_eq!(settings.feed.site_url, "https://ghactivity.com");
    assert_eq!(settings.poll.min_interval_seconds, 15);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = CommonOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_common_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn blank_token_is_treated_as_absent() {
    let mut raw = RawSettings::default();
    raw.upstream.token = Some("   ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.upstream.token.is_none());
}

#[test]
fn per_page_outside_range_is_rejected() {
    for value in [0, 101] {
        let mut raw = RawSettings::default();
        raw.upstream.per_page = Some(value);
        let err = Settings::from_raw(raw).expect_err("per_page must be bounded");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "upstream.per_page",
                ..
            }
        ));
    }
}

#[test]
fn token_ttl_shorter_than_body_ttl_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.body_ttl_seconds = Some(600);
    raw.cache.token_ttl_seconds = Some(300);
    let err = Settings::from_raw(raw).expect_err("token ttl must cover body ttl");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.token_ttl_seconds",
            ..
        }
    ));
}

#[test]
fn unbounded_cache_ttl_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.token_ttl_seconds = Some(u64::MAX);
    let err = Settings::from_raw(raw).expect_err("ttl must be bounded");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.token_ttl_seconds",
            ..
        }
    ));
}

#[test]
fn non_http_base_url_is_rejected() {
    let mut raw = RawSettings::default();
    raw.upstream.base_url = Some("ftp://example.com".to_string());
    let err = Settings::from_raw(raw).expect_err("scheme must be http(s)");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "upstream.base_url",
            ..
        }
    ));
}

#[test]
fn poll_default_below_minimum_is_rejected() {
    let mut raw = RawSettings::default();
    raw.poll.min_interval_seconds = Some(30);
    raw.poll.default_interval_seconds = Some(10);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn site_url_trailing_slash_is_trimmed() {
    let mut raw = RawSettings::default();
    let overrides = CommonOverrides {
        feed_site_url: Some("https://feeds.example.com/".to_string()),
        ..Default::default()
    };
    raw.apply_common_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.feed_options().site_url, "https://feeds.example.com");
}

#[test]
fn fetch_options_carry_upstream_and_poll_settings() {
    let mut raw = RawSettings::default();
    raw.upstream.per_page = Some(50);
    raw.upstream.timeout_seconds = Some(3);
    raw.poll.min_interval_seconds = Some(20);
    let settings = Settings::from_raw(raw).expect("valid settings");

    let options = settings.fetch_options();
    assert_eq!(options.per_page, 50);
    assert_eq!(options.timeout, Duration::from_secs(3));
    assert_eq!(options.poll.min_seconds, 20);
    assert_eq!(options.cache.body_ttl_seconds, 300);
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["ghactivity"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "ghactivity",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--upstream-token",
        "secret",
        "--log-json",
        "yes",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.common.upstream_token.as_deref(),
                Some("secret")
            );
            assert_eq!(serve.overrides.common.log_json, Some(true));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_feed_arguments() {
    let args = CliArgs::parse_from([
        "ghactivity",
        "feed",
        "octocat",
        "--format",
        "atom",
        "--pages",
        "3",
        "--type",
        "PushEvent,IssuesEvent",
    ]);

    match args.command.expect("feed command") {
        Command::Feed(feed) => {
            assert_eq!(feed.subject, "octocat");
            assert_eq!(feed.format, FeedFormatArg::Atom);
            assert_eq!(FeedFormat::from(feed.format), FeedFormat::Atom);
            assert_eq!(feed.pages, 3);
            assert_eq!(feed.types.as_deref(), Some("PushEvent,IssuesEvent"));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn feed_rejects_zero_pages() {
    let result = CliArgs::try_parse_from(["ghactivity", "feed", "octocat", "--pages", "0"]);
    assert!(result.is_err());
}
