use std::{
    future::IntoFuture,
    io::Write,
    process,
    sync::Arc,
};

use ghactivity::{
    application::{
        error::AppError,
        fetch::EventCache,
        pagination::Paginator,
        syndication::{FeedFormat, project},
    },
    cache::MemoryStore,
    config,
    domain::{EventKind, Subject, filter_events},
    infra::{
        error::InfraError,
        github::GithubClient,
        http::{self, HttpState},
        telemetry,
    },
};
use time::OffsetDateTime;
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let hint = match error {
        AppError::Fetch(err) => err.remediation(),
        _ => String::new(),
    };

    if dispatcher::has_been_set() {
        error!(error = %error, hint = %hint, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, hint = %hint, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli().map_err(|err| {
        AppError::from(InfraError::configuration(format!(
            "failed to load configuration: {err}"
        )))
    })?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Feed(args) => run_feed(settings, args).await,
    }
}

fn build_paginator(settings: &config::Settings) -> Result<Paginator, AppError> {
    let options = settings.fetch_options();
    let store = Arc::new(MemoryStore::new(&options.cache));
    let source = Arc::new(GithubClient::new(&settings.upstream)?);
    let cache = EventCache::new(store, source, options);
    Ok(Paginator::new(cache, settings.upstream.max_records))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let state = HttpState {
        paginator: build_paginator(&settings)?,
        feed: settings.feed_options(),
    };
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        addr = %settings.server.addr,
        authenticated = settings.upstream.token.is_some(),
        "listening"
    );

    let shutdown = Arc::new(Notify::new());
    let trigger = shutdown.clone();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            trigger.notify_one();
        })
        .into_future();

    let grace = settings.server.graceful_shutdown;
    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::from(InfraError::from(err)))?;
        }
        _ = async {
            shutdown.notified().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(grace_seconds = grace.as_secs(), "graceful shutdown timed out");
        }
    }

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}

async fn run_feed(settings: config::Settings, args: config::FeedArgs) -> Result<(), AppError> {
    let subject = Subject::parse(&args.subject).map_err(|err| AppError::input(err.to_string()))?;
    let kinds = args
        .types
        .as_deref()
        .map(EventKind::parse_list)
        .unwrap_or_default();
    let format = FeedFormat::from(args.format);

    let paginator = build_paginator(&settings)?;
    let set = paginator.fetch_all(&subject, args.pages).await?;
    if let Some(err) = &set.interrupted {
        warn!(subject = %subject, error = %err, hint = %err.remediation(), "feed is partial");
    }
    info!(
        subject = %subject,
        pages = set.pages_fetched,
        events = set.events.len(),
        cache_status = set.cache_status().as_str(),
        "fetched activity"
    );

    let events = filter_events(set.events, &kinds);
    let document = project(&subject, &events, &settings.feed_options());
    let body = document.render(format, Some(OffsetDateTime::now_utc()));

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(body.as_bytes())
        .and_then(|()| stdout.flush())
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    Ok(())
}
