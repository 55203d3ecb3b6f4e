use std::process;
use std::sync::Arc;

use folio::{
    application::{
        error::AppError,
        feed::FeedService,
        repos::{PostsRepo, PostsWriteRepo},
        sitemap::SitemapService,
        sync::SyncService,
        syndication::SyndicationService,
    },
    cache::PostCache,
    config,
    infra::{
        db::SqliteRepositories,
        error::InfraError,
        github::{ContentRepo, GithubContentRepo},
        http::{self, HttpState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Resync(_) => run_resync(settings).await,
    }
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<SqliteRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = SqliteRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    SqliteRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(SqliteRepositories::new(pool)))
}

fn build_content_repo(settings: &config::Settings) -> Result<Arc<dyn ContentRepo>, AppError> {
    if !settings.github.is_configured() {
        return Err(AppError::from(InfraError::configuration(
            "github.owner and github.repo must be configured",
        )));
    }
    Ok(Arc::new(GithubContentRepo::new(&settings.github)))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let content = build_content_repo(&settings)?;
    let webhook_secret = settings
        .webhook
        .secret
        .clone()
        .ok_or_else(|| AppError::from(InfraError::configuration("webhook.secret is not configured")))?;

    let posts: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write: Arc<dyn PostsWriteRepo> = repositories.clone();
    let cache = Arc::new(PostCache::new(settings.cache.capacity));

    let sync = Arc::new(SyncService::new(content.clone(), posts_write, cache.clone()));
    let feed = Arc::new(FeedService::new(
        posts.clone(),
        content.clone(),
        cache,
        settings.sync.resolve_unlisted,
    ));
    let syndication = Arc::new(SyndicationService::new(posts.clone(), settings.site.clone()));
    let sitemap = Arc::new(SitemapService::new(posts.clone(), settings.site.clone()));

    let state = HttpState {
        feed,
        syndication,
        sitemap,
        sync,
        posts,
        webhook_secret,
    };
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(addr = %settings.server.public_addr, "listening");

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn run_resync(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let content = build_content_repo(&settings)?;

    let posts_write: Arc<dyn PostsWriteRepo> = repositories.clone();
    // No read path is running; a disabled cache keeps the wiring uniform.
    let cache = Arc::new(PostCache::new(0));
    let sync = SyncService::new(content, posts_write, cache);

    let count = sync.full_resync().await?;
    info!(posts = count, "resync complete");

    Ok(())
}
