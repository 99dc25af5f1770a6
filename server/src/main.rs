//! crud-admin server: settings, store, migrations, first-user seed, then serve.
//!
//! `STORE=memory cargo run -p crud-admin-server` runs without PostgreSQL.

use crud_admin::{
    app, apply_migrations, builtin_config, ensure_database_exists, load_from_path, plan, resolve,
    seed_initial_user, AppState, EntityStore, MemoryStore, PasswordHasher, PgStore, Settings, StoreKind,
    TokenIssuer, UserStore,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("crud_admin=info,tower_http=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let config = match &settings.entity_config_path {
        Some(path) => load_from_path(path).await?,
        None => builtin_config()?,
    };
    let model = Arc::new(resolve(&config)?);

    let (store, users): (Arc<dyn EntityStore>, Arc<dyn UserStore>) = match settings.store {
        StoreKind::Postgres => {
            ensure_database_exists(&settings.database_url).await?;
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(settings.db_max_connections)
                .connect(&settings.database_url)
                .await?;
            let applied = apply_migrations(&pool, &plan(&model)).await?;
            tracing::info!(count = applied.len(), "migrations up to date");
            let pg = Arc::new(PgStore::new(pool));
            (pg.clone() as Arc<dyn EntityStore>, pg as Arc<dyn UserStore>)
        }
        StoreKind::Memory => {
            tracing::warn!("STORE=memory: data is lost on exit");
            let mem = Arc::new(MemoryStore::new());
            (mem.clone() as Arc<dyn EntityStore>, mem as Arc<dyn UserStore>)
        }
    };

    let hasher = PasswordHasher::new();
    seed_initial_user(users.as_ref(), &hasher, &settings).await?;

    let state = AppState {
        store,
        users,
        model,
        tokens: TokenIssuer::new(
            settings.jwt_secret.as_bytes(),
            settings.jwt_issuer.clone(),
            chrono::Duration::seconds(settings.token_lifetime_secs),
        ),
        hasher,
        bounds: settings.page_bounds,
    };

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("crud-admin listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app(state)).await?;
    Ok(())
}
