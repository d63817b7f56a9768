use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use diesel::prelude::*;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use forgeboard::auth::{jwt::JwtService, password};
use forgeboard::config::AppConfig;
use forgeboard::db::{self, SqlitePool};
use forgeboard::models::{NewUser, Role, STATUS_APPROVED};
use forgeboard::routes;
use forgeboard::state::AppState;
use forgeboard::storage::LocalBlobStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        database_url = %config.database_url,
        pool_size = config.database_max_pool_size,
        server_host = %config.server_host,
        server_port = config.server_port,
        upload_dir = %config.upload_dir,
        "loaded configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    db::run_migrations(&pool)?;
    bootstrap_admin(&pool, &config)?;

    let storage = Arc::new(LocalBlobStore::new(&config.upload_dir)?);
    let jwt = JwtService::from_config(&config)?;

    let state = AppState::new(pool, config, storage, jwt);
    let listen_addr: SocketAddr = {
        let config = state.config.clone();
        format!("{}:{}", config.server_host, config.server_port).parse()?
    };
    let router = routes::create_router(state);

    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!("listening on {}", listen_addr);

    axum::serve(listener, router).await?;
    Ok(())
}

/// Seeds one approved Admin account from the environment when the users
/// table is empty, so a fresh deployment has someone able to approve
/// registrations.
fn bootstrap_admin(pool: &SqlitePool, config: &AppConfig) -> anyhow::Result<()> {
    use forgeboard::schema::users;

    let (Some(admin_id), Some(admin_password)) = (
        config.bootstrap_admin_id.as_deref(),
        config.bootstrap_admin_password.as_deref(),
    ) else {
        return Ok(());
    };

    let mut conn = pool.get()?;
    let existing: i64 = users::table.count().get_result(&mut conn)?;
    if existing > 0 {
        return Ok(());
    }

    let admin = NewUser {
        id: admin_id.to_owned(),
        password_hash: password::hash_password(admin_password)?,
        fullname: "Administrator".to_owned(),
        department: String::new(),
        section: String::new(),
        role: Role::Admin.as_str().to_owned(),
        status: STATUS_APPROVED.to_owned(),
        created_at: Utc::now().naive_utc(),
    };
    diesel::insert_into(users::table)
        .values(&admin)
        .execute(&mut conn)?;
    tracing::info!(admin_id, "bootstrapped admin account");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
