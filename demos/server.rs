//! Demo server: registers two models, binds their CRUD routes, and serves.
//!
//! Expects the backing tables to exist, e.g.:
//!   CREATE TABLE "user" (id bigserial PRIMARY KEY, created_at timestamptz,
//!     updated_at timestamptz, deleted_at timestamptz, user_name text, pass text);
//!   CREATE TABLE "order" (id bigserial PRIMARY KEY, created_at timestamptz,
//!     updated_at timestamptz, deleted_at timestamptz, status text, total numeric);

use axum::Router;
use modelrest::{
    bind_all, common_routes, meta_routes, AppState, BaseFields, EngineConfig, FieldDescriptor,
    FieldKind, ModelDescriptor, RegistryBuilder, Verb, VerbConfig,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("modelrest=info".parse()?))
        .init();

    let config = EngineConfig::from_env();
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    let mut registry = RegistryBuilder::new();
    registry.register(
        ModelDescriptor::builder("User")
            .label("User")
            .embed(BaseFields::audit())
            .field(FieldDescriptor::new("UserName", FieldKind::String).label("User Name"))
            .field(FieldDescriptor::new("Pass", FieldKind::String))
            .build()?,
    );
    registry.register(
        ModelDescriptor::builder("Order")
            .label("Order")
            .embed(BaseFields::audit())
            .field(FieldDescriptor::new("Status", FieldKind::String).label("Status"))
            .field(FieldDescriptor::new("Total", FieldKind::Number).label("Total"))
            .verbs(VerbConfig::default().update(Verb::Method(axum::http::Method::PATCH)))
            .build()?,
    );

    let state = AppState::new(pool, registry.freeze(), config);
    let app = Router::new()
        .merge(common_routes())
        .merge(meta_routes(state.clone()));
    let app = bind_all(app, &state)?;

    let listener = TcpListener::bind("0.0.0.0:3000").await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
