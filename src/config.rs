//! Engine configuration, read from the process environment.

/// Knobs the surrounding process supplies; everything has a default so the
/// demo server runs with nothing but a DATABASE_URL.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub database_url: String,
    /// Prefix for all generated routes, e.g. `/api` -> `POST /api/order`.
    pub route_prefix: String,
    /// Page size used when a list request does not supply `size`.
    pub default_page_size: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            database_url: "postgres://localhost/modelrest".into(),
            route_prefix: "/api".into(),
            default_page_size: 30,
        }
    }
}

impl EngineConfig {
    /// Read from `DATABASE_URL`, `ROUTE_PREFIX`, and `PAGE_SIZE`, falling back
    /// to defaults. Loads a `.env` file when one is present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();
        EngineConfig {
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            route_prefix: std::env::var("ROUTE_PREFIX").unwrap_or(defaults.route_prefix),
            default_page_size: std::env::var("PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&n| n > 0)
                .unwrap_or(defaults.default_page_size),
        }
    }
}
