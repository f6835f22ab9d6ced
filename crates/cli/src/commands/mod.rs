//! CLI subcommands.

pub mod migrate;
pub mod user;

use secrecy::SecretString;

/// Environment variable holding the database connection string.
pub const DATABASE_URL_VAR: &str = "LARDER_DATABASE_URL";

/// Read the database URL, loading `.env` first if present.
fn database_url() -> Option<SecretString> {
    dotenvy::dotenv().ok();
    std::env::var(DATABASE_URL_VAR).ok().map(SecretString::from)
}
