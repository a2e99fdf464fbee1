//! # Configuration Module
//!
//! Store settings, layered from lowest to highest priority:
//! - built-in defaults
//! - `config/default.toml`, then `config/{RUN_ENV}.toml`
//! - `APP__` environment variables (`APP__SQL__MAX_OPEN_CONNS=50`)
//! - `DATABASE_URL` / `DATABASE_DRIVER`
//!
//! A `.env` file is read first through dotenvy.
//!
//! ```rust,ignore
//! use chat_store::config::Settings;
//!
//! let settings = Settings::load()?;
//! let store = SqlStore::open(&settings.sql).await?;
//! ```

mod settings;

pub use settings::*;
