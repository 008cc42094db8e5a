//! Board server: SQLite-backed collections of ordered items over HTTP.
//!
//! ## Module Map
//!
//! | Module   | Responsibility                                          |
//! |----------|---------------------------------------------------------|
//! | `models` | `Item` rows and collection summaries                    |
//! | `db`     | `BoardDb` (rusqlite) and the async `DbHandle` store     |
//! | `api`    | axum routes, request types, `ApiError`                  |
//! | `ws`     | `/ws` event stream and the broadcast helper             |
//! | `server` | `ServerConfig`, router assembly, listener and shutdown  |

pub mod api;
pub mod db;
pub mod models;
pub mod server;
pub mod ws;

pub use db::{BoardDb, DbHandle};
pub use models::{CollectionSummary, Item};
pub use server::{ServerConfig, build_router, build_state, start_server};
