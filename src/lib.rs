//! crud-admin: configuration-driven CRUD admin backend.
//!
//! Entities (persons, cities, customers, products) are declared once in `config/entities.json`
//! and served by one generic service behind `/api/{entity}` with bearer authentication.

pub mod auth;
pub mod bootstrap;
pub mod case;
pub mod config;
pub mod error;
pub mod handlers;
pub mod migration;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;

pub use auth::{PasswordHasher, TokenIssuer};
pub use bootstrap::seed_initial_user;
pub use config::{builtin_config, load_from_path, resolve, FullConfig, ResolvedEntity, ResolvedModel};
pub use error::{AppError, ConfigError, FieldErrors};
pub use migration::{apply_migrations, plan, revert_last, MigrationStep};
pub use routes::{app, auth_routes, common_routes, entity_routes};
pub use service::{CrudService, PageBounds};
pub use settings::{Settings, StoreKind};
pub use state::AppState;
pub use store::{ensure_database_exists, EntityStore, MemoryStore, PgStore, UserStore};
