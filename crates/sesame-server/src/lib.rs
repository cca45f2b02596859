//! # sesame-server
//!
//! axum routes over the Sesame auth layer:
//!
//! | Route | Guard |
//! |-------|-------|
//! | `POST /auth/exchange` | none |
//! | `POST /auth/refresh?rotate=bool` | none |
//! | `POST /auth/logout` | authenticated |
//! | `GET /auth/me` | authenticated |
//! | `POST /admin/users/{id}/roles/{role}` | `admin` |
//! | `DELETE /admin/users/{id}/roles/{role}` | `admin` |
//! | `GET /demo/pro-only` | `pro` |
//! | `GET /demo/admin-only` | `admin` |
//! | `GET /healthz` | none |

pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::{AppConfig, ServerConfig, load_config};
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
