pub mod error;
mod handlers;
mod helpers;
mod types;

pub use error::ApiError;
pub use types::AppState;

use actix_web::web;

/// Wires every resource's routes onto the app. Registration order matters
/// for the payments scope, where literal paths shadow `{student_id}`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    handlers::auth::configure(cfg);
    handlers::students::configure(cfg);
    handlers::teachers::configure(cfg);
    handlers::admissions::configure(cfg);
    handlers::results::configure(cfg);
    handlers::payments::configure(cfg);
    handlers::announcements::configure(cfg);
    handlers::catalog::configure(cfg);
}
