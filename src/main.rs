use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use schoold::{api, db};
use std::path::Path;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let db_path = std::env::var("SCHOOL_DB").unwrap_or_else(|_| "school.db".to_string());
    let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| "school".to_string());

    let conn = db::open_db(Path::new(&db_path))?;
    let state = web::Data::new(api::AppState::new(conn, jwt_secret));

    log::info!("listening on 0.0.0.0:{port} (database: {db_path})");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Cors::permissive())
            .wrap(Logger::new("%r %s"))
            .configure(api::configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await?;

    Ok(())
}
