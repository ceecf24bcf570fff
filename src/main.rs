use std::process;

use log::error;

mod app;
mod config;
mod context;
mod db;
mod errors;
mod handlers;
mod middleware;
mod models;
mod repositories;
mod routes;
mod services;
mod supervisor;
#[cfg(test)]
mod test_support;
mod types;
mod utils;
mod validations;

use errors::AppError;

#[actix_web::main]
async fn main() {
    if let Err(err) = app::server().await {
        match &err {
            // The logger may not be up yet
            AppError::Config(_) | AppError::Logger(_) => eprintln!("Critical error: {}", err),
            _ => error!("Critical error: {}", err),
        }
        process::exit(err.exit_code());
    }
}
