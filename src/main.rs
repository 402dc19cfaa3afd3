mod config;
mod routes;
mod store;
mod structures;
mod uptime;
mod watchdog;

use std::path::PathBuf;

use actix_web::{middleware::Logger, web, App, HttpServer};
use clap::Parser;
use log::{info, warn};
use reqwest::Client;

use crate::{
    config::Config, store::Store, structures::errors::UptimersError, watchdog::Watchdog,
};

#[cfg(all(target_env = "musl", target_pointer_width = "64"))]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// path to the status database, created if missing
    #[arg(default_value = "uptime.db")]
    db_path: PathBuf,

    /// port for the web ui and api
    #[arg(long, env, default_value_t = 80)]
    port: u16,

    /// address to bind to
    #[arg(long, env, default_value = "0.0.0.0")]
    bind: String,

    /// optional yaml file with seed sites and polling settings
    #[arg(long, env)]
    config_path: Option<PathBuf>,
}

#[actix_web::main]
async fn main() -> Result<(), UptimersError> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let args = Args::parse();
    info!("Started with args: {:?}", args);

    let config = match &args.config_path {
        Some(path) => {
            info!("Reading config from {}", path.display());
            Config::from_path(path)?
        }
        None => Config::default(),
    };

    let store = Store::open(&args.db_path)?;
    info!("Opened DB {}", args.db_path.display());

    for site in &config.sites {
        if let Err(e) = store.register_site(site) {
            warn!("Skipping configured site {}: {}", site, e);
        }
    }

    let watchdog = Watchdog::new(store.clone(), Client::new(), config.watchdog());
    actix_web::rt::spawn(watchdog.run());

    info!("Server listening on {}:{}", args.bind, args.port);
    Ok(HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::new(store.clone()))
            .configure(routes::configure)
    })
    .bind((args.bind.as_str(), args.port))?
    .run()
    .await?)
}
