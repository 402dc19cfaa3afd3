use actix_web::{get, post, web, HttpResponse};
use askama::Template;
use log::info;
use serde::Deserialize;

use crate::{
    store::Store,
    structures::{errors::UptimersError, model::SiteStatus},
    uptime,
};

mod filters {
    use std::borrow::Borrow;

    use time::{macros::format_description, OffsetDateTime, UtcOffset};

    /// Whole-second UTC time in RFC 3339 form.
    pub fn timestamp<T: Borrow<OffsetDateTime>>(at: T) -> askama::Result<String> {
        at.borrow()
            .to_offset(UtcOffset::UTC)
            .format(format_description!(
                "[year]-[month]-[day]T[hour]:[minute]:[second]Z"
            ))
            .map_err(|e| askama::Error::Custom(Box::new(e)))
    }
}

#[derive(Debug, Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    sites: Vec<SiteStatus>,
}

#[derive(Debug, Deserialize)]
pub struct SiteQuery {
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    key: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(index_handler)
        .service(get_sites_handler)
        .service(post_site_handler);
}

#[get("/")]
pub async fn index_handler(store: web::Data<Store>) -> Result<HttpResponse, UptimersError> {
    let store = store.into_inner();
    let sites = web::block(move || uptime::list_site_statuses(&store)).await??;
    let index = IndexTemplate { sites };
    Ok(HttpResponse::Ok()
        .content_type("text/html")
        .body(index.render()?))
}

#[get("/api/sites")]
pub async fn get_sites_handler(
    store: web::Data<Store>,
    query: web::Query<SiteQuery>,
) -> Result<HttpResponse, UptimersError> {
    let store = store.into_inner();
    match query.into_inner().key {
        Some(key) => {
            let detail = web::block(move || uptime::get_site_detail(&store, &key)).await??;
            Ok(HttpResponse::Ok().json(detail))
        }
        None => {
            let sites = web::block(move || uptime::list_site_statuses(&store)).await??;
            Ok(HttpResponse::Ok().json(sites))
        }
    }
}

#[post("/api/sites")]
pub async fn post_site_handler(
    store: web::Data<Store>,
    form: web::Form<RegisterForm>,
) -> Result<HttpResponse, UptimersError> {
    let key = form
        .into_inner()
        .key
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| UptimersError::Validation("missing key".to_string()))?;
    let store = store.into_inner();
    let registered = key.clone();
    let created = web::block(move || store.register_site(&registered)).await??;

    let body = match created {
        true => format!("Added {}", key),
        false => {
            info!("{} is already watched", key);
            format!("Already watching {}", key)
        }
    };
    Ok(HttpResponse::Ok().content_type("text/plain").body(body))
}
