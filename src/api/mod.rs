use actix_web::{
    HttpResponse,
    Responder,
};

use std::env;

const DEFAULT_PORT: u16 = 10000;

pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("OK")
}

pub async fn check_version() -> impl Responder {
    HttpResponse::Ok().body(env!("CARGO_PKG_VERSION"))
}

pub fn get_server_port() -> u16 {
    parse_port(env::var("PORT").ok().as_deref())
}

fn parse_port(value: Option<&str>) -> u16 {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(DEFAULT_PORT)
}
