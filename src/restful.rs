use std::sync::Arc;
use std::time::Duration;

use actix_web::web::{self, Data, PayloadConfig};
use actix_web::{App, HttpRequest, HttpResponse, HttpServer};
use anyhow::{Context, Result};
use log::{info, warn};
use openssl::ssl::SslAcceptorBuilder;
use sd_notify::NotifyState;

use crate::api::Response;
use crate::context::ServerContext;
use crate::handlers::{self, healthz, post, session, user};

pub struct RestfulServer {
    ssl: Option<SslAcceptorBuilder>,
    ctx: Arc<ServerContext>,

    keep_alive_secs: Option<u64>,
    workers: Option<u64>,

    bind: String,

    payload_limit_mib: u64,
}

impl RestfulServer {
    const DEFAULT_PAYLOAD_LIMIT_MIB: u64 = 1;

    pub fn new(bind: String, ctx: Arc<ServerContext>) -> Self {
        Self {
            ssl: None,
            ctx,
            keep_alive_secs: None,
            workers: None,
            bind,
            payload_limit_mib: Self::DEFAULT_PAYLOAD_LIMIT_MIB,
        }
    }

    pub fn set_ssl(&mut self, ssl: SslAcceptorBuilder) {
        self.ssl = Some(ssl);
    }

    pub fn set_keep_alive_secs(&mut self, keep_alive_secs: u64) {
        self.keep_alive_secs = Some(keep_alive_secs);
    }

    pub fn set_workers(&mut self, workers: u64) {
        self.workers = Some(workers);
    }

    pub fn set_payload_limit_mib(&mut self, payload_limit_mib: u64) {
        self.payload_limit_mib = payload_limit_mib;
    }

    pub async fn run(mut self) -> Result<()> {
        let ctx = self.ctx.clone();
        let payload_limit = (self.payload_limit_mib * 1024 * 1024) as usize;
        let mut srv = HttpServer::new(move || {
            App::new()
                .app_data(Data::new(ctx.clone()))
                .app_data(PayloadConfig::new(payload_limit))
                .configure(configure)
        });

        if let Some(ssl) = self.ssl.take() {
            info!("Binding to https://{}", self.bind);
            srv = srv.bind_openssl(&self.bind, ssl).context("bind with ssl")?
        } else {
            warn!("Using HTTP (without SSL). THIS IS DANGEROUS, DO NOT USE IN PRODUCTION");
            info!("Binding to http://{}", self.bind);
            srv = srv.bind(&self.bind).context("bind without ssl")?
        };

        if let Some(keep_alive) = self.keep_alive_secs {
            srv = srv.keep_alive(Duration::from_secs(keep_alive));
        }
        if let Some(workers) = self.workers {
            srv = srv.workers(workers as usize);
        }

        sd_notify::notify(true, &[NotifyState::Ready]).context("notify systemd")?;
        info!("Starting restful server");
        srv.run().await.context("run server")?;

        info!("Server stopped by user");
        Ok(())
    }
}

/// Registers every route of the API. The app must carry a
/// `Data<Arc<ServerContext>>`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/healthz", web::get().to(healthz::get_healthz_handler))
        .route("/register", web::post().to(session::register_handler))
        .route("/login", web::post().to(session::login_handler))
        .route("/logout", web::post().to(session::logout_handler))
        .service(
            web::resource("/users")
                .route(web::get().to(user::list_users_handler))
                .route(web::post().to(user::create_user_handler)),
        )
        .service(
            web::resource("/users/{id}")
                .route(web::get().to(user::get_user_handler))
                .route(web::patch().to(user::patch_user_handler))
                .route(web::delete().to(user::delete_user_handler)),
        )
        .service(
            web::resource("/posts")
                .route(web::get().to(post::list_posts_handler))
                .route(web::post().to(post::create_post_handler)),
        )
        .service(
            web::resource("/posts/{id}")
                .route(web::get().to(post::get_post_handler))
                .route(web::patch().to(post::patch_post_handler))
                .route(web::delete().to(post::delete_post_handler)),
        )
        .default_service(web::route().to(default_handler));
}

async fn default_handler(req: HttpRequest) -> HttpResponse {
    let path = req.uri().path().to_string();
    let method = req.method().as_str().to_string();
    let resp: Response<()> = Response::not_found(format!("No route to {method} {path}"));
    handlers::convert_response(resp)
}
