use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::debug;

use crate::{
    config::Config,
    middleware::ApiKeyIdentity,
    models::{CreateLinkDto, LinkListQuery, PatchLinkDto},
    services::{LinkService, LinkServiceTrait},
    types::Result,
};

/// Base for `short_url`: the configured public URL, else the request's own
/// scheme and host
fn public_base_url(req: &HttpRequest) -> String {
    if let Some(base) = req
        .app_data::<web::Data<Config>>()
        .and_then(|config| config.server.public_base_url.clone())
    {
        return base;
    }
    let info = req.connection_info();
    format!("{}://{}", info.scheme(), info.host())
}

/// POST /api/v1/links
pub async fn create_handler(
    req: HttpRequest,
    identity: ApiKeyIdentity,
    dto: web::Json<CreateLinkDto>,
    service: web::Data<LinkService>,
) -> Result<HttpResponse> {
    let base_url = public_base_url(&req);
    let (link, limit) = service
        .create(identity.id, dto.into_inner(), &base_url, Utc::now())
        .await?;

    Ok(HttpResponse::Created()
        .insert_header(("X-RateLimit-Limit", limit.limit.to_string()))
        .insert_header(("X-RateLimit-Remaining", limit.remaining.to_string()))
        .json(link))
}

/// GET /api/v1/links
pub async fn list_handler(
    identity: ApiKeyIdentity,
    query: web::Query<LinkListQuery>,
    service: web::Data<LinkService>,
) -> Result<HttpResponse> {
    let page = service.list(identity.id, query.into_inner()).await?;
    debug!("Listed {} links for key {}", page.items.len(), identity.id);
    Ok(HttpResponse::Ok().json(page))
}

/// GET /api/v1/links/{code}
pub async fn stats_handler(
    identity: ApiKeyIdentity,
    path: web::Path<String>,
    service: web::Data<LinkService>,
) -> Result<HttpResponse> {
    let stats = service.stats(identity.id, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(stats))
}

/// PATCH /api/v1/links/{code}
pub async fn patch_handler(
    identity: ApiKeyIdentity,
    path: web::Path<String>,
    dto: web::Json<PatchLinkDto>,
    service: web::Data<LinkService>,
) -> Result<HttpResponse> {
    let stats = service
        .patch(identity.id, &path.into_inner(), dto.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(stats))
}
