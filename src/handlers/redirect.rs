use actix_web::{http::header::LOCATION, web, HttpRequest, HttpResponse};
use chrono::Utc;

use crate::{services::RedirectService, types::Result};

const UNKNOWN_CLIENT: &str = "unknown";

/// Rate-limit identity for anonymous visitors: the peer IP address
fn client_identity(req: &HttpRequest) -> String {
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn temporary_redirect(target: String) -> HttpResponse {
    HttpResponse::TemporaryRedirect()
        .insert_header((LOCATION, target))
        .finish()
}

/// GET /{code}: counts the click and redirects
pub async fn redirect_handler(
    req: HttpRequest,
    path: web::Path<String>,
    service: web::Data<RedirectService>,
) -> Result<HttpResponse> {
    let code = path.into_inner();
    let target = service
        .handle_redirect(&code, Utc::now(), &client_identity(&req))
        .await?;
    Ok(temporary_redirect(target))
}

/// HEAD /{code}: same answer as GET, nothing counted
pub async fn probe_handler(
    path: web::Path<String>,
    service: web::Data<RedirectService>,
) -> Result<HttpResponse> {
    let code = path.into_inner();
    let target = service.probe(&code, Utc::now()).await?;
    Ok(temporary_redirect(target))
}
