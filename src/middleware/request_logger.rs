use std::rc::Rc;
use std::time::Instant;

use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::Error;
use futures_util::future::{ok, LocalBoxFuture, Ready};
use log::{debug, info, warn};

/// Logs one line per request with status and latency. Redirects are the hot
/// path, so successful requests log at debug unless `verbose` is set.
pub struct RequestLogger {
    verbose: bool,
}

impl RequestLogger {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RequestLoggerMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RequestLoggerMiddleware {
            service: Rc::new(service),
            verbose: self.verbose,
        })
    }
}

pub struct RequestLoggerMiddleware<S> {
    service: Rc<S>,
    verbose: bool,
}

impl<S, B> Service<ServiceRequest> for RequestLoggerMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let verbose = self.verbose;
        let method = req.method().clone();
        let path = req.path().to_owned();
        let started = Instant::now();
        debug!("{} {} started", method, path);

        Box::pin(async move {
            let res = service.call(req).await?;
            let status = res.status();
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

            if status.is_server_error() {
                warn!("{} {} -> {} in {:.2}ms", method, path, status.as_u16(), elapsed_ms);
            } else if verbose {
                info!("{} {} -> {} in {:.2}ms", method, path, status.as_u16(), elapsed_ms);
            } else {
                debug!("{} {} -> {} in {:.2}ms", method, path, status.as_u16(), elapsed_ms);
            }

            Ok(res)
        })
    }
}
