use std::rc::Rc;
use std::task::{Context, Poll};

use actix_service::{Service, Transform};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::{web, Error, HttpMessage};
use futures::future::{ok, LocalBoxFuture, Ready};
use sqlx::SqlitePool;

use crate::models::session::Session;
use crate::utils::auth::{CurrentUser, SESSION_COOKIE};

/// Resolves the session cookie to a user and stores a [`CurrentUser`] in the
/// request extensions. Requests without a valid session pass through
/// untouched; handlers that need a user reject them via the extractor.
pub struct SessionAuth;

impl<S, B> Transform<S, ServiceRequest> for SessionAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = SessionAuthService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(SessionAuthService {
            service: Rc::new(service),
        })
    }
}

pub struct SessionAuthService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for SessionAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let session_id = req.cookie(SESSION_COOKIE).map(|c| c.value().to_string());
        let pool = req.app_data::<web::Data<SqlitePool>>().cloned();

        Box::pin(async move {
            if let (Some(session_id), Some(pool)) = (session_id, pool) {
                match Session::find_active(pool.get_ref(), &session_id).await {
                    Ok(Some(session)) => {
                        req.extensions_mut().insert(CurrentUser {
                            id: session.user_id,
                            session_id: session.id,
                        });
                    }
                    Ok(None) => log::debug!("ignoring unknown or expired session"),
                    Err(e) => log::error!("session lookup failed: {}", e),
                }
            }
            service.call(req).await
        })
    }
}
