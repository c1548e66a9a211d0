//! HTTP surface of the service

use std::time::Instant;

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::middleware::Next;
use actix_web::{HttpRequest, HttpResponse, Responder, ResponseError, get, web};
use deploycat_model::AppRequest;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::error;

use crate::cluster::Cluster;
use crate::orchestrator::Orchestrator;
use crate::rules::{self, RuleMap};
use crate::{Error, Result};

const USER_HEADER: &str = "user";

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            Error::Validation(err) => HttpResponse::BadRequest().json(json!({
                "status": "error",
                "message": err.to_string(),
                "map": err.map(),
            })),
            Error::NotFound { .. } => {
                HttpResponse::NotFound().json(json!({"status": "app not found"}))
            }
            other => {
                error!(error = %other, "request failed");
                HttpResponse::InternalServerError().json(json!({"status": "error"}))
            }
        }
    }
}

#[derive(Deserialize)]
struct UserHeader {
    user: String,
}

/// Liveness probe
#[get("/health")]
pub async fn health(_: HttpRequest) -> impl Responder {
    HttpResponse::Ok().json("healthy")
}

/// Adds an `X-Response-Time` header with the handling time in milliseconds
///
/// # Errors
/// Propagates the errors of the wrapped service.
pub async fn response_time(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> std::result::Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    let start = Instant::now();
    let mut res = next.call(req).await?;
    let elapsed = format!("{}ms", start.elapsed().as_millis());
    if let Ok(value) = HeaderValue::from_str(&elapsed) {
        res.headers_mut()
            .insert(HeaderName::from_static("x-response-time"), value);
    }
    Ok(res)
}

/// Registers the App routes under `/api/v1`; the orchestrator must be
/// provided as `web::Data<Orchestrator<C>>`.
pub fn configure<C: Cluster + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/apps", web::get().to(list_apps::<C>))
            .service(
                web::resource("/app/{name}")
                    .route(web::get().to(get_app::<C>))
                    .route(web::post().to(create_app::<C>))
                    .route(web::delete().to(delete_app::<C>)),
            ),
    );
}

async fn list_apps<C: Cluster>(
    orchestrator: web::Data<Orchestrator<C>>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user = req
        .headers()
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok());
    let header: UserHeader = RuleMap::new()
        .field(USER_HEADER, rules::user())
        .parse(json!({ "user": user }))?;

    let apps = orchestrator.list_by_user(&header.user).await?;
    Ok(HttpResponse::Ok().json(json!({ "apps": apps })))
}

/// Names the create rules would reject can never exist in the cluster
fn valid_name(name: &str) -> bool {
    RuleMap::new()
        .field("name", rules::name())
        .errors(&json!({ "name": name }))
        .is_empty()
}

async fn get_app<C: Cluster>(
    orchestrator: web::Data<Orchestrator<C>>,
    name: web::Path<String>,
) -> Result<HttpResponse> {
    let name = name.into_inner();
    if !valid_name(&name) {
        return Err(Error::NotFound {
            kind: "App".into(),
            name,
        });
    }
    let app = orchestrator.get(&name).await?;
    Ok(HttpResponse::Ok().json(json!({ "app": app })))
}

async fn create_app<C: Cluster>(
    orchestrator: web::Data<Orchestrator<C>>,
    name: web::Path<String>,
    body: web::Json<Value>,
) -> Result<HttpResponse> {
    let mut fields = match body.into_inner() {
        Value::Object(fields) => fields,
        _ => Map::new(),
    };
    fields.insert("name".into(), Value::String(name.into_inner()));

    let request: AppRequest = rules::app_request().parse(Value::Object(fields))?;
    let app = orchestrator.create(&request).await?;

    Ok(HttpResponse::Created().json(json!({ "status": "created", "app": app })))
}

async fn delete_app<C: Cluster>(
    orchestrator: web::Data<Orchestrator<C>>,
    name: web::Path<String>,
) -> HttpResponse {
    if valid_name(&name) {
        orchestrator.delete(&name).await;
    }
    HttpResponse::Ok().json(json!({ "status": "deleted" }))
}
