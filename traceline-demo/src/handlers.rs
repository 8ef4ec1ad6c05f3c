//! Demo routes, each exercising the tracing layer a different way.

use actix_web::{
    get,
    web::{self, Data, Json},
};

use traceline::{ActiveSpan, OuterCall, Tracer};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(sum).service(concat).service(health);
}

/// Adds two numbers "via" a simulated database call.
#[get("/sum/{a}/{b}")]
async fn sum(
    path: web::Path<(i64, i64)>,
    span: ActiveSpan,
    tracer: Data<Tracer>,
) -> Json<serde_json::Value> {
    let (a, b) = path.into_inner();
    span.log("handling sum");

    let call = OuterCall {
        op_name: "db.query".to_owned(),
        peer_service: "svc2".to_owned(),
        peer_hostname: "localhost".to_owned(),
        peer_port: 61002,
        tag_key: "query".to_owned(),
        tag_value: format!("SELECT {a} + {b}"),
    };
    let sum = tracer.outer_call(&span, &call, || a + b);

    span.set_tag("result", &sum.to_string());
    Json(serde_json::json!({ "sum": sum }))
}

/// Concatenates two path segments "via" a simulated cache lookup.
#[get("/concat/{a}/{b}")]
async fn concat(
    path: web::Path<(String, String)>,
    span: ActiveSpan,
    tracer: Data<Tracer>,
) -> Json<serde_json::Value> {
    let (a, b) = path.into_inner();

    let call = OuterCall {
        op_name: "cache.get".to_owned(),
        peer_service: "svc2".to_owned(),
        peer_hostname: "localhost".to_owned(),
        peer_port: 61001,
        tag_key: "key".to_owned(),
        tag_value: format!("{a}:{b}"),
    };
    let joined = tracer
        .outer_call_async(&span, &call, async {
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
            format!("{a}{b}")
        })
        .await;

    Json(serde_json::json!({ "concat": joined }))
}

/// Handle the `/health` route
#[get("/health")]
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "OK",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
