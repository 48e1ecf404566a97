use std::{path::PathBuf, sync::Arc};

use actix_files::Files;
use actix_web::{
    App, HttpResponse, HttpServer, delete,
    dev::{ServiceRequest, ServiceResponse, fn_service},
    get,
    http::header::{ContentDisposition, DispositionParam, DispositionType},
    post, put, web,
};
use anyhow::Result;
use chrono::Utc;
use log::{error, info};
use serde::Deserialize;
use serde_json::json;

use crate::csv::{decode_devices, encode_devices};
use crate::entity::device::DeviceInput;
use crate::repo::device_repo::DeviceRepo;

#[derive(Clone)]
struct AppState {
    repo: Arc<dyn DeviceRepo>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub addr: String,
    pub static_dir: PathBuf,
}

fn internal_error() -> HttpResponse {
    HttpResponse::InternalServerError().json(json!({"error": "Something went wrong!"}))
}

fn device_not_found() -> HttpResponse {
    HttpResponse::NotFound().json(json!({"error": "Device not found"}))
}

fn missing_required_fields() -> HttpResponse {
    HttpResponse::BadRequest().json(json!({"error": "Name, type, and status are required"}))
}

async fn endpoint_not_found() -> HttpResponse {
    HttpResponse::NotFound().json(json!({"error": "Endpoint not found"}))
}

/// Run a blocking repo call on the actix blocking pool. Storage failures are
/// logged with full detail server-side; the caller only ever sees the generic
/// 500 body.
async fn run_blocking<T, F>(f: F) -> Result<T, HttpResponse>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match web::block(f).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            error!("storage error: {e:#}");
            Err(internal_error())
        }
        Err(e) => {
            error!("blocking pool error: {e}");
            Err(internal_error())
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    search: Option<String>,
}

#[get("/api/devices")]
async fn list_devices(query: web::Query<ListQuery>, data: web::Data<AppState>) -> HttpResponse {
    let repo = data.repo.clone();
    let search = query.into_inner().search;
    match run_blocking(move || repo.list(search.as_deref())).await {
        Ok(devices) => HttpResponse::Ok().json(devices),
        Err(resp) => resp,
    }
}

// Registered before the `{id}` route so "export" is not parsed as an id.
#[get("/api/devices/export")]
async fn export_devices(data: web::Data<AppState>) -> HttpResponse {
    let repo = data.repo.clone();
    match run_blocking(move || repo.list(None)).await {
        Ok(devices) => HttpResponse::Ok()
            .content_type("text/csv; charset=utf-8")
            .insert_header(ContentDisposition {
                disposition: DispositionType::Attachment,
                parameters: vec![DispositionParam::Filename("devices.csv".to_string())],
            })
            .body(encode_devices(&devices)),
        Err(resp) => resp,
    }
}

/// Bulk import. Structural CSV problems (bad header, wrong column count,
/// blank required field) reject the whole batch before anything is inserted;
/// storage failures on individual rows are collected and reported without
/// aborting the rest.
#[post("/api/devices/import")]
async fn import_devices(body: web::Bytes, data: web::Data<AppState>) -> HttpResponse {
    let text = match String::from_utf8(body.to_vec()) {
        Ok(text) => text,
        Err(_) => {
            return HttpResponse::BadRequest().json(json!({"error": "CSV body must be valid UTF-8"}));
        }
    };
    let rows = match decode_devices(&text) {
        Ok(rows) => rows,
        Err(e) => return HttpResponse::BadRequest().json(json!({"error": e.to_string()})),
    };
    let repo = data.repo.clone();
    let outcome = run_blocking(move || {
        let total = rows.len();
        let mut imported = 0usize;
        let mut errors = Vec::new();
        for (idx, row) in rows.iter().enumerate() {
            match repo.insert(row) {
                Ok(_) => imported += 1,
                Err(e) => {
                    error!("import row {} failed: {e:#}", idx + 1);
                    errors.push(json!({"row": idx + 1, "error": e.to_string()}));
                }
            }
        }
        Ok((total, imported, errors))
    })
    .await;
    match outcome {
        Ok((total, imported, errors)) => HttpResponse::Ok().json(json!({
            "message": format!("Imported {imported} of {total} devices"),
            "imported": imported,
            "total": total,
            "errors": errors,
        })),
        Err(resp) => resp,
    }
}

#[get("/api/devices/{id}")]
async fn get_device(path: web::Path<i32>, data: web::Data<AppState>) -> HttpResponse {
    let id = path.into_inner();
    let repo = data.repo.clone();
    match run_blocking(move || repo.get(id)).await {
        Ok(Some(device)) => HttpResponse::Ok().json(device),
        Ok(None) => device_not_found(),
        Err(resp) => resp,
    }
}

#[post("/api/devices")]
async fn create_device(body: web::Json<DeviceInput>, data: web::Data<AppState>) -> HttpResponse {
    let input = body.into_inner();
    if !input.has_required() {
        return missing_required_fields();
    }
    let repo = data.repo.clone();
    match run_blocking(move || repo.insert(&input)).await {
        Ok(device) => HttpResponse::Created().json(device),
        Err(resp) => resp,
    }
}

#[put("/api/devices/{id}")]
async fn update_device(
    path: web::Path<i32>,
    body: web::Json<DeviceInput>,
    data: web::Data<AppState>,
) -> HttpResponse {
    let id = path.into_inner();
    let input = body.into_inner();
    if !input.has_required() {
        return missing_required_fields();
    }
    let repo = data.repo.clone();
    match run_blocking(move || repo.update(id, &input)).await {
        Ok(Some(device)) => HttpResponse::Ok().json(device),
        Ok(None) => device_not_found(),
        Err(resp) => resp,
    }
}

#[delete("/api/devices/{id}")]
async fn delete_device(path: web::Path<i32>, data: web::Data<AppState>) -> HttpResponse {
    let id = path.into_inner();
    let repo = data.repo.clone();
    match run_blocking(move || repo.delete(id)).await {
        Ok(0) => device_not_found(),
        Ok(_) => HttpResponse::Ok().json(json!({"message": "Device deleted successfully"})),
        Err(resp) => resp,
    }
}

#[get("/api/stats")]
async fn inventory_stats(data: web::Data<AppState>) -> HttpResponse {
    let repo = data.repo.clone();
    match run_blocking(move || repo.stats()).await {
        Ok(stats) => HttpResponse::Ok().json(stats),
        Err(resp) => resp,
    }
}

#[get("/api/health")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "OK",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(list_devices)
        .service(export_devices)
        .service(import_devices)
        .service(get_device)
        .service(create_device)
        .service(update_device)
        .service(delete_device)
        .service(inventory_stats)
        .service(health);
}

pub async fn run<R>(config: ServerConfig, repo: R) -> Result<()>
where
    R: DeviceRepo + 'static,
{
    let state = AppState {
        repo: Arc::new(repo) as Arc<dyn DeviceRepo>,
    };
    let bind_addr = config.addr.clone();
    info!("Starting inventory server at http://{}", &bind_addr);
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(configure_api)
            .service(
                Files::new("/", &config.static_dir)
                    .index_file("index.html")
                    .default_handler(fn_service(|req: ServiceRequest| async {
                        let (req, _) = req.into_parts();
                        Ok(ServiceResponse::new(req, endpoint_not_found().await))
                    })),
            )
            .default_service(web::route().to(endpoint_not_found))
    })
    .bind(&bind_addr)?
    .run()
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::establish_pool;
    use crate::repo::device_repo::new_device_repo;
    use actix_web::http::StatusCode;
    use actix_web::{body::MessageBody, dev::Service, test};
    use tempfile::TempDir;

    fn test_state(dir: &TempDir) -> web::Data<AppState> {
        let pool = establish_pool(&dir.path().join("api.db")).expect("pool");
        let repo = new_device_repo(pool);
        web::Data::new(AppState {
            repo: Arc::new(repo) as Arc<dyn DeviceRepo>,
        })
    }

    async fn test_app(
        dir: &TempDir,
    ) -> impl Service<
        actix_http::Request,
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
    > {
        test::init_service(
            App::new()
                .app_data(test_state(dir))
                .configure(configure_api)
                .default_service(web::route().to(endpoint_not_found)),
        )
        .await
    }

    #[actix_web::test]
    async fn create_then_get_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir).await;

        let req = test::TestRequest::post()
            .uri("/api/devices")
            .set_json(json!({"name": "Router X", "type": "Network", "status": "Available"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(created["id"], 1);
        assert_eq!(created["name"], "Router X");
        assert_eq!(created["type"], "Network");
        assert!(created["date_added"].as_str().is_some_and(|s| !s.is_empty()));

        let fetched: serde_json::Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/devices/1").to_request(),
        )
        .await;
        assert_eq!(fetched, created);

        let stats: serde_json::Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/stats").to_request(),
        )
        .await;
        assert_eq!(stats, json!({"total": 1, "available": 1, "in_use": 0}));
    }

    #[actix_web::test]
    async fn create_with_blank_required_field_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir).await;

        let req = test::TestRequest::post()
            .uri("/api/devices")
            .set_json(json!({"name": "Router X", "type": "Network", "status": "  "}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Name, type, and status are required");
    }

    #[actix_web::test]
    async fn update_and_delete_missing_device_return_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir).await;

        let req = test::TestRequest::put()
            .uri("/api/devices/42")
            .set_json(json!({"name": "Ghost", "type": "None", "status": "Available"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Device not found");

        let resp = test::call_service(
            &app,
            test::TestRequest::delete().uri("/api/devices/42").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn delete_existing_device_then_get_fails() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir).await;

        let req = test::TestRequest::post()
            .uri("/api/devices")
            .set_json(json!({"name": "Tablet", "type": "Mobile", "status": "Available"}))
            .to_request();
        let created: serde_json::Value =
            test::call_and_read_body_json(&app, req).await;
        let id = created["id"].as_i64().unwrap();

        let resp = test::call_service(
            &app,
            test::TestRequest::delete()
                .uri(&format!("/api/devices/{id}"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Device deleted successfully");

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/api/devices/{id}"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn import_structural_error_aborts_whole_batch() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir).await;

        let csv = "name,type,status\nSwitch,Network,Available\nRouter,Network,\n";
        let req = test::TestRequest::post()
            .uri("/api/devices/import")
            .insert_header(("content-type", "text/csv"))
            .set_payload(csv)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("row 2"));

        // Nothing from the batch was inserted, including the valid first row.
        let stats: serde_json::Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/stats").to_request(),
        )
        .await;
        assert_eq!(stats["total"], 0);
    }

    #[actix_web::test]
    async fn import_valid_rows_reports_summary() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir).await;

        let csv = "name,type,status,location\nSwitch,Network,Available,Rack 1\nRouter,Network,In Use,Rack 2\n";
        let req = test::TestRequest::post()
            .uri("/api/devices/import")
            .insert_header(("content-type", "text/csv"))
            .set_payload(csv)
            .to_request();
        let summary: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(summary["imported"], 2);
        assert_eq!(summary["total"], 2);
        assert_eq!(summary["errors"], json!([]));

        let devices: serde_json::Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/devices").to_request(),
        )
        .await;
        assert_eq!(devices.as_array().unwrap().len(), 2);
    }

    #[actix_web::test]
    async fn export_returns_csv_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir).await;

        let req = test::TestRequest::post()
            .uri("/api/devices")
            .set_json(json!({
                "name": "Monitor",
                "type": "Display",
                "status": "Available",
                "notes": "27\", needs cable",
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/devices/export")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let headers = resp.headers().clone();
        assert!(
            headers
                .get("content-type")
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("text/csv")
        );
        assert!(
            headers
                .get("content-disposition")
                .unwrap()
                .to_str()
                .unwrap()
                .contains("devices.csv")
        );
        let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
        assert!(body.starts_with("id,name,type,"));
        // The notes field carries both a comma and a quote, so it is escaped.
        assert!(body.contains("\"27\"\", needs cable\""));
    }

    #[actix_web::test]
    async fn health_and_unknown_routes() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir).await;

        let health_body: serde_json::Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/health").to_request(),
        )
        .await;
        assert_eq!(health_body["status"], "OK");
        assert!(health_body["timestamp"].as_str().is_some_and(|s| !s.is_empty()));

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/nope").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Endpoint not found");
    }
}
