use actix_cors::Cors;
use actix_web::{
    error::InternalError,
    middleware::Logger,
    web,
    App,
    HttpResponse,
    HttpServer,
    Responder,
};
use log::{
    error,
    info,
};

use std::{
    net::Ipv4Addr,
    sync::Arc,
};

use crate::executor::{
    CodeExecutor,
    ExecutionOutcome,
    ExecutorError,
};

use crate::types::{
    ExecutionPayload,
    ExecutionRequest,
    ExecutionResult,
};

use crate::api::{
    check_version,
    get_server_port,
    health_check,
};

pub const NO_OUTPUT_MESSAGE: &str = "Program executed successfully with no output.";
pub const TIMEOUT_MESSAGE: &str =
    "Time Limit Exceeded: execution was stopped after exceeding the time limit.";
pub const COMPILE_ERROR_LABEL: &str = "Compile Error:";
pub const SYSTEM_ERROR_LABEL: &str = "System Error:";

const MAX_PAYLOAD_BYTES: usize = 1 << 20;

/// Serves `/run`. Holds nothing but the executor it delegates to.
#[derive(Clone)]
pub struct RunHandler {
    executor: Arc<dyn CodeExecutor>,
}

impl RunHandler {
    pub fn new(executor: Arc<dyn CodeExecutor>) -> Self {
        RunHandler { executor }
    }

    pub async fn handle(&self, request: ExecutionRequest) -> ExecutionResult {
        let result = self.executor.execute(&request).await;
        if let Err(ref e) = result {
            error!("Error executing code: {}", e);
        }
        ExecutionResult {
            output: render_output(result),
        }
    }
}

/// Turns a runner result into the text shown to the caller.
pub fn render_output(result: Result<ExecutionOutcome, ExecutorError>) -> String {
    match result {
        Ok(ExecutionOutcome::Completed { stdout, stderr }) => {
            let combined = stdout + &stderr;
            if combined.is_empty() {
                NO_OUTPUT_MESSAGE.to_string()
            } else {
                combined
            }
        }
        Ok(ExecutionOutcome::CompileError { diagnostics }) => {
            format!("{COMPILE_ERROR_LABEL}\n{diagnostics}")
        }
        Ok(ExecutionOutcome::TimedOut) => TIMEOUT_MESSAGE.to_string(),
        Err(e) => format!("{SYSTEM_ERROR_LABEL} {e}"),
    }
}

async fn run_code(
    handler: web::Data<RunHandler>,
    payload: web::Json<ExecutionPayload>,
) -> impl Responder {
    let request = ExecutionRequest::from(payload.into_inner());
    info!(
        "Received {:?} submission ({} bytes of code, {} bytes of stdin)",
        request.language,
        request.source.len(),
        request.stdin.len()
    );

    HttpResponse::Ok().json(handler.handle(request).await)
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(MAX_PAYLOAD_BYTES)
        .error_handler(|err, _req| {
            let body = ExecutionResult {
                output: format!("Invalid request: {}", err),
            };
            InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
        })
}

/// Registers routes on an app; shared by the server and the tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .route("/run", web::post().to(run_code))
        .route("/health", web::get().to(health_check))
        .route("/version", web::get().to(check_version));
}

pub async fn run_server(executor: Arc<dyn CodeExecutor>) -> std::io::Result<()> {
    let port = get_server_port();
    let server_address = (Ipv4Addr::UNSPECIFIED, port);
    let handler = web::Data::new(RunHandler::new(executor));
    info!("Listening on {}:{}", server_address.0, server_address.1);

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(Logger::default())
            .app_data(handler.clone())
            .configure(configure)
    })
    .bind(server_address)?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{
        http::StatusCode,
        test as actix_test,
    };
    use serde_json::json;
    use std::sync::Mutex;

    /// Replays a canned result and records what it was asked to run.
    struct StubExecutor {
        result: fn() -> Result<ExecutionOutcome, ExecutorError>,
        seen: Mutex<Vec<ExecutionRequest>>,
    }

    impl StubExecutor {
        fn new(result: fn() -> Result<ExecutionOutcome, ExecutorError>) -> Arc<Self> {
            Arc::new(StubExecutor {
                result,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl CodeExecutor for StubExecutor {
        async fn execute(
            &self,
            request: &ExecutionRequest,
        ) -> Result<ExecutionOutcome, ExecutorError> {
            self.seen.lock().unwrap().push(request.clone());
            (self.result)()
        }
    }

    fn completed(stdout: &str, stderr: &str) -> Result<ExecutionOutcome, ExecutorError> {
        Ok(ExecutionOutcome::Completed {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        })
    }

    #[test]
    fn test_render_concatenates_streams() {
        assert_eq!(render_output(completed("out\n", "err\n")), "out\nerr\n");
    }

    #[test]
    fn test_render_empty_output_placeholder() {
        assert_eq!(render_output(completed("", "")), NO_OUTPUT_MESSAGE);
    }

    #[test]
    fn test_render_compile_error() {
        let rendered = render_output(Ok(ExecutionOutcome::CompileError {
            diagnostics: "Foo.java:3: error: ';' expected".to_string(),
        }));

        assert!(rendered.starts_with("Compile Error:"));
        assert!(rendered.contains("Foo.java"));
    }

    #[test]
    fn test_render_timeout() {
        assert_eq!(render_output(Ok(ExecutionOutcome::TimedOut)), TIMEOUT_MESSAGE);
    }

    #[test]
    fn test_render_internal_error() {
        let err = ExecutorError::Spawn {
            program: "python3".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        let rendered = render_output(Err(err));

        assert!(rendered.starts_with("System Error: "));
        assert!(rendered.contains("python3"));
    }

    #[actix_web::test]
    async fn test_run_endpoint() {
        let stub = StubExecutor::new(|| completed("hi\n", ""));
        let handler = web::Data::new(RunHandler::new(stub.clone()));
        let app = actix_test::init_service(App::new().app_data(handler).configure(configure)).await;

        let req = actix_test::TestRequest::post()
            .uri("/run")
            .set_json(json!({ "code": "print(\"hi\")", "lang": "python", "stdin": "" }))
            .to_request();
        let resp: ExecutionResult = actix_test::call_and_read_body_json(&app, req).await;

        assert_eq!(resp.output, "hi\n");
        let seen = stub.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].language, crate::types::Language::Python);
    }

    #[actix_web::test]
    async fn test_run_endpoint_defaults_to_java() {
        let stub = StubExecutor::new(|| Ok(ExecutionOutcome::TimedOut));
        let handler = web::Data::new(RunHandler::new(stub.clone()));
        let app = actix_test::init_service(App::new().app_data(handler).configure(configure)).await;

        let req = actix_test::TestRequest::post()
            .uri("/run")
            .set_json(json!({ "code": "public class Main {}" }))
            .to_request();
        let resp: ExecutionResult = actix_test::call_and_read_body_json(&app, req).await;

        assert_eq!(resp.output, TIMEOUT_MESSAGE);
        let seen = stub.seen.lock().unwrap();
        assert_eq!(seen[0].language, crate::types::Language::Java);
        assert_eq!(seen[0].stdin, "");
    }

    #[actix_web::test]
    async fn test_run_endpoint_rejects_malformed_json() {
        let stub = StubExecutor::new(|| completed("", ""));
        let handler = web::Data::new(RunHandler::new(stub.clone()));
        let app = actix_test::init_service(App::new().app_data(handler).configure(configure)).await;

        let req = actix_test::TestRequest::post()
            .uri("/run")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = actix_test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ExecutionResult = actix_test::read_body_json(resp).await;
        assert!(body.output.starts_with("Invalid request:"));
        assert!(stub.seen.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_health_and_version() {
        let stub = StubExecutor::new(|| completed("", ""));
        let handler = web::Data::new(RunHandler::new(stub));
        let app = actix_test::init_service(App::new().app_data(handler).configure(configure)).await;

        let req = actix_test::TestRequest::get().uri("/health").to_request();
        let body = actix_test::call_and_read_body(&app, req).await;
        assert_eq!(body, "OK");

        let req = actix_test::TestRequest::get().uri("/version").to_request();
        let body = actix_test::call_and_read_body(&app, req).await;
        assert_eq!(body, env!("CARGO_PKG_VERSION"));
    }
}
