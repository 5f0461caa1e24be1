use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use api::{AppState, router};
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use db::MemoryJobStorage;
use pipeline::{FnRunner, Pipeline, RunOutcome, RunnerError, RunnerFuture};
use relay_core::{JobRecord, JobStatus, PipelineConfig, StatisticSnapshot};
use serde_json::{Value, json};
use tower::ServiceExt;

async fn app() -> Result<(Router, Pipeline), Box<dyn Error>> {
    let runner = Arc::new(FnRunner::new(|_name: &str, _args: &[String]| {
        Box::pin(async { Ok::<_, RunnerError>(RunOutcome::Success) }) as RunnerFuture<'static>
    }));
    let config = PipelineConfig::default().with_poll_delay(2);
    let pipeline = Pipeline::start(config, Arc::new(MemoryJobStorage::new()), runner).await?;
    Ok((router(AppState::from_pipeline(&pipeline)), pipeline))
}

fn post_json(body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/jobs")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn read_json(response: axum::response::Response) -> Result<Value, Box<dyn Error>> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[tokio::test]
async fn test_create_job_returns_created_record() -> Result<(), Box<dyn Error>> {
    let (app, pipeline) = app().await?;

    let response = app
        .oneshot(post_json(r#"{"name":"build","args":["--release"]}"#))
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let record: JobRecord = serde_json::from_value(read_json(response).await?)?;
    assert_eq!(record.name, "build");
    assert_eq!(record.arguments, vec!["--release".to_string()]);
    assert_eq!(record.status, JobStatus::Queued);

    pipeline.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_create_job_rejects_bad_requests() -> Result<(), Box<dyn Error>> {
    let (app, pipeline) = app().await?;

    let not_json = Request::builder()
        .method(Method::POST)
        .uri("/jobs")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(r#"{"name":"build"}"#))?;
    let cases = [
        not_json,
        post_json("{not json"),
        post_json(r#"{"args":["a"]}"#),
        post_json(r#"{"name":""}"#),
        post_json(r#"{"name":"x","args":["","y"]}"#),
    ];

    for request in cases {
        let response = app.clone().oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = app
        .oneshot(Request::get("/jobs").body(Body::empty())?)
        .await?;
    assert_eq!(read_json(response).await?, json!([]));

    pipeline.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_list_jobs_and_stats_follow_processing() -> Result<(), Box<dyn Error>> {
    let (app, pipeline) = app().await?;

    let created = app
        .clone()
        .oneshot(post_json(r#"{"name":"Xport"}"#))
        .await?;
    assert_eq!(created.status(), StatusCode::CREATED);

    let mut snapshot = StatisticSnapshot::default();
    for _ in 0..200 {
        let response = app
            .clone()
            .oneshot(Request::get("/stats").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        snapshot = serde_json::from_value(read_json(response).await?)?;
        if snapshot.total_success_jobs == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(snapshot.total_jobs, 1);
    assert_eq!(snapshot.total_success_jobs, 1);

    let response = app
        .oneshot(Request::get("/jobs").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let jobs: Vec<JobRecord> = serde_json::from_value(read_json(response).await?)?;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].name, "Xport");

    pipeline.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_other_routes_are_not_allowed() -> Result<(), Box<dyn Error>> {
    let (app, pipeline) = app().await?;

    let requests = [
        Request::delete("/jobs").body(Body::empty())?,
        Request::post("/stats").body(Body::empty())?,
        Request::get("/nowhere").body(Body::empty())?,
    ];
    for request in requests {
        let response = app.clone().oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    pipeline.shutdown().await?;
    Ok(())
}
