//! Job status, queue inspection, and cancellation against a mock backend.

mod common;

use anyhow::Result;
use common::{completed_entry, response_json, server_for, MockComfy};
use easel::api::schema::{CancelJobRequest, GetJobRequest};
use easel::api::service::EaselServer;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

async fn get_job(server: &EaselServer, prompt_id: &str) -> Result<Value> {
    let request: GetJobRequest = serde_json::from_value(json!({"prompt_id": prompt_id}))?;
    Ok(response_json(&server.get_job(request).await?))
}

async fn cancel_job(server: &EaselServer, prompt_id: &str) -> Result<Value> {
    let request: CancelJobRequest = serde_json::from_value(json!({"prompt_id": prompt_id}))?;
    Ok(response_json(&server.cancel_job(request).await?))
}

#[tokio::test]
async fn test_get_job_running() -> Result<()> {
    let mock = MockComfy::start().await;
    mock.mount_queue(&["p1"], &[]).await;
    let server = server_for(&mock);

    let status = get_job(&server, "p1").await?;
    assert_eq!(status["status"], "running");
    assert_eq!(status["prompt_id"], "p1");
    assert!(status.get("outputs").is_none());
    Ok(())
}

#[tokio::test]
async fn test_get_job_queued() -> Result<()> {
    let mock = MockComfy::start().await;
    mock.mount_queue(&["p0"], &["p1", "p2"]).await;
    let server = server_for(&mock);

    let status = get_job(&server, "p2").await?;
    assert_eq!(status["status"], "queued");
    Ok(())
}

#[tokio::test]
async fn test_get_job_completed_lists_outputs() -> Result<()> {
    let mock = MockComfy::start().await;
    mock.mount_queue(&[], &[]).await;
    mock.mount_history("p1", completed_entry("easel_00001_.png"))
        .await;
    let server = server_for(&mock);

    let status = get_job(&server, "p1").await?;
    assert_eq!(status["status"], "completed");
    assert!(status.get("error").is_none());
    assert_eq!(status["outputs"][0]["filename"], "easel_00001_.png");
    assert_eq!(status["outputs"][0]["folder_type"], "output");
    Ok(())
}

#[tokio::test]
async fn test_get_job_error_carries_backend_detail() -> Result<()> {
    let mock = MockComfy::start().await;
    mock.mount_queue(&[], &[]).await;
    mock.mount_history(
        "p1",
        json!({
            "status": {
                "status_str": "error",
                "completed": false,
                "messages": [
                    ["execution_start", {"prompt_id": "p1"}],
                    ["execution_error", {
                        "node_type": "KSampler",
                        "exception_message": "CUDA out of memory"
                    }]
                ]
            }
        }),
    )
    .await;
    let server = server_for(&mock);

    let status = get_job(&server, "p1").await?;
    assert_eq!(status["status"], "error");
    assert_eq!(status["error"], "CUDA out of memory");
    assert!(status.get("outputs").is_none());
    Ok(())
}

#[tokio::test]
async fn test_get_job_unknown_id_is_not_found() -> Result<()> {
    let mock = MockComfy::start().await;
    mock.mount_queue(&[], &[]).await;
    Mock::given(method("GET"))
        .and(path("/history/p-unknown"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&mock.server)
        .await;
    let server = server_for(&mock);

    let status = get_job(&server, "p-unknown").await?;
    assert_eq!(status["status"], "not_found");
    assert!(status.get("error").is_none());
    Ok(())
}

#[tokio::test]
async fn test_get_queue_status_passes_queue_through() -> Result<()> {
    let mock = MockComfy::start().await;
    mock.mount_queue(&["p1"], &["p2", "p3"]).await;
    let server = server_for(&mock);

    let response = response_json(&server.get_queue_status().await?);

    // The backend's entry arrays come back unmodified, prompt id at index 1
    assert_eq!(response["queue_running"], json!([[0, "p1", {}]]));
    let pending = response["queue_pending"].as_array().expect("pending entries");
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0][1], "p2");
    assert_eq!(pending[1][1], "p3");
    Ok(())
}

#[tokio::test]
async fn test_get_queue_status_empty_queues_are_arrays() -> Result<()> {
    let mock = MockComfy::start().await;
    mock.mount_queue(&[], &[]).await;
    let server = server_for(&mock);

    let response = response_json(&server.get_queue_status().await?);
    assert_eq!(response["queue_running"], json!([]));
    assert_eq!(response["queue_pending"], json!([]));
    Ok(())
}

#[tokio::test]
async fn test_cancel_pending_job_deletes_from_queue() -> Result<()> {
    let mock = MockComfy::start().await;
    mock.mount_queue(&[], &["p1"]).await;
    Mock::given(method("POST"))
        .and(path("/queue"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock.server)
        .await;
    let server = server_for(&mock);

    let response = cancel_job(&server, "p1").await?;
    assert_eq!(response["success"], true);
    assert_eq!(response["prompt_id"], "p1");

    // The delete went to POST /queue (GET bodies are empty)
    let requests = mock
        .server
        .received_requests()
        .await
        .expect("recording enabled");
    let delete = requests
        .iter()
        .find(|r| r.url.path() == "/queue" && !r.body.is_empty())
        .expect("delete request sent");
    let body: Value = serde_json::from_slice(&delete.body)?;
    assert_eq!(body["delete"][0], "p1");
    Ok(())
}

#[tokio::test]
async fn test_cancel_running_job_interrupts() -> Result<()> {
    let mock = MockComfy::start().await;
    mock.mount_queue(&["p1"], &[]).await;
    Mock::given(method("POST"))
        .and(path("/interrupt"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock.server)
        .await;
    let server = server_for(&mock);

    let response = cancel_job(&server, "p1").await?;
    assert_eq!(response["success"], true);

    let requests = mock
        .server
        .received_requests()
        .await
        .expect("recording enabled");
    let interrupts = requests.iter().filter(|r| r.url.path() == "/interrupt").count();
    assert_eq!(interrupts, 1);
    Ok(())
}

#[tokio::test]
async fn test_cancel_unknown_job_is_idempotent() -> Result<()> {
    let mock = MockComfy::start().await;
    mock.mount_queue(&[], &[]).await;
    let server = server_for(&mock);

    let response = cancel_job(&server, "p-finished").await?;
    assert_eq!(response["success"], false);

    // Neither interrupt nor delete was attempted
    let requests = mock
        .server
        .received_requests()
        .await
        .expect("recording enabled");
    assert!(requests.iter().all(|r| r.body.is_empty()));
    Ok(())
}
