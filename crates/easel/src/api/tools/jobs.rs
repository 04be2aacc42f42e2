use crate::api::responses::{
    CancelResponse, JobStatus, JobStatusResponse, OutputFile, QueueStatusResponse,
};
use crate::api::schema::{CancelJobRequest, GetJobRequest};
use crate::api::service::EaselServer;
use crate::api::tools::{error_result, success_json};
use crate::comfy;
use crate::error::EaselError;
use rmcp::model::CallToolResult;
use rmcp::ErrorData as McpError;
use serde_json::Value;

impl EaselServer {
    #[tracing::instrument(
        name = "mcp.tool.get_job",
        skip(self, request),
        fields(
            job.prompt_id = %request.prompt_id,
            job.status = tracing::field::Empty,
        )
    )]
    pub async fn get_job(&self, request: GetJobRequest) -> Result<CallToolResult, McpError> {
        match self.job_status(&request.prompt_id).await {
            Ok(response) => {
                tracing::Span::current().record("job.status", format!("{:?}", response.status));
                success_json(&response)
            }
            Err(e) => Ok(error_result(&e)),
        }
    }

    /// Live queue first, then history. A prompt id in neither is reported as
    /// not_found rather than conflated with a backend-reported failure.
    async fn job_status(&self, prompt_id: &str) -> Result<JobStatusResponse, EaselError> {
        let queue = self.comfy.queue().await?;
        if comfy::queue_contains(&queue, "queue_running", prompt_id) {
            return Ok(status_only(prompt_id, JobStatus::Running));
        }
        if comfy::queue_contains(&queue, "queue_pending", prompt_id) {
            return Ok(status_only(prompt_id, JobStatus::Queued));
        }

        let history = self.comfy.history(prompt_id).await?;
        let Some(entry) = history.get(prompt_id).filter(|e| !e.is_null()) else {
            return Ok(status_only(prompt_id, JobStatus::NotFound));
        };

        if let Some(detail) = comfy::history_error_detail(entry) {
            return Ok(JobStatusResponse {
                prompt_id: prompt_id.to_string(),
                status: JobStatus::Error,
                error: Some(detail),
                outputs: None,
            });
        }

        let outputs = comfy::collect_outputs(entry)
            .into_iter()
            .map(|identity| OutputFile {
                filename: identity.filename,
                subfolder: identity.subfolder,
                folder_type: identity.folder_type,
            })
            .collect();
        Ok(JobStatusResponse {
            prompt_id: prompt_id.to_string(),
            status: JobStatus::Completed,
            error: None,
            outputs: Some(outputs),
        })
    }

    /// The backend's queue entries pass through unmodified; callers read
    /// the prompt ids in flight straight out of the arrays.
    #[tracing::instrument(name = "mcp.tool.get_queue_status", skip(self))]
    pub async fn get_queue_status(&self) -> Result<CallToolResult, McpError> {
        match self.comfy.queue().await {
            Ok(mut queue) => {
                let mut take = |key: &str| {
                    queue
                        .get_mut(key)
                        .map(Value::take)
                        .unwrap_or_else(|| Value::Array(Vec::new()))
                };
                success_json(&QueueStatusResponse {
                    queue_running: take("queue_running"),
                    queue_pending: take("queue_pending"),
                })
            }
            Err(e) => Ok(error_result(&e)),
        }
    }

    #[tracing::instrument(
        name = "mcp.tool.cancel_job",
        skip(self, request),
        fields(job.prompt_id = %request.prompt_id)
    )]
    pub async fn cancel_job(&self, request: CancelJobRequest) -> Result<CallToolResult, McpError> {
        match self.comfy.cancel(&request.prompt_id).await {
            Ok(cancelled) => {
                if !cancelled {
                    tracing::debug!(prompt_id = %request.prompt_id,
                        "cancel requested for a job not in either queue");
                }
                success_json(&CancelResponse {
                    prompt_id: request.prompt_id,
                    success: cancelled,
                })
            }
            Err(e) => Ok(error_result(&e)),
        }
    }
}

fn status_only(prompt_id: &str, status: JobStatus) -> JobStatusResponse {
    JobStatusResponse {
        prompt_id: prompt_id.to_string(),
        status,
        error: None,
        outputs: None,
    }
}
