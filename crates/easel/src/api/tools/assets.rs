use crate::api::responses::{AssetListResponse, AssetMetadataResponse, AssetSummary};
use crate::api::schema::{GetAssetMetadataRequest, ListAssetsRequest};
use crate::api::service::EaselServer;
use crate::api::tools::{error_result, success_json};
use crate::asset_registry::compute_url;
use crate::error::EaselError;
use rmcp::model::CallToolResult;
use rmcp::ErrorData as McpError;

const DEFAULT_LIST_LIMIT: usize = 10;

impl EaselServer {
    #[tracing::instrument(
        name = "mcp.tool.list_assets",
        skip(self, request),
        fields(assets.count = tracing::field::Empty)
    )]
    pub async fn list_assets(&self, request: ListAssetsRequest) -> Result<CallToolResult, McpError> {
        let limit = request.limit.unwrap_or(DEFAULT_LIST_LIMIT);
        let records = self.registry.list(limit, request.workflow_id.as_deref());

        tracing::Span::current().record("assets.count", records.len());

        let assets: Vec<AssetSummary> = records
            .into_iter()
            .map(|record| AssetSummary {
                asset_url: compute_url(&record.identity, self.comfy.base_url()),
                asset_id: record.asset_id,
                filename: record.identity.filename,
                workflow_id: record.workflow_id,
                mime_type: record.mime_type,
                created_at: record.created_at,
            })
            .collect();

        success_json(&AssetListResponse {
            total: assets.len(),
            assets,
        })
    }

    #[tracing::instrument(
        name = "mcp.tool.get_asset_metadata",
        skip(self, request),
        fields(asset.id = %request.asset_id)
    )]
    pub async fn get_asset_metadata(
        &self,
        request: GetAssetMetadataRequest,
    ) -> Result<CallToolResult, McpError> {
        let Some(record) = self.registry.get(&request.asset_id) else {
            return Ok(error_result(&EaselError::not_found(format!(
                "No asset found with ID: {}",
                request.asset_id
            ))));
        };

        success_json(&AssetMetadataResponse {
            asset_url: compute_url(&record.identity, self.comfy.base_url()),
            asset_id: record.asset_id,
            filename: record.identity.filename,
            subfolder: record.identity.subfolder,
            folder_type: record.identity.folder_type,
            prompt_id: record.prompt_id,
            workflow_id: record.workflow_id,
            mime_type: record.mime_type,
            width: record.width,
            height: record.height,
            bytes_size: record.bytes_size,
            created_at: record.created_at,
            expires_at: record.expires_at,
            submitted_workflow: record.submitted_workflow,
            backend_history: record.backend_history,
            metadata: record.metadata,
        })
    }
}
