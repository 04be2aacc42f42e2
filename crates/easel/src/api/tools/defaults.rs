use crate::api::responses::SetDefaultsResponse;
use crate::api::schema::SetDefaultsRequest;
use crate::api::service::EaselServer;
use crate::api::tools::{error_result, success_json};
use crate::comfy;
use crate::error::EaselError;
use rmcp::model::CallToolResult;
use rmcp::ErrorData as McpError;
use serde_json::{Map, Value};

impl EaselServer {
    #[tracing::instrument(name = "mcp.tool.get_defaults", skip(self))]
    pub async fn get_defaults(&self) -> Result<CallToolResult, McpError> {
        success_json(&self.defaults.all_effective())
    }

    #[tracing::instrument(
        name = "mcp.tool.set_defaults",
        skip(self, request),
        fields(defaults.persist = request.persist.unwrap_or(false))
    )]
    pub async fn set_defaults(
        &self,
        request: SetDefaultsRequest,
    ) -> Result<CallToolResult, McpError> {
        match self.apply_defaults(&request).await {
            Ok(response) => success_json(&response),
            Err(e) => Ok(error_result(&e)),
        }
    }

    async fn apply_defaults(
        &self,
        request: &SetDefaultsRequest,
    ) -> Result<SetDefaultsResponse, EaselError> {
        let updates: Vec<(&str, &Map<String, Value>)> = [
            ("image", request.image.as_ref()),
            ("audio", request.audio.as_ref()),
            ("video", request.video.as_ref()),
        ]
        .into_iter()
        .filter_map(|(namespace, values)| values.map(|v| (namespace, v)))
        .collect();

        if updates.is_empty() {
            return Err(EaselError::validation(
                "set_defaults requires at least one of: image, audio, video",
            ));
        }

        // Skip the backend round-trip unless a model is actually changing.
        let available_models = if updates.iter().any(|(_, values)| values.contains_key("model")) {
            match self.comfy.object_info().await {
                Ok(info) => Some(comfy::checkpoint_names(&info)),
                Err(e) => {
                    tracing::warn!(error = %e, "backend unreachable, skipping model validation");
                    None
                }
            }
        } else {
            None
        };

        // All namespaces validate before any of them applies.
        for (namespace, values) in &updates {
            self.defaults
                .validate(namespace, values, available_models.as_deref())?;
        }

        let mut updated = Map::new();
        for (namespace, values) in &updates {
            self.defaults
                .set_defaults(namespace, values, available_models.as_deref())?;
            updated.insert(namespace.to_string(), Value::Object((*values).clone()));
        }

        let persisted_to = if request.persist.unwrap_or(false) {
            let path = self.defaults.persist()?;
            Some(path.display().to_string())
        } else {
            None
        };

        Ok(SetDefaultsResponse {
            updated: Value::Object(updated),
            persisted_to,
        })
    }
}
