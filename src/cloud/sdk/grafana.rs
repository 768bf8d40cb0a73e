use async_trait::async_trait;
use aws_sdk_grafana::error::SdkError;
use aws_sdk_grafana::operation::delete_workspace::{DeleteWorkspaceError, DeleteWorkspaceOutput};
use aws_sdk_grafana::operation::list_workspaces::ListWorkspacesError;
use aws_sdk_grafana::types::WorkspaceSummary;
use aws_types::SdkConfig;

#[async_trait]
pub trait SweeperAwsSdkGrafana {
    async fn list_all_workspaces(&self) -> Result<Vec<WorkspaceSummary>, SdkError<ListWorkspacesError>>;
    async fn delete_workspace(
        &self,
        workspace_id: &str,
    ) -> Result<DeleteWorkspaceOutput, SdkError<DeleteWorkspaceError>>;
}

#[async_trait]
impl SweeperAwsSdkGrafana for SdkConfig {
    async fn list_all_workspaces(&self) -> Result<Vec<WorkspaceSummary>, SdkError<ListWorkspacesError>> {
        let client = aws_sdk_grafana::Client::new(self);
        let mut workspaces = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = client.list_workspaces().set_next_token(next_token).send().await?;
            workspaces.extend(output.workspaces);

            next_token = output.next_token;
            if next_token.is_none() {
                break;
            }
        }

        Ok(workspaces)
    }

    async fn delete_workspace(
        &self,
        workspace_id: &str,
    ) -> Result<DeleteWorkspaceOutput, SdkError<DeleteWorkspaceError>> {
        let client = aws_sdk_grafana::Client::new(self);
        client.delete_workspace().workspace_id(workspace_id).send().await
    }
}
