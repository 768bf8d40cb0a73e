use async_trait::async_trait;
use aws_sdk_lambda::error::SdkError;
use aws_sdk_lambda::operation::delete_event_source_mapping::{
    DeleteEventSourceMappingError, DeleteEventSourceMappingOutput,
};
use aws_sdk_lambda::operation::delete_function::{DeleteFunctionError, DeleteFunctionOutput};
use aws_sdk_lambda::operation::list_event_source_mappings::ListEventSourceMappingsError;
use aws_sdk_lambda::operation::list_functions::ListFunctionsError;
use aws_sdk_lambda::operation::list_tags::ListTagsError;
use aws_sdk_lambda::types::{EventSourceMappingConfiguration, FunctionConfiguration};
use aws_types::SdkConfig;
use std::collections::HashMap;

#[async_trait]
pub trait SweeperAwsSdkLambda {
    async fn list_all_functions(&self) -> Result<Vec<FunctionConfiguration>, SdkError<ListFunctionsError>>;
    async fn list_function_tags(&self, function_arn: &str) -> Result<HashMap<String, String>, SdkError<ListTagsError>>;
    async fn list_event_source_mappings(
        &self,
        function_name: &str,
    ) -> Result<Vec<EventSourceMappingConfiguration>, SdkError<ListEventSourceMappingsError>>;
    async fn delete_event_source_mapping(
        &self,
        uuid: &str,
    ) -> Result<DeleteEventSourceMappingOutput, SdkError<DeleteEventSourceMappingError>>;
    async fn delete_function(&self, function_name: &str)
        -> Result<DeleteFunctionOutput, SdkError<DeleteFunctionError>>;
}

#[async_trait]
impl SweeperAwsSdkLambda for SdkConfig {
    async fn list_all_functions(&self) -> Result<Vec<FunctionConfiguration>, SdkError<ListFunctionsError>> {
        let client = aws_sdk_lambda::Client::new(self);
        let mut stream = client.list_functions().into_paginator().items().send();

        let mut functions = Vec::new();
        while let Some(function) = stream.next().await {
            functions.push(function?);
        }
        Ok(functions)
    }

    async fn list_function_tags(&self, function_arn: &str) -> Result<HashMap<String, String>, SdkError<ListTagsError>> {
        let client = aws_sdk_lambda::Client::new(self);
        let output = client.list_tags().resource(function_arn).send().await?;
        Ok(output.tags.unwrap_or_default())
    }

    async fn list_event_source_mappings(
        &self,
        function_name: &str,
    ) -> Result<Vec<EventSourceMappingConfiguration>, SdkError<ListEventSourceMappingsError>> {
        let client = aws_sdk_lambda::Client::new(self);
        let mut stream = client
            .list_event_source_mappings()
            .function_name(function_name)
            .into_paginator()
            .items()
            .send();

        let mut mappings = Vec::new();
        while let Some(mapping) = stream.next().await {
            mappings.push(mapping?);
        }
        Ok(mappings)
    }

    async fn delete_event_source_mapping(
        &self,
        uuid: &str,
    ) -> Result<DeleteEventSourceMappingOutput, SdkError<DeleteEventSourceMappingError>> {
        let client = aws_sdk_lambda::Client::new(self);
        client.delete_event_source_mapping().uuid(uuid).send().await
    }

    async fn delete_function(
        &self,
        function_name: &str,
    ) -> Result<DeleteFunctionOutput, SdkError<DeleteFunctionError>> {
        let client = aws_sdk_lambda::Client::new(self);
        client.delete_function().function_name(function_name).send().await
    }
}
