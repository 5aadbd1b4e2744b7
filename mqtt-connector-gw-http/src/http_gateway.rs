/*
    Copyright 2025 MydriaTech AB

    Licensed under the Apache License 2.0 with Free world makers exception
    1.0.0 (the "License"); you may not use this file except in compliance with
    the License. You should have obtained a copy of the License with the source
    or binary distribution in file named

        LICENSE-Apache-2.0-with-FWM-Exception-1.0.0

    Unless required by applicable law or agreed to in writing, software
    distributed under the License is distributed on an "AS IS" BASIS,
    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
    See the License for the specific language governing permissions and
    limitations under the License.
*/


//! Interactions with a function gateway using its HTTP API.

mod function_status;

use self::function_status::FunctionStatus;
use crate::CredentialsCache;
use mqtt_connector_gw::ConnectorError;
use mqtt_connector_gw::ConnectorErrorKind;
use mqtt_connector_gw::Gateway;
use mqtt_connector_gw::model::FunctionAnnotation;
use mqtt_connector_gw::model::InvocationRequest;
use mqtt_connector_gw::model::InvocationResponse;
use reqwest::Client;
use reqwest::ClientBuilder;
use reqwest::RequestBuilder;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

/// Function gateway reached over HTTP.
pub struct HttpGateway {
    gateway_url: String,
    // Client uses an Arc internally, so it doesn't need Arc<> wrapping here
    client: Client,
    credentials_cache: Arc<CredentialsCache>,
    topic_delimiter: String,
    content_type: String,
    connector_name: String,
}

impl HttpGateway {
    const HEADER_TOPIC: &'static str = "X-Topic";
    const HEADER_CONNECTOR: &'static str = "X-Connector";
    const HEADER_CALLBACK_URL: &'static str = "X-Callback-Url";

    /// Return a new instance.
    ///
    /// `timeout` bounds every request, including synchronous invocations that
    /// wait for the function to finish.
    pub fn new(
        gateway_url: &str,
        app_name_lowercase: &str,
        app_version: &str,
        credentials_cache: &Arc<CredentialsCache>,
        topic_delimiter: &str,
        content_type: &str,
        timeout: Duration,
    ) -> Result<Arc<Self>, ConnectorError> {
        let user_agent = format!("{app_name_lowercase}/{app_version}");
        log::debug!("user_agent: {user_agent}. timeout: {timeout:?}");
        let client = ClientBuilder::new()
            .user_agent(user_agent)
            .referer(false)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ConnectorErrorKind::Configuration
                    .error_with_msg(format!("Unable to create HTTP client: {e}"))
            })?;
        Ok(Arc::new(Self {
            gateway_url: gateway_url.trim_end_matches('/').to_owned(),
            client,
            credentials_cache: Arc::clone(credentials_cache),
            topic_delimiter: topic_delimiter.to_owned(),
            content_type: content_type.to_owned(),
            connector_name: app_name_lowercase.to_owned(),
        }))
    }

    /// URL of the endpoint that invokes `function`.
    fn invoke_url(&self, function: &str, async_invoke: bool) -> String {
        let path = if async_invoke {
            "async-function"
        } else {
            "function"
        };
        format!("{}/{path}/{function}", self.gateway_url)
    }

    /// URL of the function registry, optionally limited to a namespace.
    fn functions_url(&self, namespace: Option<&str>) -> String {
        match namespace {
            Some(namespace) => format!(
                "{}/system/functions?namespace={namespace}",
                self.gateway_url
            ),
            None => format!("{}/system/functions", self.gateway_url),
        }
    }

    /// Add basic auth when credentials are available.
    fn with_auth(&self, request_builder: RequestBuilder) -> RequestBuilder {
        match self.credentials_cache.current() {
            Some(credentials) => {
                request_builder.basic_auth(credentials.user(), Some(credentials.password()))
            }
            None => request_builder,
        }
    }

    /// GET a system endpoint and return the body when the status is 200.
    async fn get_system_json(&self, url: &str) -> Result<String, ConnectorError> {
        let response = self
            .with_auth(self.client.get(url))
            .send()
            .await
            .map_err(|e| {
                ConnectorErrorKind::RegistryQuery
                    .error_with_msg(format!("Failed request to {url}: {:?}", e.without_url()))
            })?;
        match response.status() {
            StatusCode::OK => response.text().await.map_err(|e| {
                ConnectorErrorKind::RegistryQuery.error_with_msg(format!(
                    "Failed request to {url}: Failed to parse response body as text: {:?}",
                    e.without_url()
                ))
            }),
            status_code => Err(ConnectorErrorKind::RegistryQuery
                .error_with_msg(format!("Failed request to {url}: status_code {status_code}."))),
        }
    }

    /// List the namespaces that the gateway manages functions in.
    async fn namespaces(&self) -> Result<Vec<String>, ConnectorError> {
        let url = format!("{}/system/namespaces", self.gateway_url);
        let json = self.get_system_json(&url).await?;
        serde_json::from_str::<Vec<String>>(&json).map_err(|e| {
            ConnectorErrorKind::RegistryQuery
                .error_with_msg(format!("Failed to parse JSON response from '{url}': {e}"))
        })
    }

    /// List functions in a single namespace (or the gateway's default).
    async fn functions_in_namespace(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<FunctionAnnotation>, ConnectorError> {
        let url = self.functions_url(namespace);
        let json = self.get_system_json(&url).await?;
        let function_statuses = FunctionStatus::from_json_list(&json).map_err(|e| {
            ConnectorErrorKind::RegistryQuery
                .error_with_msg(format!("Failed to parse JSON response from '{url}': {e}"))
        })?;
        Ok(function_statuses
            .iter()
            .filter_map(|fs| fs.as_function_annotation(namespace, &self.topic_delimiter))
            .collect())
    }
}

#[async_trait::async_trait]
impl Gateway for HttpGateway {
    async fn list_functions(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<FunctionAnnotation>, ConnectorError> {
        if namespace.is_some() {
            return self.functions_in_namespace(namespace).await;
        }
        let namespaces = self
            .namespaces()
            .await
            .map_err(|e| log::debug!("Unable to list namespaces: {e}"))
            .unwrap_or_default();
        if namespaces.is_empty() {
            return self.functions_in_namespace(None).await;
        }
        let mut ret = Vec::new();
        for namespace in &namespaces {
            ret.extend(self.functions_in_namespace(Some(namespace)).await?);
        }
        Ok(ret)
    }

    async fn invoke(&self, request: InvocationRequest) -> InvocationResponse {
        let url = self.invoke_url(request.function(), request.is_async());
        let mut request_builder = self
            .client
            .post(&url)
            .body(request.body().clone())
            .header(CONTENT_TYPE, &self.content_type)
            .header(Self::HEADER_TOPIC, request.topic())
            .header(Self::HEADER_CONNECTOR, &self.connector_name);
        if request.is_async()
            && let Some(callback_url) = request.callback_url()
        {
            request_builder = request_builder.header(Self::HEADER_CALLBACK_URL, callback_url);
        }
        let start = Instant::now();
        let response = match request_builder.send().await {
            Ok(response) => response,
            Err(e) => {
                return InvocationResponse::from_error(
                    request.topic(),
                    request.function(),
                    ConnectorErrorKind::Invocation
                        .error_with_msg(format!("Failed request to {url}: {:?}", e.without_url())),
                )
                .with_duration(start.elapsed());
            }
        };
        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(body) => InvocationResponse::new(
                status,
                request.topic(),
                request.function(),
                (!body.is_empty()).then_some(body),
            )
            .with_duration(start.elapsed()),
            Err(e) => InvocationResponse::from_error(
                request.topic(),
                request.function(),
                ConnectorErrorKind::Invocation.error_with_msg(format!(
                    "Failed request to {url}: Failed to read response body: {:?}",
                    e.without_url()
                )),
            )
            .with_duration(start.elapsed()),
        }
    }
}
