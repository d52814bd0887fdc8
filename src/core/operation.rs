//! Operation dispatcher.
//!
//! Every resource lifecycle is an ordered list of HTTP steps. A step builds
//! its URL and optional request body from the current [`ResourceData`],
//! performs exactly one call, and writes the decoded response back into the
//! data. Steps run strictly in order and the first failure stops the rest.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::handlers::RequestErrorHandler;
use crate::client::{Client, Method};
use crate::error::ProviderError;
use crate::schema::Diagnostic;
use crate::state::ResourceData;

/// Lifecycle phase a step belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    /// Create.
    Create,
    /// Read.
    Read,
    /// Update.
    Update,
    /// Delete.
    Delete,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Builds an outbound request payload from declarative state.
pub trait SchemaReader: Serialize + Sized {
    /// Populate the request from `data`.
    fn read_from_schema(data: &ResourceData) -> Result<Self, ProviderError>;
}

/// Writes a decoded API response into declarative state.
pub trait SchemaWriter: DeserializeOwned {
    /// Apply the response to `data`.
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError>;
}

type UrlFactory = Box<dyn Fn(&ResourceData, &Client) -> Result<String, ProviderError> + Send + Sync>;
type RequestFactory = Box<dyn Fn(&ResourceData) -> Result<Value, ProviderError> + Send + Sync>;
type ResponseFactory =
    Box<dyn Fn(&[u8], &mut ResourceData) -> Result<(), ProviderError> + Send + Sync>;

/// One HTTP step of a resource lifecycle.
pub struct ResourceOperationConfig {
    name: String,
    kind: OperationType,
    method: Method,
    url: UrlFactory,
    request: Option<RequestFactory>,
    response: Option<ResponseFactory>,
    error_handler: Option<Box<dyn RequestErrorHandler>>,
}

impl fmt::Debug for ResourceOperationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceOperationConfig")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("method", &self.method)
            .field("has_request", &self.request.is_some())
            .field("has_response", &self.response.is_some())
            .field("has_error_handler", &self.error_handler.is_some())
            .finish()
    }
}

impl ResourceOperationConfig {
    /// A step with no request body, no response processing and no error
    /// handler.
    pub fn new<F>(name: impl Into<String>, kind: OperationType, method: Method, url: F) -> Self
    where
        F: Fn(&ResourceData, &Client) -> Result<String, ProviderError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind,
            method,
            url: Box::new(url),
            request: None,
            response: None,
            error_handler: None,
        }
    }

    /// Send the JSON encoding of `R` as the request body.
    pub fn with_request<R>(mut self) -> Self
    where
        R: SchemaReader + 'static,
    {
        self.request = Some(Box::new(|data| {
            let request = R::read_from_schema(data)?;
            Ok(serde_json::to_value(request)?)
        }));
        self
    }

    /// Send a body built by an arbitrary function.
    pub fn with_request_body<F>(mut self, build: F) -> Self
    where
        F: Fn(&ResourceData) -> Result<Value, ProviderError> + Send + Sync + 'static,
    {
        self.request = Some(Box::new(build));
        self
    }

    /// Decode the response body as `W` and write it into the data.
    pub fn with_response<W>(mut self) -> Self
    where
        W: SchemaWriter + 'static,
    {
        self.response = Some(Box::new(|body, data| {
            let response: W = serde_json::from_slice(body)?;
            response.write_to_schema(data)
        }));
        self
    }

    /// Install a policy for failed calls.
    pub fn with_error_handler(mut self, handler: impl RequestErrorHandler + 'static) -> Self {
        self.error_handler = Some(Box::new(handler));
        self
    }

    /// Step name, used in logs and error messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lifecycle phase.
    pub fn kind(&self) -> OperationType {
        self.kind
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Compute the URL this step would call.
    pub fn url(&self, data: &ResourceData, client: &Client) -> Result<String, ProviderError> {
        (self.url)(data, client)
    }

    /// Run the step. Failures are wrapped with the step name.
    pub async fn execute(
        &self,
        data: &mut ResourceData,
        client: &Client,
    ) -> Result<(), ProviderError> {
        debug!("Init {}", self.name);
        self.execute_inner(data, client)
            .await
            .map_err(|e| e.in_operation(self.kind, self.name.clone()))?;
        debug!("End {}", self.name);
        Ok(())
    }

    async fn execute_inner(
        &self,
        data: &mut ResourceData,
        client: &Client,
    ) -> Result<(), ProviderError> {
        let body = match &self.request {
            Some(build) => Some(build(data)?),
            None => None,
        };
        let url = self.url(data, client)?;

        match client.do_request(&url, self.method.clone(), body.as_ref()).await {
            Ok(bytes) => {
                if let Some(write) = &self.response {
                    if !is_blank(&bytes) {
                        write(&bytes, data)?;
                    }
                }
                Ok(())
            },
            Err(err) => match &self.error_handler {
                Some(handler) => handler.handle_error(err, data, client).await,
                None => Err(err),
            },
        }
    }
}

fn is_blank(body: &[u8]) -> bool {
    body.iter().all(u8::is_ascii_whitespace)
}

/// Ordered steps of one lifecycle operation.
#[derive(Debug, Default)]
pub struct OperationSequence {
    steps: Vec<ResourceOperationConfig>,
}

impl OperationSequence {
    /// Sequence made of the given steps.
    pub fn new(steps: Vec<ResourceOperationConfig>) -> Self {
        Self { steps }
    }

    /// A create step followed by the read that refreshes state.
    pub fn create(create: ResourceOperationConfig, read: ResourceOperationConfig) -> Self {
        Self::new(vec![create, read])
    }

    /// A single read step.
    pub fn read(read: ResourceOperationConfig) -> Self {
        Self::new(vec![read])
    }

    /// An update step followed by the read that refreshes state.
    pub fn update(update: ResourceOperationConfig, read: ResourceOperationConfig) -> Self {
        Self::new(vec![update, read])
    }

    /// A single delete step.
    pub fn delete(delete: ResourceOperationConfig) -> Self {
        Self::new(vec![delete])
    }

    /// The steps, in execution order.
    pub fn steps(&self) -> &[ResourceOperationConfig] {
        &self.steps
    }

    /// Run every step in order, stopping at the first failure.
    pub async fn try_run(
        &self,
        data: &mut ResourceData,
        client: &Client,
    ) -> Result<(), ProviderError> {
        for step in &self.steps {
            step.execute(data, client).await?;
        }
        Ok(())
    }

    /// Run every step and report a failure as a single diagnostic.
    pub async fn run(&self, data: &mut ResourceData, client: &Client) -> Vec<Diagnostic> {
        match self.try_run(data, client).await {
            Ok(()) => Vec::new(),
            Err(err) => vec![Diagnostic::from(&err)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize)]
    struct NameRequest {
        name: String,
    }

    impl SchemaReader for NameRequest {
        fn read_from_schema(data: &ResourceData) -> Result<Self, ProviderError> {
            Ok(Self {
                name: data.require_str("name")?.to_string(),
            })
        }
    }

    #[derive(Deserialize)]
    struct NameResponse {
        name: String,
    }

    impl SchemaWriter for NameResponse {
        fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
            data.set("name", self.name.clone());
            Ok(())
        }
    }

    #[test]
    fn test_operation_type_display() {
        assert_eq!(OperationType::Create.to_string(), "create");
        assert_eq!(OperationType::Delete.to_string(), "delete");
    }

    #[test]
    fn test_sequence_shapes() {
        let step = |name: &str, kind| {
            ResourceOperationConfig::new(name, kind, Method::GET, |_, c: &Client| {
                Ok(c.url("/v1/x"))
            })
        };

        let create = OperationSequence::create(
            step("XCreate", OperationType::Create),
            step("XRead", OperationType::Read),
        );
        let names: Vec<&str> = create.steps().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["XCreate", "XRead"]);
        assert_eq!(OperationSequence::delete(step("XDelete", OperationType::Delete)).steps().len(), 1);
    }

    #[test]
    fn test_reader_and_writer_plumbing() {
        let step = ResourceOperationConfig::new("NameUpdate", OperationType::Update, Method::PUT, |_, c: &Client| {
            Ok(c.url("/v1/names"))
        })
        .with_request::<NameRequest>()
        .with_response::<NameResponse>();

        let mut data = ResourceData::new();
        data.set("name", "before");

        let request = step.request.as_ref().unwrap();
        assert_eq!(request(&data).unwrap(), serde_json::json!({"name": "before"}));

        let response = step.response.as_ref().unwrap();
        response(br#"{"name":"after"}"#, &mut data).unwrap();
        assert_eq!(data.get_str("name"), Some("after"));
    }

    #[test]
    fn test_missing_required_field_fails_request_build() {
        let step = ResourceOperationConfig::new("NameCreate", OperationType::Create, Method::POST, |_, c: &Client| {
            Ok(c.url("/v1/names"))
        })
        .with_request::<NameRequest>();

        let request = step.request.as_ref().unwrap();
        assert!(request(&ResourceData::new()).is_err());
    }

    #[test]
    fn test_blank_body() {
        assert!(is_blank(b""));
        assert!(is_blank(b" \n"));
        assert!(!is_blank(b"{}"));
    }
}
