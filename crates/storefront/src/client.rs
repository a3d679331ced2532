//! Calls into the functions service.
//!
//! [`HttpFunctionsClient`] talks to a remote deployment; [`LocalFunctions`]
//! runs the same functions in-process against the storefront's own store.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use bytes::Bytes;
use common::{OrderId, ProductId};
use domain::OrderAction;
use functions::FunctionsError;
use functions::models::{
    DeleteResponse, FileInfo, LowStockResponse, OrderStatusResponse, ProcessOrderRequest,
    ProcessOrderResponse, StockHistoryResponse, StockUpdateResponse, UpdateStockRequest,
    UploadResponse,
};
use functions::routes::FUNCTION_KEY_HEADER;
use functions::services::FileKind;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use store::Store;
use thiserror::Error;

/// A failed functions call.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The functions service answered with an error.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    /// The functions service could not be reached or answered garbage.
    #[error("Functions service unavailable: {0}")]
    Transport(String),

    #[error("Invalid functions base URL: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Status to report to the storefront's own caller.
    pub fn status(&self) -> StatusCode {
        match self {
            ClientError::Rejected { status, .. } => *status,
            ClientError::Transport(_) | ClientError::Configuration(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<FunctionsError> for ClientError {
    fn from(err: FunctionsError) -> Self {
        ClientError::Rejected {
            status: err.status(),
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

/// The functions the storefront relies on.
#[async_trait]
pub trait FunctionsClient: Send + Sync {
    async fn process_order(
        &self,
        order_id: OrderId,
        action: OrderAction,
    ) -> Result<ProcessOrderResponse, ClientError>;

    async fn order_status(&self, order_id: OrderId) -> Result<OrderStatusResponse, ClientError>;

    async fn update_stock(
        &self,
        request: UpdateStockRequest,
    ) -> Result<StockUpdateResponse, ClientError>;

    /// `None` uses the service's default threshold.
    async fn low_stock(&self, threshold: Option<u32>) -> Result<LowStockResponse, ClientError>;

    async fn stock_history(&self, product_id: ProductId)
    -> Result<StockHistoryResponse, ClientError>;

    async fn upload_image(
        &self,
        file_name: Option<String>,
        data: Bytes,
    ) -> Result<UploadResponse, ClientError>;

    async fn upload_contract(
        &self,
        file_name: String,
        data: Bytes,
    ) -> Result<UploadResponse, ClientError>;

    async fn list_files(&self, kind: FileKind) -> Result<Vec<FileInfo>, ClientError>;

    /// Returns whether a file was deleted.
    async fn delete_file(&self, kind: FileKind, name: &str) -> Result<bool, ClientError>;
}

/// Functions reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFunctionsClient {
    http: reqwest::Client,
    base_url: Url,
    key: Option<String>,
}

impl HttpFunctionsClient {
    pub fn new(base_url: &str, key: Option<String>) -> Result<Self, ClientError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ClientError::Configuration(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Configuration(base_url.to_string()));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            key,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::Configuration(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ClientError> {
        let builder = self.http.request(method, self.endpoint(segments)?);
        Ok(match &self.key {
            Some(key) => builder.header(FUNCTION_KEY_HEADER, key),
            None => builder,
        })
    }

    async fn send<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, ClientError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let message = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| body.get("error")?.as_str().map(str::to_string))
            .unwrap_or_else(|| status.to_string());
        tracing::warn!(%status, %message, "functions call rejected");
        Err(ClientError::Rejected { status, message })
    }

    async fn upload(
        &self,
        kind: &str,
        file_name: Option<String>,
        data: Bytes,
    ) -> Result<UploadResponse, ClientError> {
        let mut part = Part::bytes(data.to_vec());
        if let Some(file_name) = file_name {
            part = part.file_name(file_name);
        }
        let form = Form::new().part(functions::routes::files::FILE_FIELD, part);
        let builder = self.request(Method::POST, &["api", "files", "upload", kind])?;
        Self::send(builder.multipart(form)).await
    }
}

#[async_trait]
impl FunctionsClient for HttpFunctionsClient {
    async fn process_order(
        &self,
        order_id: OrderId,
        action: OrderAction,
    ) -> Result<ProcessOrderResponse, ClientError> {
        let body = ProcessOrderRequest { order_id, action };
        let builder = self.request(Method::POST, &["api", "orders", "process"])?;
        Self::send(builder.json(&body)).await
    }

    async fn order_status(&self, order_id: OrderId) -> Result<OrderStatusResponse, ClientError> {
        let id = order_id.to_string();
        Self::send(self.request(Method::GET, &["api", "orders", &id, "status"])?).await
    }

    async fn update_stock(
        &self,
        request: UpdateStockRequest,
    ) -> Result<StockUpdateResponse, ClientError> {
        let builder = self.request(Method::POST, &["api", "stock", "update"])?;
        Self::send(builder.json(&request)).await
    }

    async fn low_stock(&self, threshold: Option<u32>) -> Result<LowStockResponse, ClientError> {
        let mut builder = self.request(Method::GET, &["api", "stock", "low"])?;
        if let Some(threshold) = threshold {
            builder = builder.query(&[("threshold", threshold)]);
        }
        Self::send(builder).await
    }

    async fn stock_history(
        &self,
        product_id: ProductId,
    ) -> Result<StockHistoryResponse, ClientError> {
        let id = product_id.to_string();
        Self::send(self.request(Method::GET, &["api", "stock", "history", &id])?).await
    }

    async fn upload_image(
        &self,
        file_name: Option<String>,
        data: Bytes,
    ) -> Result<UploadResponse, ClientError> {
        self.upload("image", file_name, data).await
    }

    async fn upload_contract(
        &self,
        file_name: String,
        data: Bytes,
    ) -> Result<UploadResponse, ClientError> {
        self.upload("contract", Some(file_name), data).await
    }

    async fn list_files(&self, kind: FileKind) -> Result<Vec<FileInfo>, ClientError> {
        Self::send(self.request(Method::GET, &["api", "files", kind.segment()])?).await
    }

    async fn delete_file(&self, kind: FileKind, name: &str) -> Result<bool, ClientError> {
        let builder = self.request(Method::DELETE, &["api", "files", kind.segment(), name])?;
        let response: DeleteResponse = Self::send(builder).await?;
        Ok(response.deleted)
    }
}

/// Functions called in-process.
pub struct LocalFunctions<S: Store> {
    state: Arc<functions::AppState<S>>,
}

impl<S: Store> LocalFunctions<S> {
    pub fn new(state: Arc<functions::AppState<S>>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl<S: Store> FunctionsClient for LocalFunctions<S> {
    async fn process_order(
        &self,
        order_id: OrderId,
        action: OrderAction,
    ) -> Result<ProcessOrderResponse, ClientError> {
        Ok(self.state.orders.process(order_id, action).await?)
    }

    async fn order_status(&self, order_id: OrderId) -> Result<OrderStatusResponse, ClientError> {
        Ok(self.state.orders.status(order_id).await?)
    }

    async fn update_stock(
        &self,
        request: UpdateStockRequest,
    ) -> Result<StockUpdateResponse, ClientError> {
        Ok(self.state.stock.update(request).await?)
    }

    async fn low_stock(&self, threshold: Option<u32>) -> Result<LowStockResponse, ClientError> {
        Ok(self.state.stock.low_stock(threshold).await?)
    }

    async fn stock_history(
        &self,
        product_id: ProductId,
    ) -> Result<StockHistoryResponse, ClientError> {
        Ok(self.state.stock.history(product_id).await?)
    }

    async fn upload_image(
        &self,
        file_name: Option<String>,
        data: Bytes,
    ) -> Result<UploadResponse, ClientError> {
        Ok(self.state.files.upload_image(file_name.as_deref(), data).await?)
    }

    async fn upload_contract(
        &self,
        file_name: String,
        data: Bytes,
    ) -> Result<UploadResponse, ClientError> {
        Ok(self.state.files.upload_contract(&file_name, data).await?)
    }

    async fn list_files(&self, kind: FileKind) -> Result<Vec<FileInfo>, ClientError> {
        Ok(self.state.files.list(kind).await?)
    }

    async fn delete_file(&self, kind: FileKind, name: &str) -> Result<bool, ClientError> {
        Ok(self.state.files.delete(kind, name).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_escaped_segments() {
        let client = HttpFunctionsClient::new("http://functions.test/base/", None).unwrap();
        let url = client
            .endpoint(&["api", "files", "contracts", "supplier agreement.pdf"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://functions.test/base/api/files/contracts/supplier%20agreement.pdf"
        );
    }

    #[test]
    fn bad_base_url_is_a_configuration_error() {
        assert!(matches!(
            HttpFunctionsClient::new("not a url", None),
            Err(ClientError::Configuration(_))
        ));
    }

    #[test]
    fn functions_errors_keep_their_status() {
        let err = ClientError::from(FunctionsError::OrderNotFound(OrderId::new()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ClientError::Transport("connection refused".to_string()).status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
