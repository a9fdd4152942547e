//! Network seam between the client core and the board API.

use async_trait::async_trait;
use url::Url;

use super::ClientError;
use crate::api::types::{BatchUpdateRequest, BatchUpdateResponse, ErrorResponse, TasksResponse};
use crate::board::{Column, PendingUpdate};
use crate::config::ClientConfig;

/// Operations the client core needs from the server.
///
/// Responses are fully normalized on return: positions are plain numbers.
#[async_trait]
pub trait BoardTransport: Send + Sync {
    /// Fetch `page` of one column, or of every column when `column` is `None`.
    async fn fetch_tasks(
        &self,
        page: u32,
        column: Option<Column>,
    ) -> Result<TasksResponse, ClientError>;

    /// Send one batch of coalesced updates.
    async fn batch_update(
        &self,
        updates: Vec<PendingUpdate>,
    ) -> Result<BatchUpdateResponse, ClientError>;
}

/// `BoardTransport` over HTTP.
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let mut base_url = Url::parse(&config.base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url,
            token: config.token.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path)?)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Turn a non-2xx response into `ClientError::Status`.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| {
            if e.errors.is_empty() {
                e.message
            } else {
                format!("{}: {}", e.message, e.errors.join("; "))
            }
        })
        .unwrap_or_else(|_| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });
    Err(ClientError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl BoardTransport for HttpTransport {
    async fn fetch_tasks(
        &self,
        page: u32,
        column: Option<Column>,
    ) -> Result<TasksResponse, ClientError> {
        let mut query = vec![("page", page.to_string())];
        if let Some(column) = column {
            query.push(("column", column.as_str().to_string()));
        }
        let request = self.http.get(self.endpoint("api/task")?).query(&query);
        let response = check(self.authorize(request).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn batch_update(
        &self,
        updates: Vec<PendingUpdate>,
    ) -> Result<BatchUpdateResponse, ClientError> {
        let body = BatchUpdateRequest {
            updates: updates.into_iter().map(Into::into).collect(),
        };
        let request = self.http.patch(self.endpoint("api/task/batch")?).json(&body);
        let response = check(self.authorize(request).send().await?).await?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Column, OwnerId, Task};
    use crate::client::{BatchQueue, FlushOutcome};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::TcpListener;

    /// Address of a server that accepts connections and never answers.
    async fn silent_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn hung_batch_write_times_out_and_frees_the_queue() {
        let mut config = ClientConfig::new(silent_server().await);
        config.request_timeout = Duration::from_millis(200);
        let transport = Arc::new(HttpTransport::new(&config).unwrap());
        let queue = BatchQueue::new(transport, Duration::from_secs(60));

        let task = Task::new(
            OwnerId::new("u"),
            "stuck".to_string(),
            String::new(),
            Column::Todo,
            0.0,
        );
        queue.enqueue(task.to_pending_update());

        let outcome = tokio::time::timeout(Duration::from_secs(10), queue.flush_now())
            .await
            .expect("flush must not hang");
        assert!(matches!(outcome, FlushOutcome::Failed(_)));
        assert!(!queue.is_sending());
    }

    #[tokio::test]
    async fn timeout_surfaces_as_transport_error() {
        let mut config = ClientConfig::new(silent_server().await);
        config.request_timeout = Duration::from_millis(200);
        let transport = HttpTransport::new(&config).unwrap();

        match transport.fetch_tasks(1, None).await {
            Err(ClientError::Transport(e)) => assert!(e.is_timeout()),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let transport = HttpTransport::new(&ClientConfig::new("http://localhost:3000/board")).unwrap();
        assert_eq!(
            transport.endpoint("api/task").unwrap().as_str(),
            "http://localhost:3000/board/api/task"
        );
    }
}
