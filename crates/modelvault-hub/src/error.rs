use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("hub API error: HTTP {status} for {url}{hint}")]
    Api {
        status: u16,
        url: String,
        hint: &'static str,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("hub file fetch error: {0}")]
    HfHub(#[from] hf_hub::api::tokio::ApiError),

    #[error("git {op} failed (status {status}): {stderr}")]
    Git {
        op: String,
        status: String,
        stderr: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HubError {
    pub(crate) fn api(status: u16, url: impl Into<String>) -> Self {
        let hint = if status == 401 || status == 403 {
            " (hint: set HUGGING_FACE_HUB_TOKEN for gated or private repos)"
        } else {
            ""
        };
        HubError::Api {
            status,
            url: url.into(),
            hint,
        }
    }
}

pub type HubResult<T> = Result<T, HubError>;
