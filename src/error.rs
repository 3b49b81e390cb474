/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Message shown to the user when a user-initiated action fails
    ///
    /// Names the likely cause instead of echoing transport details.
    pub fn notice(&self) -> String {
        match self {
            AppError::HttpClient(e) if e.is_timeout() => {
                "The server took too long to respond. Please try again.".to_string()
            }
            AppError::HttpClient(e) if e.is_connect() => {
                "Could not reach the server. Check your connection.".to_string()
            }
            AppError::HttpClient(_) | AppError::ExternalApi(_) => {
                "The server returned an error. Please try again later.".to_string()
            }
            AppError::Unauthorized(_) => {
                "Please log in again: your credentials were rejected.".to_string()
            }
            AppError::NotFound(what) => format!("Could not find {}.", what),
            AppError::InvalidInput(msg) => msg.clone(),
            AppError::Serialization(_) | AppError::Csv(_) => {
                "The server sent data this client could not read.".to_string()
            }
            AppError::Storage(_) => "Local storage could not be written.".to_string(),
            AppError::Internal(_) => "Something went wrong. Please try again.".to_string(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
