use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiRegistryError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not authorized: {0}")]
    NotAuthorized(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("{service} call failed: {message}")]
    Collaborator { service: String, message: String },
    /// Creation aborted after side effects that could not be undone.
    #[error("creation of {ai_id} partially applied ({}): {cause}", .lingering.join(", "))]
    PartialCreation {
        ai_id: String,
        lingering: Vec<String>,
        cause: String,
    },
    /// An update's content append aborted with effects left in place.
    #[error("update of {ai_id} partially applied ({}): {cause}", .lingering.join(", "))]
    PartialUpdate {
        ai_id: String,
        lingering: Vec<String>,
        cause: String,
    },
}

impl AiRegistryError {
    /// Effects still in place after a partially applied write.
    pub fn lingering(&self) -> Option<&[String]> {
        match self {
            Self::PartialCreation { lingering, .. } | Self::PartialUpdate { lingering, .. } => {
                Some(lingering)
            }
            _ => None,
        }
    }

    pub fn collaborator(service: &str, message: impl Into<String>) -> Self {
        Self::Collaborator {
            service: service.to_string(),
            message: message.into(),
        }
    }
}

impl From<diesel::result::Error> for AiRegistryError {
    fn from(err: diesel::result::Error) -> Self {
        Self::Database(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AiRegistryError>;
