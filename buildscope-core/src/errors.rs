use thiserror::Error;

#[derive(Error, Debug)]
#[error(transparent)]
pub struct BuildScopeError(Box<ErrorKind>);

#[derive(Error, Debug)]
#[error(transparent)]
pub enum ErrorKind {
    #[error("SerdeJsonError: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
    #[error("IoError: {0}")]
    IoError(#[from] std::io::Error),
    #[error("LlmError: {0}")]
    LlmError(#[from] llm::error::LLMError),
    #[error("ProviderError: {0}")]
    ProviderError(String),
    #[error("LLM response missing text")]
    MissingResponseText,
    #[error("RegistryError: {0}")]
    RegistryError(String),
}

impl BuildScopeError {
    pub fn provider(message: impl Into<String>) -> Self {
        BuildScopeError(Box::new(ErrorKind::ProviderError(message.into())))
    }

    pub fn registry(message: impl Into<String>) -> Self {
        BuildScopeError(Box::new(ErrorKind::RegistryError(message.into())))
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }
}

impl<E> From<E> for BuildScopeError
where
    ErrorKind: From<E>,
{
    fn from(err: E) -> Self {
        BuildScopeError(Box::new(ErrorKind::from(err)))
    }
}
