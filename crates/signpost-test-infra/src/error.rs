use thiserror::Error;

/// Failures while starting or inspecting a disposable server.
#[derive(Debug, Error)]
pub enum TestInfraError {
    #[error("failed to start {image} container: {source}")]
    Start {
        image: &'static str,
        #[source]
        source: testcontainers::TestcontainersError,
    },
    #[error("container lookup failed: {0}")]
    Container(#[from] testcontainers::TestcontainersError),
}

pub type Result<T> = std::result::Result<T, TestInfraError>;
