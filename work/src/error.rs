use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkError {
    #[error("work generation cancelled")]
    Cancelled,

    #[error("work pool is shut down")]
    PoolClosed,

    #[error("failed to start work threads: {0}")]
    Spawn(String),
}
