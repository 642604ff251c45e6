use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainError {
    #[error("No action error")]
    NoAction,
    #[error("RPC error")]
    RpcError,
    #[error("Database error")]
    Database,
    #[error("Local state error")]
    LocalState,
    #[error("External service error")]
    ExternalService,
    #[error("Contract call failed")]
    ContractCall,
    #[error("Inconsistent reward readings")]
    InconsistentReward,
    #[error("Snapshot was only partially persisted")]
    PartialPersistence,
    #[error("Snapshot already persisted for this cycle")]
    DuplicateCycle,
}

impl MainError {
    /// Errors worth retrying inside the same cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, MainError::RpcError | MainError::Database)
    }
}

pub trait AsRpcError<T> {
    fn into_rpc_error(self) -> Result<T, MainError>;
}

impl<T> AsRpcError<T> for anyhow::Result<T> {
    #[inline]
    fn into_rpc_error(self) -> Result<T, MainError> {
        self.map_err(|reason| {
            tracing::error!(?reason, "RPC error");
            MainError::RpcError
        })
    }
}

pub trait AsDbError<T> {
    fn into_db_error(self) -> Result<T, MainError>;
}

impl<T> AsDbError<T> for anyhow::Result<T> {
    #[inline]
    fn into_db_error(self) -> Result<T, MainError> {
        self.map_err(|reason| {
            tracing::error!(?reason, "Database error");
            MainError::Database
        })
    }
}

pub trait AsLocalStateError<T> {
    fn into_local_state_error(self) -> Result<T, MainError>;
}

impl<T> AsLocalStateError<T> for anyhow::Result<T> {
    #[inline]
    fn into_local_state_error(self) -> Result<T, MainError> {
        self.map_err(|reason| {
            tracing::error!(?reason, "{}", MainError::LocalState);
            MainError::LocalState
        })
    }
}

pub trait ContextDbInteractError<T> {
    fn context_db_interact_error(self) -> anyhow::Result<T>;
}

impl<T, E> ContextDbInteractError<T> for Result<T, E> {
    fn context_db_interact_error(self) -> anyhow::Result<T> {
        self.map_err(|_| anyhow::anyhow!("Failed to interact with db"))
    }
}
