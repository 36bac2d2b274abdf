use thiserror::Error;

/// Everything that can go wrong while serving a connection.
///
/// The first four variants are protocol errors: their `Display` text is
/// the exact string sent back to the offending client in an `error`
/// event. The rest never reach a client.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Invalid message format")]
    Malformed(#[source] serde_json::Error),

    #[error("Username, chatname, and password are required")]
    MissingJoinFields,

    #[error("Message content cannot be empty")]
    EmptyContent,

    #[error("You must join a room before sending messages")]
    NotJoined,

    #[error("network error: {0}")]
    Network(#[from] std::io::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] axum::Error),

    #[error("encode error: {0}")]
    Encode(#[source] serde_json::Error),
}

impl ChatError {
    /// True for errors that are reported to the client that caused them.
    pub fn is_client_facing(&self) -> bool {
        matches!(
            self,
            ChatError::Malformed(_)
                | ChatError::MissingJoinFields
                | ChatError::EmptyContent
                | ChatError::NotJoined
        )
    }
}
