use thiserror::Error;

#[derive(Debug, Error)]
pub enum RtmError {
    #[error("rtm.connect failed: {0}")]
    Handshake(String),

    #[error("rtm authentication rejected: {0}")]
    Auth(String),

    #[error("rtm websocket error: {0}")]
    Socket(String),
}

impl RtmError {
    pub fn code(&self) -> &'static str {
        match self {
            RtmError::Handshake(_) => "RTM_HANDSHAKE",
            RtmError::Auth(_) => "RTM_AUTH",
            RtmError::Socket(_) => "RTM_SOCKET",
        }
    }
}

impl From<RtmError> for jbot_transport::TransportError {
    fn from(e: RtmError) -> Self {
        match e {
            RtmError::Handshake(msg) => jbot_transport::TransportError::ConnectionFailed(msg),
            RtmError::Auth(msg) => jbot_transport::TransportError::AuthFailed(msg),
            RtmError::Socket(msg) => jbot_transport::TransportError::ConnectionFailed(msg),
        }
    }
}
