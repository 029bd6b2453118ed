use thiserror::Error;

#[derive(Debug, Error)]
pub enum XmppError {
    #[error("xmpp connection error: {0}")]
    Connection(String),

    #[error("xmpp authentication failed: {0}")]
    Auth(String),
}

impl XmppError {
    pub fn code(&self) -> &'static str {
        match self {
            XmppError::Connection(_) => "XMPP_CONNECTION",
            XmppError::Auth(_) => "XMPP_AUTH",
        }
    }
}

impl From<XmppError> for jbot_transport::TransportError {
    fn from(e: XmppError) -> Self {
        match e {
            XmppError::Connection(msg) => jbot_transport::TransportError::ConnectionFailed(msg),
            XmppError::Auth(msg) => jbot_transport::TransportError::AuthFailed(msg),
        }
    }
}
