//! SASL authentication performed during connection handshake.
use crate::error::Result;
use crate::types::CBytes;

const PASSWORD_AUTHENTICATOR: &str = "org.apache.cassandra.auth.PasswordAuthenticator";
const PLAIN_START_CHALLENGE: &[u8] = b"PLAIN-START";

/// Handles SASL authentication for a single connection.
///
/// The connection sends `initial_response` after the server requests authentication. Each
/// following `AUTH_CHALLENGE` is answered with the result of `evaluate_challenge`, until the
/// server reports `AUTH_SUCCESS` (passed to `handle_success`) or an error.
pub trait SaslAuthenticator: Send {
    fn initial_response(&self) -> CBytes;

    fn evaluate_challenge(&self, challenge: CBytes) -> Result<CBytes>;

    fn handle_success(&self, data: CBytes) -> Result<()>;
}

/// Provides authenticators per new connection.
pub trait SaslAuthenticatorProvider: Send + Sync {
    /// Server authenticator class this provider expects, if any.
    fn name(&self) -> Option<&str>;

    fn create_authenticator(&self) -> Box<dyn SaslAuthenticator>;
}

/// PLAIN mechanism with fixed credentials.
#[derive(Debug, Clone)]
pub struct StaticPasswordAuthenticator {
    username: String,
    password: String,
}

impl StaticPasswordAuthenticator {
    pub fn new<S: ToString>(username: S, password: S) -> StaticPasswordAuthenticator {
        StaticPasswordAuthenticator {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    fn plain_token(&self) -> CBytes {
        let mut token = Vec::with_capacity(2 + self.username.len() + self.password.len());
        token.push(0);
        token.extend_from_slice(self.username.as_bytes());
        token.push(0);
        token.extend_from_slice(self.password.as_bytes());

        CBytes::new(token)
    }
}

impl SaslAuthenticator for StaticPasswordAuthenticator {
    fn initial_response(&self) -> CBytes {
        self.plain_token()
    }

    fn evaluate_challenge(&self, challenge: CBytes) -> Result<CBytes> {
        // some servers open the exchange with an explicit PLAIN-START challenge
        match challenge.as_slice() {
            Some(PLAIN_START_CHALLENGE) => Ok(self.plain_token()),
            _ => Err("Unexpected server challenge for password authentication".into()),
        }
    }

    fn handle_success(&self, _data: CBytes) -> Result<()> {
        Ok(())
    }
}

/// Authentication provider with a username and password.
#[derive(Debug, Clone)]
pub struct StaticPasswordAuthenticatorProvider {
    username: String,
    password: String,
}

impl SaslAuthenticatorProvider for StaticPasswordAuthenticatorProvider {
    fn name(&self) -> Option<&str> {
        Some(PASSWORD_AUTHENTICATOR)
    }

    fn create_authenticator(&self) -> Box<dyn SaslAuthenticator> {
        Box::new(StaticPasswordAuthenticator::new(
            self.username.clone(),
            self.password.clone(),
        ))
    }
}

impl StaticPasswordAuthenticatorProvider {
    pub fn new<S: ToString>(username: S, password: S) -> Self {
        StaticPasswordAuthenticatorProvider {
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NoneAuthenticator;

impl SaslAuthenticator for NoneAuthenticator {
    fn initial_response(&self) -> CBytes {
        CBytes::new(vec![0])
    }

    fn evaluate_challenge(&self, _challenge: CBytes) -> Result<CBytes> {
        Err("Server challenge is not supported without credentials".into())
    }

    fn handle_success(&self, _data: CBytes) -> Result<()> {
        Ok(())
    }
}

/// Provider for no authentication.
#[derive(Debug, Clone, Default)]
pub struct NoneAuthenticatorProvider;

impl SaslAuthenticatorProvider for NoneAuthenticatorProvider {
    fn name(&self) -> Option<&str> {
        None
    }

    fn create_authenticator(&self) -> Box<dyn SaslAuthenticator> {
        Box::new(NoneAuthenticator)
    }
}
