use std::net::SocketAddr;
use tokio::sync::mpsc::{Sender, UnboundedSender};

#[cfg(test)]
use mockall::*;

use crate::authenticators::SaslAuthenticatorProvider;
use crate::cluster::KeyspaceHolder;
use crate::error::{Error, Result};
use crate::frame::message_response::ResponseBody;
use crate::frame::{Frame, Opcode, Version};
use crate::future::BoxFuture;
use crate::transport::CqlTransport;

/// Manages establishing connections to nodes.
pub trait ConnectionManager<T: CqlTransport>: Send + Sync {
    /// Tries to establish a new, ready to use connection with optional server event and error
    /// handlers.
    fn connection(
        &self,
        event_handler: Option<UnboundedSender<Frame>>,
        error_handler: Option<Sender<Error>>,
        addr: SocketAddr,
    ) -> BoxFuture<Result<T>>;

    /// Protocol version used for new connections. Can change only before the first connection is
    /// successfully established.
    fn version(&self) -> Version;
}

#[cfg(test)]
mock! {
    pub ConnectionManager<T: CqlTransport> {
    }

    impl<T: CqlTransport> ConnectionManager<T> for ConnectionManager<T> {
        fn connection<'a>(
            &'a self,
            event_handler: Option<UnboundedSender<Frame>>,
            error_handler: Option<Sender<Error>>,
            addr: SocketAddr,
        ) -> BoxFuture<'a, Result<T>>;

        fn version(&self) -> Version;
    }
}

/// Performs the connection handshake: `STARTUP`, optional SASL authentication and restoring the
/// session keyspace.
pub async fn startup<T: CqlTransport, A: SaslAuthenticatorProvider + ?Sized>(
    transport: &T,
    authenticator_provider: &A,
    keyspace_holder: &KeyspaceHolder,
    version: Version,
) -> Result<()> {
    let startup_frame = Frame::new_req_startup(version);
    let start_response = transport.write_frame(&startup_frame).await?;

    match start_response.opcode {
        Opcode::Ready => set_keyspace(transport, keyspace_holder, version).await,
        Opcode::Authenticate => {
            authenticate(transport, authenticator_provider, &start_response, version).await?;
            set_keyspace(transport, keyspace_holder, version).await
        }
        opcode => Err(Error::UnexpectedStartupResponse(opcode)),
    }
}

async fn authenticate<T: CqlTransport, A: SaslAuthenticatorProvider + ?Sized>(
    transport: &T,
    authenticator_provider: &A,
    start_response: &Frame,
    version: Version,
) -> Result<()> {
    let body = start_response.response_body()?;
    let server_authenticator = body.authenticator().ok_or_else(|| {
        Error::Authentication(
            "Server requested authentication, but did not name an authenticator!".into(),
        )
    })?;

    let expected_authenticator = authenticator_provider
        .name()
        .ok_or_else(|| Error::Authentication("No authenticator was provided!".into()))?;

    if server_authenticator != expected_authenticator {
        return Err(Error::Authentication(format!(
            "Unsupported authenticator: {server_authenticator}, but {expected_authenticator} is configured!"
        )));
    }

    let authenticator = authenticator_provider.create_authenticator();
    let response = authenticator.initial_response();
    let mut frame = write_auth_frame(transport, Frame::new_req_auth_response(response, version))
        .await?;

    loop {
        match frame.response_body()? {
            ResponseBody::AuthChallenge(challenge) => {
                let response = authenticator.evaluate_challenge(challenge.data)?;
                frame =
                    write_auth_frame(transport, Frame::new_req_auth_response(response, version))
                        .await?;
            }
            ResponseBody::AuthSuccess(success) => {
                return authenticator.handle_success(success.data);
            }
            _ => {
                return Err(Error::Authentication(format!(
                    "Unexpected auth response: {}",
                    frame.opcode
                )))
            }
        }
    }
}

async fn write_auth_frame<T: CqlTransport>(transport: &T, frame: Frame) -> Result<Frame> {
    transport
        .write_frame(&frame)
        .await
        .map_err(|error| match error {
            Error::Server { body, .. } => Error::Authentication(body.message),
            error => error,
        })
}

async fn set_keyspace<T: CqlTransport>(
    transport: &T,
    keyspace_holder: &KeyspaceHolder,
    version: Version,
) -> Result<()> {
    if let Some(current_keyspace) = keyspace_holder.current_keyspace() {
        let use_frame = use_keyspace_frame(&current_keyspace, version);
        transport.write_frame(&use_frame).await.map(|_| ())
    } else {
        Ok(())
    }
}

/// Creates a `USE` statement switching to the given keyspace.
pub(crate) fn use_keyspace_frame(keyspace: &str, version: Version) -> Frame {
    Frame::new_req_query(
        format!("USE \"{}\"", keyspace.replace('"', "\"\"")),
        Default::default(),
        version,
    )
}
