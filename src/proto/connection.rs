use futures::{SinkExt, StreamExt};
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::Decoder;
use tracing::debug;

use super::Result;
use super::{codec::QisCodec, command::Command, response::Response, QisError};

trait AsyncReadWrite<S>: futures::Sink<S> + futures::Stream + Send {}

impl<T, S> AsyncReadWrite<S> for T where T: futures::Sink<S> + futures::Stream + Send {}

/// One socket to QIS. Requests are strictly sequential: one command,
/// one reply.
#[allow(clippy::type_complexity)]
pub struct Connection {
    stream: Pin<
        Box<
            dyn AsyncReadWrite<
                Command,
                Error = std::io::Error,
                Item = std::result::Result<Response, std::io::Error>,
            >,
        >,
    >,
}

impl Connection {
    pub async fn connect(addr: impl AsRef<str>) -> Result<Self> {
        let socket = TcpStream::connect(addr.as_ref()).await.map_err(|err| {
            debug!(addr = addr.as_ref(), %err, "QIS connect failed");
            match err.kind() {
                std::io::ErrorKind::ConnectionRefused => {
                    QisError::ServiceUnavailable(addr.as_ref().to_string())
                }
                _ => QisError::Io(err),
            }
        })?;
        socket.set_nodelay(true)?;
        Ok(Self::from_io(socket))
    }

    pub fn from_io<T>(io: T) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let stream = QisCodec::default().framed(io);
        Self {
            stream: Box::pin(stream),
        }
    }

    /// Sends `cmd` and returns the text of the reply.
    pub async fn request(&mut self, cmd: Command) -> Result<String> {
        debug!(%cmd, "QIS request");
        self.stream.send(cmd).await?;
        match self.stream.next().await {
            Some(Ok(Response::Ok(text))) => {
                debug!(reply = %text, "QIS reply");
                Ok(text)
            }
            Some(Ok(response)) => Err(response.into()),
            Some(Err(ioerr)) => Err(ioerr.into()),
            None => Err(QisError::Abort),
        }
    }

    /// Like [`Connection::request`] but expects a plain `OK`.
    pub async fn execute(&mut self, cmd: Command) -> Result<()> {
        let reply = self.request(cmd).await?;
        if reply.eq_ignore_ascii_case("ok") {
            Ok(())
        } else {
            Err(QisError::Unexpected(Response::Ok(reply)))
        }
    }
}
