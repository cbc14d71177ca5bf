use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use uuid::Uuid;

use crate::codec::{Error, FrameCodec};
use crate::frame::Frame;
use crate::reply::Reply;

/// A client connection. Bytes read from the socket are buffered by the codec until a whole frame
/// is available; when a frame is parsed, the corresponding data is removed from the buffer.
pub struct Connection {
    pub id: Uuid,
    pub client_address: SocketAddr,
    framed: Framed<TcpStream, FrameCodec>,
}

impl Connection {
    pub fn new(stream: TcpStream, client_address: SocketAddr) -> Connection {
        Self::with_codec(stream, client_address, FrameCodec::default())
    }

    pub fn with_codec(
        stream: TcpStream,
        client_address: SocketAddr,
        codec: FrameCodec,
    ) -> Connection {
        Connection {
            id: Uuid::new_v4(),
            client_address,
            framed: Framed::new(stream, codec),
        }
    }

    /// Reads the next frame. Returns `None` once the peer closed the connection cleanly, between
    /// frames. A close in the middle of a frame is an error and the partial data is dropped.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, Error> {
        self.framed.next().await.transpose()
    }

    pub async fn write_reply(&mut self, reply: Reply) -> Result<(), Error> {
        self.framed.send(reply).await
    }
}
