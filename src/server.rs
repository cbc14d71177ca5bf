use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time;
use tracing::{debug, error, info, instrument, warn};

use crate::codec::{self, FrameCodec};
use crate::commands::executable::Executable;
use crate::commands::Command;
use crate::config::Config;
use crate::connection::Connection;
use crate::frame::Frame;
use crate::reply::Reply;
use crate::store::Store;
use crate::Error;

// Pause after a failed accept, so a listener out of file descriptors doesn't spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Binds the listener described by `config` and serves clients until the process exits.
pub async fn run(config: Config) -> Result<(), Error> {
    let _ = tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let listener = TcpListener::bind((config.bind.as_str(), config.port)).await?;
    let store = Store::new();

    serve(listener, store, config).await
}

/// Accepts connections on an already bound listener, running one task per client. All of them
/// share `store`.
pub async fn serve(listener: TcpListener, store: Store, config: Config) -> Result<(), Error> {
    info!("Server listening on {}", listener.local_addr()?);

    loop {
        let (socket, client_address) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };
        info!("Accepted connection from {:?}", client_address);

        let conn = Connection::with_codec(
            socket,
            client_address,
            FrameCodec::new(config.max_frame_size),
        );
        let store = store.clone();
        let config = config.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(conn, store, config).await {
                error!("Connection error: {}", e);
            }
        });
    }
}

#[instrument(
    name = "connection",
    skip(conn, store, config),
    fields(connection_id = %conn.id, client_address = %conn.client_address)
)]
async fn handle_connection(
    mut conn: Connection,
    store: Store,
    config: Config,
) -> Result<(), Error> {
    loop {
        let frame = match read_frame(&mut conn, &config).await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(ReadError::Timeout) => {
                info!("Closing idle connection");
                return Ok(());
            }
            Err(ReadError::Codec(codec::Error::Io(e))) => {
                // Also covers a peer closing the socket halfway through a frame.
                info!("Connection closed: {}", e);
                return Ok(());
            }
            Err(ReadError::Codec(e)) => {
                warn!("Closing connection after protocol error: {}", e);
                return send_protocol_error(&mut conn, e.to_string()).await;
            }
        };

        debug!("Received frame from client: {}", frame);

        let res = match Command::try_from(frame) {
            Ok(cmd) => {
                debug!("Executing command: {:?}", cmd);
                cmd.exec(store.clone())?
            }
            Err(e) if e.is_recoverable() => {
                debug!("Rejected command: {}", e);
                e.to_reply()
            }
            Err(e) => {
                warn!("Closing connection after malformed request: {}", e);
                return send_protocol_error(&mut conn, e.to_string()).await;
            }
        };

        debug!("Sending response to client: {:?}", res);
        conn.write_reply(res).await?;
    }

    info!("Connection closed");
    Ok(())
}

enum ReadError {
    Timeout,
    Codec(codec::Error),
}

async fn read_frame(
    conn: &mut Connection,
    config: &Config,
) -> Result<Option<Frame>, ReadError> {
    let read = conn.read_frame();

    let res = match config.idle_timeout {
        Some(timeout) => time::timeout(timeout, read)
            .await
            .map_err(|_| ReadError::Timeout)?,
        None => read.await,
    };

    res.map_err(ReadError::Codec)
}

/// Writes a best-effort diagnostic before the connection is dropped. The stream can't be trusted
/// to be in sync anymore, so nothing else is read from it.
async fn send_protocol_error(conn: &mut Connection, detail: String) -> Result<(), Error> {
    let reply = Reply::Error(format!("ERR {}", detail));
    if let Err(e) = conn.write_reply(reply).await {
        debug!("Failed to send protocol error: {}", e);
    }
    Ok(())
}
