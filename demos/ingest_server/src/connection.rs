use crate::output::MediaOutput;
use crate::{spawn, BoxError};
use bytes::BytesMut;
use ingest_rtmp::chunk_io::Packet;
use ingest_rtmp::sessions::{
    ServerSession, ServerSessionConfig, ServerSessionEvent, ServerSessionResult,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, PartialEq, Eq)]
enum ConnectionAction {
    None,
    Disconnect,
}

/// One publisher's connection, from the first handshake byte to disconnect
pub struct Connection {
    id: u32,
    session: ServerSession,
    output: Option<MediaOutput>,
}

impl Connection {
    pub fn new(id: u32, config: ServerSessionConfig, output: Option<MediaOutput>) -> Connection {
        Connection {
            id,
            session: ServerSession::new(config),
            output,
        }
    }

    pub async fn run(mut self, stream: TcpStream) -> Result<(), BoxError> {
        let (mut reader, writer) = tokio::io::split(stream);
        let (packet_sender, packet_receiver) = mpsc::unbounded_channel();
        spawn(connection_writer(self.id, writer, packet_receiver));

        let mut buffer = BytesMut::with_capacity(4096);
        loop {
            buffer.reserve(4096);
            let bytes_read = reader.read_buf(&mut buffer).await?;
            if bytes_read == 0 {
                break;
            }

            let input = buffer.split().freeze();
            let results = self.session.handle_input(&input)?;
            let action = self.handle_results(results, &packet_sender).await?;
            if action == ConnectionAction::Disconnect {
                break;
            }
        }

        self.session.abort();
        if let Some(output) = self.output.as_mut() {
            output.finish().await?;
        }

        info!(connection_id = self.id, "Client disconnected");
        Ok(())
    }

    async fn handle_results(
        &mut self,
        results: Vec<ServerSessionResult>,
        packet_sender: &mpsc::UnboundedSender<Packet>,
    ) -> Result<ConnectionAction, BoxError> {
        for result in results {
            match result {
                ServerSessionResult::OutboundResponse(packet) => {
                    if packet_sender.send(packet).is_err() {
                        return Ok(ConnectionAction::Disconnect);
                    }
                }

                ServerSessionResult::FlvTag(tag) => {
                    if let Some(output) = self.output.as_mut() {
                        output.write(&tag).await?;
                    }
                }

                ServerSessionResult::RaisedEvent(event) => {
                    if self.handle_event(event) == ConnectionAction::Disconnect {
                        return Ok(ConnectionAction::Disconnect);
                    }
                }

                ServerSessionResult::UnhandleableMessageReceived(payload) => {
                    debug!(
                        connection_id = self.id,
                        type_id = payload.type_id,
                        "Ignoring unhandled message"
                    );
                }
            }
        }

        Ok(ConnectionAction::None)
    }

    fn handle_event(&self, event: ServerSessionEvent) -> ConnectionAction {
        match event {
            ServerSessionEvent::AppNameRejected { required, actual } => {
                warn!(connection_id = self.id, %required, %actual, "Application rejected");
                ConnectionAction::Disconnect
            }

            ServerSessionEvent::StreamKeyRejected { required, actual } => {
                warn!(connection_id = self.id, %required, %actual, "Stream key rejected");
                ConnectionAction::Disconnect
            }

            ServerSessionEvent::PublishStarted {
                app_name,
                stream_key,
                stream_id,
            } => {
                info!(
                    connection_id = self.id,
                    %app_name,
                    %stream_key,
                    stream_id,
                    "Publishing started"
                );
                ConnectionAction::None
            }

            ServerSessionEvent::SessionTerminated {
                app_name,
                stream_key,
                stream_id,
            } => {
                info!(
                    connection_id = self.id,
                    %app_name,
                    %stream_key,
                    stream_id,
                    "Publishing finished"
                );
                ConnectionAction::None
            }

            ServerSessionEvent::ClientChunkSizeChanged { new_chunk_size } => {
                debug!(connection_id = self.id, new_chunk_size, "Client chunk size changed");
                ConnectionAction::None
            }
        }
    }
}

/// Writes outbound packets in the order the session produced them
async fn connection_writer(
    connection_id: u32,
    mut stream: WriteHalf<TcpStream>,
    mut packets_to_send: mpsc::UnboundedReceiver<Packet>,
) -> Result<(), BoxError> {
    while let Some(packet) = packets_to_send.recv().await {
        stream.write_all(&packet.bytes).await?;
    }

    debug!(connection_id, "Writer disconnected");
    Ok(())
}
