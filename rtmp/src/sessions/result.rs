use super::events::ServerSessionEvent;
use crate::chunk_io::Packet;
use crate::messages::MessagePayload;
use bytes::Bytes;

/// A single result that is returned when a server session processes some bytes
#[derive(PartialEq, Debug)]
pub enum ServerSessionResult {
    /// A packet that is slated to be sent to the peer.  Packets must be sent in the order they
    /// were returned, otherwise the peer will fail to decode them.
    OutboundResponse(Packet),

    /// A piece of the FLV stream made from the published media.  The first piece is the FLV file
    /// header and every following piece is one complete tag.
    FlvTag(Bytes),

    /// An event the server session is raising so consuming applications can perform custom logic
    RaisedEvent(ServerSessionEvent),

    /// The server session received a message that it could not handle.  This result
    /// allows the consumer application to do something with it if it wants to (special logging)
    UnhandleableMessageReceived(MessagePayload),
}
