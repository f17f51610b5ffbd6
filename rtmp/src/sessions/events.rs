/// An event that a server session can raise
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum ServerSessionEvent {
    /// The publisher connected on an application other than the required one.  The session
    /// returned to its pre-handshake state.
    AppNameRejected { required: String, actual: String },

    /// The publisher asked to publish on a stream key other than the required one.  The session
    /// returned to its pre-handshake state.
    StreamKeyRejected { required: String, actual: String },

    /// The publisher was told it may start sending media
    PublishStarted {
        app_name: String,
        stream_key: String,
        stream_id: u32,
    },

    /// The publisher unpublished its stream
    SessionTerminated {
        app_name: String,
        stream_key: String,
        stream_id: u32,
    },

    /// The peer changed the chunk size it sends with
    ClientChunkSizeChanged { new_chunk_size: u32 },
}
