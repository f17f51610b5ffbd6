/// The configuration options that govern which publishers a server session accepts and what it
/// produces for them.
///
/// A requirement left as `None` accepts any value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServerSessionConfig {
    /// Application name the `connect` command must request
    pub required_app: Option<String>,

    /// Stream key the publisher must publish on
    pub required_stream_key: Option<String>,

    /// When set, published audio and video are returned as FLV tags
    pub dump_flv: bool,
}

impl ServerSessionConfig {
    /// Creates a config that accepts any publisher and does not produce FLV output
    pub fn new() -> ServerSessionConfig {
        ServerSessionConfig::default()
    }

    pub fn with_required_app(mut self, app: impl Into<String>) -> Self {
        self.required_app = Some(app.into());
        self
    }

    pub fn with_required_stream_key(mut self, stream_key: impl Into<String>) -> Self {
        self.required_stream_key = Some(stream_key.into());
        self
    }

    pub fn with_flv_output(mut self, enabled: bool) -> Self {
        self.dump_flv = enabled;
        self
    }
}
