/// Where a publisher is in the connect and publish sequence
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum SessionState {
    WaitingConnect,
    WaitingFcPublish,
    WaitingPublish,
    Published,
    Terminated,
}
