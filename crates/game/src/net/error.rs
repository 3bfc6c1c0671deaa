use std::io;

use rkyv::rancor;

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("network i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("command encoding failed: {0}")]
    Encode(rancor::Error),
    #[error("command decoding failed: {0}")]
    Decode(rancor::Error),
    #[error("network already started; start_server and connect may only be called once")]
    AlreadyStarted,
    #[error("only the server can do this")]
    NotServer,
    #[error("no peer at index {0}")]
    UnknownPeer(usize),
    #[error("no clients are connected")]
    NoClients,
    #[error("invalid server advert: {0}")]
    InvalidAdvert(String),
}
