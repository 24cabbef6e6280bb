pub mod backoff;
pub mod multiplexer;
pub mod protocol;

pub use multiplexer::{FeedMultiplexer, FeedMultiplexerConfig, ListenerId};
pub use protocol::{FeedMessage, Topic, WsAssetCtx, WsTrade};
