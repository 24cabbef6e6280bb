pub mod aggregator;
pub mod buffers;
pub mod classifier;
pub mod state;
pub mod threshold;
pub mod types;

pub use state::MarketState;
pub use types::{
    ClassifiedEvent, Direction, EventKind, PriceSample, Side, TimeframeSnapshot, Trade,
    WhaleTrade,
};
