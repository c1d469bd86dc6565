pub mod channel;
pub mod video;

pub use channel::ChannelFlow;
pub use video::VideoFlow;
