pub mod config;
pub mod decode;
pub mod device;
pub mod meta;
pub mod pipeline;
pub mod playback;
pub mod queue;
pub mod resample;
pub mod source;
pub mod status;
