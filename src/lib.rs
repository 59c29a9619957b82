pub mod background;
pub mod config;
pub mod content;
pub mod dom;
pub mod engine;
pub mod messaging;
pub mod net;
pub mod sidepanel;
