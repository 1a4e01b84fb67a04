mod flush;
mod meta;
mod render;

pub use flush::flush;
pub use meta::{health, ping, start, stop, version};
pub use render::render;
