mod color;
mod html;

pub use color::*;
pub use html::*;
