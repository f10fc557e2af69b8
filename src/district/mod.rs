mod district;
mod io;

pub use district::*;
pub use io::*;
