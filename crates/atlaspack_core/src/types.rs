pub use self::asset::*;
pub use self::bundle::*;
pub use self::dependency::*;
pub use self::file_type::*;
pub use self::target::*;

mod asset;
mod bundle;
mod dependency;
mod file_type;
mod target;
