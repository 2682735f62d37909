mod keys;
mod source;
mod store;

pub use keys::{load_private_key, load_public_key, FsKeyLoader, KeyLoader};
pub use source::{ConfigSource, EnvSource, FileSource, LayeredSource, MapSource};
pub use store::ValueStore;
