mod persist_dir;
mod persist_interface;
mod persist_memory;

pub use persist_dir::DirMap;
pub use persist_interface::*;
pub use persist_memory::MemoryMap;
