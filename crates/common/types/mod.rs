mod block_access_list;
mod primitives;

pub use block_access_list::*;
pub use primitives::*;
