pub use ethereum_types::{Address, H128, H160, H256};

pub mod builder;
pub mod codec;
pub mod constants;
pub mod error;
pub mod stats;
pub mod trace;
pub mod types;

pub use builder::BlockAccessListBuilder;
pub use codec::Profile;
pub use error::BalError;
