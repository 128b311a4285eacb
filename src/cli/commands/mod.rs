//! One module per subcommand.

pub mod account;
pub mod lock;
pub mod rotate;
pub mod status;
pub mod token;
pub mod unlock;
pub mod verify;
