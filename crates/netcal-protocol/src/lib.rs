pub mod messages;
pub mod run;

pub use messages::*;
pub use run::RunIdentifier;
