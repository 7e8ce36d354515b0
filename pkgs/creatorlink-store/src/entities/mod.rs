//! Sea-ORM entities for creatorlink-store

pub mod conversations;
pub mod messages;
pub mod profiles;

pub use conversations::Entity as Conversations;
pub use messages::Entity as Messages;
pub use profiles::Entity as Profiles;
