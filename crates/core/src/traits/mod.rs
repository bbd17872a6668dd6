pub mod clock;
pub mod datastore;
pub mod inference;
pub mod message_queue;

pub use clock::*;
pub use datastore::*;
pub use inference::*;
pub use message_queue::*;
