//! MongoDB connection.

mod mongo;

pub use mongo::Database;
