//! Page controllers. Each keeps a local copy of the records it shows and
//! mirrors successful mutations into it instead of reloading.

pub mod contacts;
pub mod deals;
pub mod tasks;

pub use contacts::ContactsPage;
pub use deals::DealsPage;
pub use tasks::TasksPage;
