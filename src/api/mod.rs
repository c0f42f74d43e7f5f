pub mod query;

pub use query::{eq_filter, ListQuery};
