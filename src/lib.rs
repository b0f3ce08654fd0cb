mod database {
    pub mod actions;
    pub mod composition;
    pub mod error;
    pub mod form;
    pub mod pagination;
    pub mod schema;
    pub mod store;
}
mod constants;
mod images;

pub use constants::*;
pub use database::*;
pub use images::*;
