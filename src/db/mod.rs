pub mod locations;
pub mod models;
pub mod users;
