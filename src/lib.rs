pub mod api;
pub mod db;
pub mod events;
pub mod models;
pub mod sync;
