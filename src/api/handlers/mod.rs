pub mod admin;
pub mod admin_uploads;
pub mod auth;
pub mod health;
pub mod purchases;
pub mod reviews;
pub mod videos;
