pub mod delete;
pub mod health;
pub mod upload;
pub mod url;
