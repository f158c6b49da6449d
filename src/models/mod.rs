pub mod credentials;
pub mod file;
pub mod project;
pub mod session;
pub mod user;
