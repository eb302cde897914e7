pub mod cookies;
pub mod middleware;
pub mod remote;

pub use middleware::AuthUser;
