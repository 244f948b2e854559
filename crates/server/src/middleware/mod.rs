pub mod rate_gate;
pub mod request_user;

pub use request_user::RequestUser;
