pub mod jwt;

pub use jwt::{create_access_token, verify_jwt, Claims};
