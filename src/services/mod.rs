pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, OperatorProfile};
pub use auth_service_impl::OperatorAuthService;

pub mod rate_limit;
pub use rate_limit::{Admission, RateLimiter, SweeperHandle};

pub mod token;
pub use token::{TokenClaims, TokenError, TokenIssuer};
