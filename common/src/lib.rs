pub use application::*;
pub use request::{JsonBody, ReqCoupon};
pub use response::{ApiResponse, ResCoupon};
pub use utils::*;

pub mod application;
pub mod error;
pub mod request;
pub mod response;
pub mod utils;
