pub use coupons::CouponController;

pub mod coupons;
