pub use coupon::CouponService;

pub mod coupon;
