pub use coupons::{sanitize_code, Coupon, CouponError, NewCoupon};
pub use memory::MemoryCouponStore;
pub use pg::PgCouponStore;
pub use store::{CouponStore, CouponTx};

pub mod coupons;
pub mod memory;
pub mod pg;
pub mod store;
