use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 创建优惠券请求
/// 业务校验(优惠码, 折扣, 过期时间)在服务层完成, 这里只校验列长度
/// 折扣按原始数字文本解析, 不经过 f64
#[derive(Debug, Default, Validate, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ReqCoupon {
    pub code: Option<String>,
    #[validate(length(max = 255, message = "description must not exceed 255 characters"))]
    pub description: Option<String>,
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    pub discount_value: Option<Decimal>,
    pub expiration_date: Option<NaiveDateTime>,
    pub published: Option<bool>,
}
