use std::fmt::{Display, Formatter};

use chrono::NaiveDateTime;
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use uuid::Uuid;

use common::error::ApiError;
use common::{ReqCoupon, ResCoupon};

pub const CODE_LENGTH: usize = 6;

pub const MSG_CODE_LENGTH: &str = "coupon code must contain exactly 6 alphanumeric characters";
pub const MSG_MIN_DISCOUNT: &str = "minimum discount is 0.5";
pub const MSG_EXPIRATION_REQUIRED: &str = "expiration date must be provided";
pub const MSG_EXPIRATION_PAST: &str = "expiration date must be a future date";
pub const MSG_DESCRIPTION_BLANK: &str = "description must not be blank";
pub const MSG_ALREADY_DELETED: &str = "coupon is already deleted";
pub const MSG_CODE_EXISTS: &str = "a coupon with this code already exists";

lazy_static! {
    static ref NON_ALPHANUMERIC: Regex = Regex::new(r"[^a-zA-Z0-9]").unwrap();
}

/// 最低折扣 0.5
fn min_discount() -> Decimal {
    Decimal::new(5, 1)
}

/// 清洗优惠码: 去掉非字母数字字符后转大写
pub fn sanitize_code(raw: Option<&str>) -> Option<String> {
    raw.map(|code| NON_ALPHANUMERIC.replace_all(code, "").to_uppercase())
}

/// 实体内部的校验错误, 服务层负责转换成业务错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CouponError {
    InvalidArgument(&'static str),
    InvalidState(&'static str),
}

impl Display for CouponError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CouponError::InvalidArgument(msg) | CouponError::InvalidState(msg) => {
                write!(f, "{}", msg)
            }
        }
    }
}

impl std::error::Error for CouponError {}

impl From<CouponError> for ApiError {
    fn from(e: CouponError) -> Self {
        ApiError::Error(e.to_string())
    }
}

/// 已通过创建校验的优惠券; id 为空表示尚未入库
#[derive(Debug, Clone, PartialEq)]
pub struct Coupon {
    pub(crate) id: Option<Uuid>,
    pub(crate) code: String,
    pub(crate) description: String,
    pub(crate) discount_value: Decimal,
    pub(crate) expiration_date: NaiveDateTime,
    pub(crate) published: bool,
    pub(crate) deleted: bool,
}

impl Coupon {
    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn discount_value(&self) -> Decimal {
        self.discount_value
    }

    pub fn expiration_date(&self) -> NaiveDateTime {
        self.expiration_date
    }

    pub fn published(&self) -> bool {
        self.published
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// 软删除, 不能重复删除
    pub fn soft_delete(&mut self) -> Result<(), CouponError> {
        if self.deleted {
            return Err(CouponError::InvalidState(MSG_ALREADY_DELETED));
        }
        self.deleted = true;
        Ok(())
    }

    pub fn restore(&mut self) {
        self.deleted = false;
    }

    /// 每次写库前调用
    pub fn sanitize(&mut self) {
        if let Some(code) = sanitize_code(Some(&self.code)) {
            self.code = code;
        }
    }

    /// 是否可以在 `now` 使用
    pub fn is_redeemable(&self, now: NaiveDateTime) -> bool {
        !self.deleted && self.published && self.expiration_date >= now
    }
}

/// 只有入库后的优惠券才能对外输出
impl TryFrom<Coupon> for ResCoupon {
    type Error = ApiError;

    fn try_from(coupon: Coupon) -> Result<Self, Self::Error> {
        let id = coupon
            .id
            .ok_or_else(|| ApiError::Internal(format!("coupon {} has not been saved", coupon.code)))?;

        Ok(ResCoupon {
            id,
            code: coupon.code,
            description: coupon.description,
            discount_value: coupon.discount_value,
            expiration_date: coupon.expiration_date,
            published: coupon.published,
        })
    }
}

/// 创建请求转换后的草稿, 校验通过后才会得到 [`Coupon`]
#[derive(Debug, Clone, Default)]
pub struct NewCoupon {
    pub code: Option<String>,
    pub description: Option<String>,
    pub discount_value: Option<Decimal>,
    pub expiration_date: Option<NaiveDateTime>,
    pub published: bool,
}

impl From<ReqCoupon> for NewCoupon {
    fn from(req: ReqCoupon) -> Self {
        NewCoupon {
            code: sanitize_code(req.code.as_deref()),
            description: req.description,
            discount_value: req.discount_value,
            expiration_date: req.expiration_date,
            published: req.published.unwrap_or(false),
        }
    }
}

impl NewCoupon {
    /// 按顺序校验: 优惠码长度, 折扣, 过期时间是否填写, 过期时间是否已过, 描述
    pub fn validate_for_creation(self, now: NaiveDateTime) -> Result<Coupon, CouponError> {
        let code = match self.code {
            Some(code) if code.chars().count() == CODE_LENGTH => code,
            _ => return Err(CouponError::InvalidArgument(MSG_CODE_LENGTH)),
        };

        let discount_value = match self.discount_value {
            Some(value) if value >= min_discount() => value,
            _ => return Err(CouponError::InvalidArgument(MSG_MIN_DISCOUNT)),
        };

        let expiration_date = self
            .expiration_date
            .ok_or(CouponError::InvalidArgument(MSG_EXPIRATION_REQUIRED))?;
        if expiration_date < now {
            return Err(CouponError::InvalidArgument(MSG_EXPIRATION_PAST));
        }

        let description = match self.description {
            Some(description) if !description.trim().is_empty() => description,
            _ => return Err(CouponError::InvalidArgument(MSG_DESCRIPTION_BLANK)),
        };

        Ok(Coupon {
            id: None,
            code,
            description,
            discount_value,
            expiration_date,
            published: self.published,
            deleted: false,
        })
    }
}
