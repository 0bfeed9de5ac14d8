use chrono::NaiveDateTime;
use uuid::Uuid;

use common::error::ApiResult;

use crate::models::coupons::Coupon;

/// 优惠券存储, 每次调用 `begin` 得到一个独立的工作单元
#[axum::async_trait]
pub trait CouponStore: Send + Sync + 'static {
    type Tx: CouponTx;

    async fn begin(&self) -> ApiResult<Self::Tx>;
}

/// 工作单元: 未 commit 就 drop 等同于回滚
#[axum::async_trait]
pub trait CouponTx: Send + Sized {
    /// 未删除的优惠券中是否已存在该优惠码
    async fn exists_by_code(&mut self, code: &str) -> ApiResult<bool>;

    /// 未删除, 已发布且未过期
    async fn find_valid_by_code(
        &mut self,
        code: &str,
        now: NaiveDateTime,
    ) -> ApiResult<Option<Coupon>>;

    async fn find_by_id(&mut self, id: Uuid) -> ApiResult<Option<Coupon>>;

    /// 没有任何未删除的优惠券时返回 None
    async fn find_all_not_deleted(&mut self) -> ApiResult<Option<Vec<Coupon>>>;

    /// 没有 id 时插入并分配 id, 否则更新
    async fn persist(&mut self, coupon: Coupon) -> ApiResult<Coupon>;

    /// 条件更新 `deleted = true`, 返回受影响行数
    async fn soft_delete_by_id(&mut self, id: Uuid) -> ApiResult<u64>;

    async fn commit(self) -> ApiResult<()>;

    /// 写库入口, 写之前总是重新清洗优惠码
    async fn save(&mut self, mut coupon: Coupon) -> ApiResult<Coupon> {
        coupon.sanitize();
        self.persist(coupon).await
    }
}
