use chrono::Local;
use tracing::{info, warn};
use uuid::Uuid;

use common::error::{ApiError, ApiResult};
use common::{ReqCoupon, ResCoupon};

use crate::models::coupons::{MSG_ALREADY_DELETED, MSG_CODE_EXISTS};
use crate::models::{CouponStore, CouponTx, NewCoupon};

pub const MSG_NONE_VALID: &str = "no valid coupon found";
pub const MSG_NOT_FOUND: &str = "no coupon found with the given id";

/// 优惠券业务, 每个操作一个工作单元, 只有成功时才提交
pub struct CouponService<S> {
    store: S,
}

impl<S: CouponStore> CouponService<S> {
    pub fn new(store: S) -> Self {
        CouponService { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// 创建优惠券
    #[tracing::instrument(name = "create coupon", skip(self, req), fields(code = ?req.code))]
    pub async fn create(&self, req: ReqCoupon) -> ApiResult<ResCoupon> {
        let mut tx = self.store.begin().await?;
        let new_coupon = NewCoupon::from(req);

        // 快速拒绝, 真正兜底的是库里的唯一索引
        if let Some(code) = new_coupon.code.as_deref() {
            if tx.exists_by_code(code).await? {
                warn!("coupon code {} already exists", code);
                return Err(ApiError::Error(MSG_CODE_EXISTS.to_string()));
            }
        }

        let coupon = new_coupon
            .validate_for_creation(Local::now().naive_local())
            .map_err(|e| {
                warn!("coupon rejected: {}", e);
                ApiError::from(e)
            })?;

        let saved = tx.save(coupon).await?;
        tx.commit().await?;

        info!(id = ?saved.id(), code = %saved.code(), "coupon created");
        ResCoupon::try_from(saved)
    }

    /// 未删除的优惠券列表, 一条都没有时报错
    #[tracing::instrument(name = "list valid coupons", skip(self))]
    pub async fn list_valid_coupon(&self) -> ApiResult<Vec<ResCoupon>> {
        let mut tx = self.store.begin().await?;
        let coupons = match tx.find_all_not_deleted().await? {
            Some(coupons) => coupons,
            None => {
                warn!("no valid coupon in store");
                return Err(ApiError::Error(MSG_NONE_VALID.to_string()));
            }
        };
        tx.commit().await?;

        coupons
            .into_iter()
            .map(ResCoupon::try_from)
            .collect::<ApiResult<Vec<ResCoupon>>>()
    }

    /// 软删除
    #[tracing::instrument(name = "delete coupon", skip(self))]
    pub async fn delete_by_id(&self, id: Uuid) -> ApiResult<bool> {
        let mut tx = self.store.begin().await?;
        let mut coupon = match tx.find_by_id(id).await? {
            Some(coupon) => coupon,
            None => {
                warn!("coupon {} not found", id);
                return Err(ApiError::Error(MSG_NOT_FOUND.to_string()));
            }
        };

        coupon.soft_delete().map_err(|e| {
            warn!("coupon {} rejected: {}", id, e);
            ApiError::from(e)
        })?;

        // 条件更新, 并发删除时只有一个能成功
        if tx.soft_delete_by_id(id).await? == 0 {
            warn!("coupon {} deleted concurrently", id);
            return Err(ApiError::Error(MSG_ALREADY_DELETED.to_string()));
        }
        tx.commit().await?;

        info!(code = %coupon.code(), "coupon deleted");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDateTime};
    use rust_decimal::Decimal;

    use crate::models::coupons::{MSG_CODE_LENGTH, MSG_EXPIRATION_PAST, MSG_MIN_DISCOUNT};
    use crate::models::memory::MemoryTx;
    use crate::models::{Coupon, MemoryCouponStore};

    use super::*;

    fn now() -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn request(code: Option<&str>, discount: Decimal, days: i64, published: Option<bool>) -> ReqCoupon {
        ReqCoupon {
            code: code.map(str::to_string),
            description: Some("desc".to_string()),
            discount_value: Some(discount),
            expiration_date: Some(now() + Duration::days(days)),
            published,
        }
    }

    fn stored(code: &str, deleted: bool) -> Coupon {
        Coupon {
            id: Some(Uuid::new_v4()),
            code: code.to_string(),
            description: "d".to_string(),
            discount_value: Decimal::ONE,
            expiration_date: now() + Duration::days(5),
            published: true,
            deleted,
        }
    }

    fn business(msg: &str) -> ApiError {
        ApiError::Error(msg.to_string())
    }

    #[tokio::test]
    async fn create_saves_and_returns_response() {
        let service = CouponService::new(MemoryCouponStore::new());

        let res = service
            .create(request(Some("ABCD12"), Decimal::new(150, 2), 10, Some(true)))
            .await
            .unwrap();

        assert_eq!(res.code, "ABCD12");
        assert_eq!(res.discount_value, Decimal::new(150, 2));
        assert!(res.published);

        let rows = service.store().snapshot().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, Some(res.id));
        assert_eq!(rows[0].code, "ABCD12");
        assert_eq!(rows[0].description, "desc");
        assert!(!rows[0].deleted);
    }

    #[tokio::test]
    async fn create_uses_sanitized_code_for_lookup_and_write() {
        let service = CouponService::new(MemoryCouponStore::new());
        let res = service
            .create(request(Some("ab.cd12"), Decimal::ONE, 1, None))
            .await
            .unwrap();

        assert_eq!(res.code, "ABCD12");
        assert!(!res.published);
        assert_eq!(service.store().snapshot().await[0].code, "ABCD12");

        let err = service
            .create(request(Some("AB-CD-12"), Decimal::ONE, 1, None))
            .await
            .unwrap_err();
        assert_eq!(err, business(MSG_CODE_EXISTS));
        assert_eq!(service.store().writes(), 1);
    }

    #[tokio::test]
    async fn create_rejects_wrong_code_length() {
        let service = CouponService::new(MemoryCouponStore::new());

        for code in [Some("ab1!"), Some("abc-1234"), Some("!!!!!!"), None] {
            let err = service
                .create(request(code, Decimal::ONE, 1, None))
                .await
                .unwrap_err();
            assert_eq!(err, business(MSG_CODE_LENGTH));
        }
        assert_eq!(service.store().writes(), 0);
    }

    #[tokio::test]
    async fn create_rejects_existing_code() {
        let store = MemoryCouponStore::with_coupons(vec![stored("ABCDEF", false)]);
        let service = CouponService::new(store);

        let err = service
            .create(request(Some("abcDEF"), Decimal::ONE, 1, None))
            .await
            .unwrap_err();

        assert_eq!(err, business(MSG_CODE_EXISTS));
        assert_eq!(service.store().writes(), 0);
    }

    #[tokio::test]
    async fn create_reuses_code_of_deleted_coupon() {
        let store = MemoryCouponStore::with_coupons(vec![stored("ABCDEF", true)]);
        let service = CouponService::new(store);

        let res = service
            .create(request(Some("abcdef"), Decimal::ONE, 1, None))
            .await
            .unwrap();
        assert_eq!(res.code, "ABCDEF");
        assert_eq!(service.store().snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn create_rejects_small_discount() {
        let service = CouponService::new(MemoryCouponStore::new());
        let err = service
            .create(request(Some("ABC123"), Decimal::new(40, 2), 1, None))
            .await
            .unwrap_err();

        assert_eq!(err, business(MSG_MIN_DISCOUNT));
        assert_eq!(service.store().writes(), 0);
    }

    #[tokio::test]
    async fn create_rejects_past_expiration() {
        let service = CouponService::new(MemoryCouponStore::new());
        let err = service
            .create(request(Some("ABC123"), Decimal::ONE, -1, None))
            .await
            .unwrap_err();

        assert_eq!(err, business(MSG_EXPIRATION_PAST));
        assert_eq!(service.store().writes(), 0);
    }

    #[tokio::test]
    async fn list_returns_live_coupons_in_store_order() {
        let store = MemoryCouponStore::with_coupons(vec![
            stored("AAA111", false),
            stored("ZZZ999", true),
            stored("BBB222", false),
        ]);
        let service = CouponService::new(store);

        let res = service.list_valid_coupon().await.unwrap();
        let codes = res.iter().map(|c| c.code.as_str()).collect::<Vec<&str>>();
        assert_eq!(codes, vec!["AAA111", "BBB222"]);
    }

    #[tokio::test]
    async fn list_fails_when_store_reports_none() {
        let store = MemoryCouponStore::with_coupons(vec![stored("ZZZ999", true)]);
        let service = CouponService::new(store);

        let err = service.list_valid_coupon().await.unwrap_err();
        assert_eq!(err, business(MSG_NONE_VALID));
    }

    #[tokio::test]
    async fn delete_marks_coupon_deleted() {
        let coupon = stored("DEL123", false);
        let id = coupon.id.unwrap();
        let service = CouponService::new(MemoryCouponStore::with_coupons(vec![coupon]));

        assert!(service.delete_by_id(id).await.unwrap());
        assert!(service.store().snapshot().await[0].deleted);
    }

    #[tokio::test]
    async fn delete_unknown_id_fails() {
        let service = CouponService::new(MemoryCouponStore::new());
        let err = service.delete_by_id(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err, business(MSG_NOT_FOUND));
    }

    #[tokio::test]
    async fn delete_twice_fails_with_already_deleted() {
        let coupon = stored("DEL123", false);
        let id = coupon.id.unwrap();
        let service = CouponService::new(MemoryCouponStore::with_coupons(vec![coupon]));

        service.delete_by_id(id).await.unwrap();
        let err = service.delete_by_id(id).await.unwrap_err();
        assert_eq!(err, business(MSG_ALREADY_DELETED));
        assert!(service.store().snapshot().await[0].deleted);
    }

    /// 模拟并发: 存在性检查总是放行, 由 save 的唯一约束兜底
    #[derive(Clone)]
    struct RacingStore(MemoryCouponStore);

    struct RacingTx(MemoryTx);

    #[axum::async_trait]
    impl CouponStore for RacingStore {
        type Tx = RacingTx;

        async fn begin(&self) -> ApiResult<RacingTx> {
            Ok(RacingTx(self.0.begin().await?))
        }
    }

    #[axum::async_trait]
    impl CouponTx for RacingTx {
        async fn exists_by_code(&mut self, _code: &str) -> ApiResult<bool> {
            Ok(false)
        }

        async fn find_valid_by_code(
            &mut self,
            code: &str,
            now: NaiveDateTime,
        ) -> ApiResult<Option<Coupon>> {
            self.0.find_valid_by_code(code, now).await
        }

        async fn find_by_id(&mut self, id: Uuid) -> ApiResult<Option<Coupon>> {
            self.0.find_by_id(id).await
        }

        async fn find_all_not_deleted(&mut self) -> ApiResult<Option<Vec<Coupon>>> {
            self.0.find_all_not_deleted().await
        }

        async fn persist(&mut self, coupon: Coupon) -> ApiResult<Coupon> {
            self.0.persist(coupon).await
        }

        async fn soft_delete_by_id(&mut self, id: Uuid) -> ApiResult<u64> {
            self.0.soft_delete_by_id(id).await
        }

        async fn commit(self) -> ApiResult<()> {
            self.0.commit().await
        }
    }

    #[tokio::test]
    async fn unique_constraint_on_save_surfaces_as_duplicate() {
        let inner = MemoryCouponStore::with_coupons(vec![stored("ABCDEF", false)]);
        let service = CouponService::new(RacingStore(inner.clone()));

        let err = service
            .create(request(Some("abcdef"), Decimal::ONE, 1, None))
            .await
            .unwrap_err();

        assert_eq!(err, business(MSG_CODE_EXISTS));
        assert_eq!(inner.writes(), 1);
        assert_eq!(inner.snapshot().await.len(), 1);
    }
}
