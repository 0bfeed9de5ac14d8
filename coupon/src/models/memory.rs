use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::NaiveDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use common::error::{ApiError, ApiResult};

use crate::models::coupons::{Coupon, MSG_CODE_EXISTS};
use crate::models::store::{CouponStore, CouponTx};

/// 内存存储, 本地调试和测试用
/// 工作单元持有整张表的锁, 提交时整体写回
#[derive(Clone, Default)]
pub struct MemoryCouponStore {
    rows: Arc<Mutex<Vec<Coupon>>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryCouponStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置数据, 没有 id 的补一个
    pub fn with_coupons(coupons: Vec<Coupon>) -> Self {
        let rows = coupons
            .into_iter()
            .map(|mut coupon| {
                coupon.id.get_or_insert_with(Uuid::new_v4);
                coupon
            })
            .collect();

        MemoryCouponStore {
            rows: Arc::new(Mutex::new(rows)),
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub async fn snapshot(&self) -> Vec<Coupon> {
        self.rows.lock().await.clone()
    }

    /// persist 被调用的次数, 包括回滚掉的
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[axum::async_trait]
impl CouponStore for MemoryCouponStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> ApiResult<MemoryTx> {
        let guard = self.rows.clone().lock_owned().await;
        let working = guard.clone();

        Ok(MemoryTx {
            guard,
            working,
            writes: self.writes.clone(),
        })
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<Vec<Coupon>>,
    working: Vec<Coupon>,
    writes: Arc<AtomicUsize>,
}

impl MemoryTx {
    /// 模拟 (code) where deleted = false 的唯一索引
    fn code_taken(&self, coupon: &Coupon) -> bool {
        !coupon.deleted
            && self
                .working
                .iter()
                .any(|row| !row.deleted && row.code == coupon.code && row.id != coupon.id)
    }
}

#[axum::async_trait]
impl CouponTx for MemoryTx {
    async fn exists_by_code(&mut self, code: &str) -> ApiResult<bool> {
        Ok(self
            .working
            .iter()
            .any(|row| !row.deleted && row.code == code))
    }

    async fn find_valid_by_code(
        &mut self,
        code: &str,
        now: NaiveDateTime,
    ) -> ApiResult<Option<Coupon>> {
        Ok(self
            .working
            .iter()
            .find(|row| row.code == code && row.is_redeemable(now))
            .cloned())
    }

    async fn find_by_id(&mut self, id: Uuid) -> ApiResult<Option<Coupon>> {
        Ok(self
            .working
            .iter()
            .find(|row| row.id == Some(id))
            .cloned())
    }

    async fn find_all_not_deleted(&mut self) -> ApiResult<Option<Vec<Coupon>>> {
        let coupons = self
            .working
            .iter()
            .filter(|row| !row.deleted)
            .cloned()
            .collect::<Vec<Coupon>>();

        Ok(if coupons.is_empty() { None } else { Some(coupons) })
    }

    async fn persist(&mut self, mut coupon: Coupon) -> ApiResult<Coupon> {
        self.writes.fetch_add(1, Ordering::SeqCst);

        if self.code_taken(&coupon) {
            return Err(ApiError::Error(MSG_CODE_EXISTS.to_string()));
        }

        match coupon.id {
            None => {
                coupon.id = Some(Uuid::new_v4());
                self.working.push(coupon.clone());
            }
            Some(id) => match self.working.iter_mut().find(|row| row.id == Some(id)) {
                Some(row) => *row = coupon.clone(),
                None => return Err(ApiError::Internal(format!("coupon {} does not exist", id))),
            },
        }

        Ok(coupon)
    }

    async fn soft_delete_by_id(&mut self, id: Uuid) -> ApiResult<u64> {
        match self
            .working
            .iter_mut()
            .find(|row| row.id == Some(id) && !row.deleted)
        {
            Some(row) => {
                row.deleted = true;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn commit(self) -> ApiResult<()> {
        let MemoryTx {
            mut guard, working, ..
        } = self;
        *guard = working;
        Ok(())
    }
}
