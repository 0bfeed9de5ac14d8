use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use common::error::{ApiError, ApiResult};
use common::pgsql::ConnPool;

use crate::models::coupons::{Coupon, MSG_CODE_EXISTS};
use crate::models::store::{CouponStore, CouponTx};

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct PgCouponStore {
    pool: ConnPool,
}

impl PgCouponStore {
    pub fn new(pool: ConnPool) -> Self {
        PgCouponStore { pool }
    }

    pub async fn migrate(&self) -> ApiResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[axum::async_trait]
impl CouponStore for PgCouponStore {
    type Tx = PgCouponTx;

    async fn begin(&self) -> ApiResult<PgCouponTx> {
        Ok(PgCouponTx {
            tx: self.pool.begin().await?,
        })
    }
}

/// 一个 postgres 事务, drop 时自动回滚
pub struct PgCouponTx {
    tx: Transaction<'static, Postgres>,
}

fn coupon_from_row(row: PgRow) -> ApiResult<Coupon> {
    Ok(Coupon {
        id: Some(row.try_get::<Uuid, &str>("id")?),
        code: row.try_get("code")?,
        description: row.try_get("description")?,
        discount_value: row.try_get::<Decimal, &str>("discount_value")?,
        expiration_date: row.try_get::<NaiveDateTime, &str>("expiration_date")?,
        published: row.try_get::<bool, &str>("published")?,
        deleted: row.try_get::<bool, &str>("deleted")?,
    })
}

/// 部分唯一索引冲突转成业务错误
fn map_write_err(e: sqlx::Error) -> ApiError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return ApiError::Error(MSG_CODE_EXISTS.to_string());
        }
    }
    ApiError::from(e)
}

#[axum::async_trait]
impl CouponTx for PgCouponTx {
    async fn exists_by_code(&mut self, code: &str) -> ApiResult<bool> {
        Ok(sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM coupon WHERE deleted = false AND code = $1) AS exist",
        )
        .bind(code)
        .fetch_one(&mut *self.tx)
        .await?
        .try_get::<bool, &str>("exist")?)
    }

    async fn find_valid_by_code(
        &mut self,
        code: &str,
        now: NaiveDateTime,
    ) -> ApiResult<Option<Coupon>> {
        sqlx::query(
            r#"SELECT id,code,description,discount_value,expiration_date,published,deleted
    FROM coupon WHERE deleted = false AND code = $1 AND published = true AND expiration_date >= $2"#,
        )
        .bind(code)
        .bind(now)
        .fetch_optional(&mut *self.tx)
        .await?
        .map(coupon_from_row)
        .transpose()
    }

    async fn find_by_id(&mut self, id: Uuid) -> ApiResult<Option<Coupon>> {
        sqlx::query(
            r#"SELECT id,code,description,discount_value,expiration_date,published,deleted
    FROM coupon WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?
        .map(coupon_from_row)
        .transpose()
    }

    async fn find_all_not_deleted(&mut self) -> ApiResult<Option<Vec<Coupon>>> {
        let coupons = sqlx::query(
            r#"SELECT id,code,description,discount_value,expiration_date,published,deleted
    FROM coupon WHERE deleted = false ORDER BY expiration_date ASC, code ASC"#,
        )
        .fetch_all(&mut *self.tx)
        .await?
        .into_iter()
        .map(coupon_from_row)
        .collect::<ApiResult<Vec<Coupon>>>()?;

        // 没有数据时按 "不存在" 处理
        Ok(if coupons.is_empty() { None } else { Some(coupons) })
    }

    async fn persist(&mut self, mut coupon: Coupon) -> ApiResult<Coupon> {
        match coupon.id {
            None => {
                let id = Uuid::new_v4();
                sqlx::query(
                    "INSERT INTO coupon (id,code,description,discount_value,expiration_date,\
    published,deleted) VALUES ($1,$2,$3,$4,$5,$6,$7)",
                )
                .bind(id)
                .bind(&coupon.code)
                .bind(&coupon.description)
                .bind(coupon.discount_value)
                .bind(coupon.expiration_date)
                .bind(coupon.published)
                .bind(coupon.deleted)
                .execute(&mut *self.tx)
                .await
                .map_err(map_write_err)?;

                coupon.id = Some(id);
            }
            Some(id) => {
                let rows_num = sqlx::query(
                    "UPDATE coupon SET code=$1,description=$2,discount_value=$3,\
    expiration_date=$4,published=$5,deleted=$6 WHERE id = $7",
                )
                .bind(&coupon.code)
                .bind(&coupon.description)
                .bind(coupon.discount_value)
                .bind(coupon.expiration_date)
                .bind(coupon.published)
                .bind(coupon.deleted)
                .bind(id)
                .execute(&mut *self.tx)
                .await
                .map_err(map_write_err)?
                .rows_affected();

                if rows_num == 0 {
                    return Err(ApiError::Internal(format!("coupon {} does not exist", id)));
                }
            }
        }

        Ok(coupon)
    }

    async fn soft_delete_by_id(&mut self, id: Uuid) -> ApiResult<u64> {
        Ok(
            sqlx::query("UPDATE coupon SET deleted = true WHERE id = $1 AND deleted = false")
                .bind(id)
                .execute(&mut *self.tx)
                .await?
                .rows_affected(),
        )
    }

    async fn commit(self) -> ApiResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt::{Display, Formatter};

    use chrono::{Duration, Local};
    use sqlx::error::DatabaseError;
    use sqlx::postgres::PgPoolOptions;

    use crate::models::coupons::{NewCoupon, CODE_LENGTH};

    use super::*;

    #[derive(Debug)]
    struct CodedError(&'static str);

    impl Display for CodedError {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            write!(f, "database error {}", self.0)
        }
    }

    impl StdError for CodedError {}

    impl DatabaseError for CodedError {
        fn message(&self) -> &str {
            "database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.0))
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }
    }

    #[test]
    fn unique_violation_becomes_duplicate_code() {
        let err = map_write_err(sqlx::Error::Database(Box::new(CodedError(UNIQUE_VIOLATION))));
        assert_eq!(err, ApiError::Error(MSG_CODE_EXISTS.to_string()));
    }

    #[test]
    fn other_write_errors_are_internal() {
        let err = map_write_err(sqlx::Error::Database(Box::new(CodedError("23503"))));
        assert!(matches!(err, ApiError::Internal(_)));

        let err = map_write_err(sqlx::Error::RowNotFound);
        assert!(matches!(err, ApiError::Internal(_)));
    }

    /// 需要一个可用的 postgres: DATABASE_URL=postgres://... cargo test -- --ignored
    async fn store() -> PgCouponStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .unwrap();
        let store = PgCouponStore::new(pool);
        store.migrate().await.unwrap();
        store
    }

    /// 每次运行用不同的优惠码, 避免和库里已有数据冲突
    fn unique_code() -> String {
        Uuid::new_v4().simple().to_string()[..CODE_LENGTH].to_uppercase()
    }

    fn coupon(code: &str) -> Coupon {
        NewCoupon {
            code: Some(code.to_string()),
            description: Some("desc".to_string()),
            discount_value: Some(Decimal::new(150, 2)),
            expiration_date: Some(Local::now().naive_local() + Duration::days(1)),
            published: true,
        }
        .validate_for_creation(Local::now().naive_local())
        .unwrap()
    }

    #[tokio::test]
    #[ignore]
    async fn insert_find_and_soft_delete() {
        let store = store().await;
        let code = unique_code();

        let mut tx = store.begin().await.unwrap();
        let saved = tx.save(coupon(&code)).await.unwrap();
        let id = saved.id().unwrap();
        assert!(tx.exists_by_code(&code).await.unwrap());
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let found = tx.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(found.code(), code);
        assert_eq!(found.discount_value(), Decimal::new(150, 2));
        assert!(tx
            .find_valid_by_code(&code, Local::now().naive_local())
            .await
            .unwrap()
            .is_some());

        assert_eq!(tx.soft_delete_by_id(id).await.unwrap(), 1);
        assert_eq!(tx.soft_delete_by_id(id).await.unwrap(), 0);
        assert!(!tx.exists_by_code(&code).await.unwrap());
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_by_id(id).await.unwrap().unwrap().is_deleted());
    }

    #[tokio::test]
    #[ignore]
    async fn duplicate_live_code_hits_unique_index() {
        let store = store().await;
        let code = unique_code();

        let mut tx = store.begin().await.unwrap();
        tx.save(coupon(&code)).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let err = tx.save(coupon(&code)).await.unwrap_err();
        assert_eq!(err, ApiError::Error(MSG_CODE_EXISTS.to_string()));
    }

    #[tokio::test]
    #[ignore]
    async fn dropped_transaction_rolls_back() {
        let store = store().await;
        let code = unique_code();

        {
            let mut tx = store.begin().await.unwrap();
            tx.save(coupon(&code)).await.unwrap();
        }

        let mut tx = store.begin().await.unwrap();
        assert!(!tx.exists_by_code(&code).await.unwrap());
    }
}
