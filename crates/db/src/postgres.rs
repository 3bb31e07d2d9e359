//! Postgres-backed `Store` implementation.
//!
//! One free function per statement, generic over the executor so the same
//! SQL serves both pool-level reads and in-transaction calls.  Queries are
//! runtime-checked (`sqlx::query_as` + `FromRow`) and bind every value.

use async_trait::async_trait;
use sqlx::postgres::PgExecutor;
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::{
    DeviceChanges, DeviceRow, NetworkConfigChanges, NetworkConfigRow, NewDeviceRow,
    NewNetworkConfigRow,
};
use crate::store::{Store, StoreTx};
use crate::StoreError;

const DEVICE_COLS: &str = "id, deleted, serial, model, location, firmware_version, created_at";
const CONFIG_COLS: &str =
    "id, deleted, ip, subnet_mask, gateway, primary_dns, dhcp_enabled, device_id, created_at";

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

async fn device_by_id<'e>(
    executor: impl PgExecutor<'e>,
    id: i64,
) -> Result<Option<DeviceRow>, StoreError> {
    let sql = format!("SELECT {DEVICE_COLS} FROM devices WHERE id = $1 AND NOT deleted");
    sqlx::query_as::<_, DeviceRow>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(Into::into)
}

async fn device_by_serial<'e>(
    executor: impl PgExecutor<'e>,
    serial: &str,
) -> Result<Option<DeviceRow>, StoreError> {
    let sql = format!("SELECT {DEVICE_COLS} FROM devices WHERE serial = $1 AND NOT deleted");
    sqlx::query_as::<_, DeviceRow>(&sql)
        .bind(serial)
        .fetch_optional(executor)
        .await
        .map_err(Into::into)
}

async fn devices_active<'e>(executor: impl PgExecutor<'e>) -> Result<Vec<DeviceRow>, StoreError> {
    let sql = format!("SELECT {DEVICE_COLS} FROM devices WHERE NOT deleted ORDER BY id");
    sqlx::query_as::<_, DeviceRow>(&sql)
        .fetch_all(executor)
        .await
        .map_err(Into::into)
}

async fn devices_by_location<'e>(
    executor: impl PgExecutor<'e>,
    needle: &str,
) -> Result<Vec<DeviceRow>, StoreError> {
    let sql = format!(
        "SELECT {DEVICE_COLS} FROM devices WHERE location ILIKE $1 AND NOT deleted ORDER BY id"
    );
    sqlx::query_as::<_, DeviceRow>(&sql)
        .bind(format!("%{needle}%"))
        .fetch_all(executor)
        .await
        .map_err(Into::into)
}

async fn config_by_id<'e>(
    executor: impl PgExecutor<'e>,
    id: i64,
) -> Result<Option<NetworkConfigRow>, StoreError> {
    let sql = format!("SELECT {CONFIG_COLS} FROM network_configs WHERE id = $1 AND NOT deleted");
    sqlx::query_as::<_, NetworkConfigRow>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(Into::into)
}

async fn config_by_ip<'e>(
    executor: impl PgExecutor<'e>,
    ip: &str,
) -> Result<Option<NetworkConfigRow>, StoreError> {
    let sql = format!("SELECT {CONFIG_COLS} FROM network_configs WHERE ip = $1 AND NOT deleted");
    sqlx::query_as::<_, NetworkConfigRow>(&sql)
        .bind(ip)
        .fetch_optional(executor)
        .await
        .map_err(Into::into)
}

async fn configs_active<'e>(
    executor: impl PgExecutor<'e>,
) -> Result<Vec<NetworkConfigRow>, StoreError> {
    let sql = format!("SELECT {CONFIG_COLS} FROM network_configs WHERE NOT deleted ORDER BY id");
    sqlx::query_as::<_, NetworkConfigRow>(&sql)
        .fetch_all(executor)
        .await
        .map_err(Into::into)
}

async fn configs_by_dhcp<'e>(
    executor: impl PgExecutor<'e>,
    enabled: bool,
) -> Result<Vec<NetworkConfigRow>, StoreError> {
    let sql = format!(
        "SELECT {CONFIG_COLS} FROM network_configs \
         WHERE dhcp_enabled = $1 AND NOT deleted ORDER BY id"
    );
    sqlx::query_as::<_, NetworkConfigRow>(&sql)
        .bind(enabled)
        .fetch_all(executor)
        .await
        .map_err(Into::into)
}

async fn config_for_device<'e>(
    executor: impl PgExecutor<'e>,
    device_id: i64,
) -> Result<Option<NetworkConfigRow>, StoreError> {
    let sql = format!(
        "SELECT {CONFIG_COLS} FROM network_configs WHERE device_id = $1 AND NOT deleted"
    );
    sqlx::query_as::<_, NetworkConfigRow>(&sql)
        .bind(device_id)
        .fetch_optional(executor)
        .await
        .map_err(Into::into)
}

// ---------------------------------------------------------------------------
// PgStore
// ---------------------------------------------------------------------------

/// `Store` backed by a Postgres connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgStoreTx { tx }))
    }

    async fn device_by_id(&self, id: i64) -> Result<Option<DeviceRow>, StoreError> {
        device_by_id(&self.pool, id).await
    }

    async fn device_by_serial(&self, serial: &str) -> Result<Option<DeviceRow>, StoreError> {
        device_by_serial(&self.pool, serial).await
    }

    async fn devices_active(&self) -> Result<Vec<DeviceRow>, StoreError> {
        devices_active(&self.pool).await
    }

    async fn devices_by_location(&self, needle: &str) -> Result<Vec<DeviceRow>, StoreError> {
        devices_by_location(&self.pool, needle).await
    }

    async fn config_by_id(&self, id: i64) -> Result<Option<NetworkConfigRow>, StoreError> {
        config_by_id(&self.pool, id).await
    }

    async fn config_by_ip(&self, ip: &str) -> Result<Option<NetworkConfigRow>, StoreError> {
        config_by_ip(&self.pool, ip).await
    }

    async fn configs_active(&self) -> Result<Vec<NetworkConfigRow>, StoreError> {
        configs_active(&self.pool).await
    }

    async fn configs_by_dhcp(&self, enabled: bool) -> Result<Vec<NetworkConfigRow>, StoreError> {
        configs_by_dhcp(&self.pool, enabled).await
    }

    async fn config_for_device(
        &self,
        device_id: i64,
    ) -> Result<Option<NetworkConfigRow>, StoreError> {
        config_for_device(&self.pool, device_id).await
    }
}

// ---------------------------------------------------------------------------
// PgStoreTx
// ---------------------------------------------------------------------------

/// One open Postgres transaction.  Dropping it without `commit` rolls the
/// transaction back (sqlx guarantees this), so resource release does not
/// depend on the caller hitting a particular exit path.
pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(Into::into)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(Into::into)
    }

    async fn device_by_id(&mut self, id: i64) -> Result<Option<DeviceRow>, StoreError> {
        device_by_id(&mut *self.tx, id).await
    }

    async fn device_by_serial(
        &mut self,
        serial: &str,
    ) -> Result<Option<DeviceRow>, StoreError> {
        device_by_serial(&mut *self.tx, serial).await
    }

    async fn config_by_id(&mut self, id: i64) -> Result<Option<NetworkConfigRow>, StoreError> {
        config_by_id(&mut *self.tx, id).await
    }

    async fn config_by_ip(&mut self, ip: &str) -> Result<Option<NetworkConfigRow>, StoreError> {
        config_by_ip(&mut *self.tx, ip).await
    }

    async fn config_for_device(
        &mut self,
        device_id: i64,
    ) -> Result<Option<NetworkConfigRow>, StoreError> {
        config_for_device(&mut *self.tx, device_id).await
    }

    async fn config_linked_to_active_device(&mut self, id: i64) -> Result<bool, StoreError> {
        let linked: bool = sqlx::query_scalar(
            "SELECT EXISTS ( \
                SELECT 1 FROM network_configs c \
                JOIN devices d ON d.id = c.device_id \
                WHERE c.id = $1 AND NOT d.deleted \
            )",
        )
        .bind(id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(linked)
    }

    async fn create_device(&mut self, row: &NewDeviceRow) -> Result<DeviceRow, StoreError> {
        let sql = format!(
            "INSERT INTO devices (serial, model, location, firmware_version) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {DEVICE_COLS}"
        );
        sqlx::query_as::<_, DeviceRow>(&sql)
            .bind(&row.serial)
            .bind(&row.model)
            .bind(&row.location)
            .bind(&row.firmware_version)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(Into::into)
    }

    async fn create_config(
        &mut self,
        row: &NewNetworkConfigRow,
    ) -> Result<NetworkConfigRow, StoreError> {
        let sql = format!(
            "INSERT INTO network_configs \
                (ip, subnet_mask, gateway, primary_dns, dhcp_enabled, device_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {CONFIG_COLS}"
        );
        sqlx::query_as::<_, NetworkConfigRow>(&sql)
            .bind(&row.ip)
            .bind(&row.subnet_mask)
            .bind(&row.gateway)
            .bind(&row.primary_dns)
            .bind(row.dhcp_enabled)
            .bind(row.device_id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(Into::into)
    }

    async fn update_device(
        &mut self,
        id: i64,
        changes: &DeviceChanges,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE devices \
             SET serial = $1, model = $2, location = $3, firmware_version = $4 \
             WHERE id = $5 AND NOT deleted",
        )
        .bind(&changes.serial)
        .bind(&changes.model)
        .bind(&changes.location)
        .bind(&changes.firmware_version)
        .bind(id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn update_config(
        &mut self,
        id: i64,
        changes: &NetworkConfigChanges,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE network_configs \
             SET ip = $1, subnet_mask = $2, gateway = $3, primary_dns = $4, dhcp_enabled = $5 \
             WHERE id = $6 AND NOT deleted",
        )
        .bind(&changes.ip)
        .bind(&changes.subnet_mask)
        .bind(&changes.gateway)
        .bind(&changes.primary_dns)
        .bind(changes.dhcp_enabled)
        .bind(id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn soft_delete_device(&mut self, id: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE devices SET deleted = TRUE WHERE id = $1 AND NOT deleted")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn soft_delete_config(&mut self, id: i64) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE network_configs SET deleted = TRUE WHERE id = $1 AND NOT deleted",
        )
        .bind(id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }
}
