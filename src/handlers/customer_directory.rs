//! Customer Directory
//!
//! Maps license plates to customers. A normalized plate identifies at most
//! one customer; concurrent first washes for the same new plate converge on
//! a single row.

use sqlx::{PgConnection, PgPool};

use crate::audit::{self, AuditAction, AuditLogBuilder};
use crate::domain::{Customer, DomainError, LicensePlate, OperationContext};
use crate::error::AppError;

use super::{non_blank, RegisterCustomerCommand};

// =========================================================================
// CustomerDirectory
// =========================================================================

pub struct CustomerDirectory {
    pool: PgPool,
}

impl CustomerDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find the customer for a plate, creating a walk-in when none exists.
    ///
    /// An existing customer is returned unchanged; the fallback name and phone
    /// are only used for a new record.
    pub async fn resolve(
        &self,
        raw_plate: &str,
        fallback_name: Option<&str>,
        fallback_phone: Option<&str>,
    ) -> Result<Customer, AppError> {
        let plate = LicensePlate::parse(raw_plate)?;
        let mut conn = self.pool.acquire().await?;
        Self::find_or_create(&mut conn, &plate, fallback_name, fallback_phone).await
    }

    pub async fn resolve_by_id(&self, customer_id: i64) -> Result<Customer, AppError> {
        sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1")
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DomainError::not_found("customer", customer_id).into())
    }

    pub async fn find_by_plate(&self, raw_plate: &str) -> Result<Option<Customer>, AppError> {
        let plate = LicensePlate::parse(raw_plate)?;
        Ok(Self::fetch_by_plate(&self.pool, &plate).await?)
    }

    /// Register a member.
    ///
    /// A walk-in with the same plate is promoted in place and keeps its wash
    /// history. Registering a plate that already belongs to a member fails.
    pub async fn register(
        &self,
        command: RegisterCustomerCommand,
        context: &OperationContext,
    ) -> Result<Customer, AppError> {
        let plate = LicensePlate::parse(&command.license_plate)?;
        let name = non_blank(Some(command.name.as_str()))
            .ok_or_else(|| DomainError::validation("customer name is required"))?;
        let phone = non_blank(command.phone.as_deref());
        let email = non_blank(command.email.as_deref());

        let mut tx = self.pool.begin().await?;

        let existing = match Self::lock_by_plate(&mut tx, &plate).await? {
            Some(customer) => Some(customer),
            None => {
                let inserted = sqlx::query_as::<_, Customer>(
                    r#"
                    INSERT INTO customers (license_plate, name, phone, email, is_member)
                    VALUES ($1, $2, $3, $4, TRUE)
                    ON CONFLICT (license_plate) DO NOTHING
                    RETURNING *
                    "#,
                )
                .bind(plate.as_str())
                .bind(name)
                .bind(phone)
                .bind(email)
                .fetch_optional(&mut *tx)
                .await?;

                match inserted {
                    Some(customer) => {
                        audit::append(&mut tx, registration_audit(&customer), context).await?;
                        tx.commit().await?;

                        tracing::info!(
                            customer_id = customer.id,
                            license_plate = %customer.license_plate,
                            "Member registered"
                        );
                        return Ok(customer);
                    }
                    // Lost the insert race; the winner is committed by now
                    None => Self::lock_by_plate(&mut tx, &plate).await?,
                }
            }
        };

        let existing = existing
            .ok_or_else(|| AppError::Internal(format!("customer {plate} vanished during registration")))?;

        if existing.is_member {
            return Err(DomainError::conflict(format!(
                "plate {} is already registered to a member",
                existing.license_plate
            ))
            .into());
        }

        let promoted = sqlx::query_as::<_, Customer>(
            r#"
            UPDATE customers
            SET is_member = TRUE,
                name = $2,
                phone = COALESCE($3, phone),
                email = COALESCE($4, email),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(existing.id)
        .bind(name)
        .bind(phone)
        .bind(email)
        .fetch_one(&mut *tx)
        .await?;

        audit::append(&mut tx, registration_audit(&promoted), context).await?;
        tx.commit().await?;

        tracing::info!(
            customer_id = promoted.id,
            license_plate = %promoted.license_plate,
            total_washes = promoted.total_washes,
            "Walk-in promoted to member"
        );

        Ok(promoted)
    }

    // =========================================================================
    // Helpers shared with TransactionRecorder
    // =========================================================================

    /// Find-or-create on an open connection or transaction.
    ///
    /// Uses `ON CONFLICT DO NOTHING` so a concurrent insert of the same plate
    /// leaves the enclosing transaction usable; the winning row is re-read.
    pub(crate) async fn find_or_create(
        conn: &mut PgConnection,
        plate: &LicensePlate,
        fallback_name: Option<&str>,
        fallback_phone: Option<&str>,
    ) -> Result<Customer, AppError> {
        if let Some(customer) = Self::fetch_by_plate(&mut *conn, plate).await? {
            return Ok(customer);
        }

        let name = non_blank(fallback_name).ok_or_else(|| {
            DomainError::validation(format!("customer name is required for new plate {plate}"))
        })?;

        let inserted = sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (license_plate, name, phone, is_member)
            VALUES ($1, $2, $3, FALSE)
            ON CONFLICT (license_plate) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(plate.as_str())
        .bind(name)
        .bind(non_blank(fallback_phone))
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(customer) = inserted {
            tracing::info!(
                customer_id = customer.id,
                license_plate = %customer.license_plate,
                "Walk-in customer created"
            );
            return Ok(customer);
        }

        tracing::debug!(license_plate = %plate, "Concurrent insert won, re-fetching customer");
        Self::fetch_by_plate(&mut *conn, plate)
            .await?
            .ok_or_else(|| AppError::Internal(format!("customer {plate} missing after conflict")))
    }

    /// Lock a customer row by id for the rest of the transaction
    pub(crate) async fn lock_by_id(
        conn: &mut PgConnection,
        customer_id: i64,
    ) -> Result<Customer, AppError> {
        sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1 FOR UPDATE")
            .bind(customer_id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| DomainError::not_found("customer", customer_id).into())
    }

    async fn lock_by_plate(
        conn: &mut PgConnection,
        plate: &LicensePlate,
    ) -> Result<Option<Customer>, sqlx::Error> {
        sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE license_plate = $1 FOR UPDATE")
            .bind(plate.as_str())
            .fetch_optional(conn)
            .await
    }

    async fn fetch_by_plate<'e, E>(executor: E, plate: &LicensePlate) -> Result<Option<Customer>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE license_plate = $1")
            .bind(plate.as_str())
            .fetch_optional(executor)
            .await
    }
}

fn registration_audit(customer: &Customer) -> AuditLogBuilder {
    AuditLogBuilder::new(AuditAction::CustomerRegistered)
        .resource("customer", customer.id)
        .after_state(customer)
}
