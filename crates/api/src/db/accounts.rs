//! Account repository for database operations.
//!
//! Every lookup is scoped to an [`AccountKind`]: an id or username that
//! belongs to another kind behaves as if it did not exist.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use storehouse_core::{AccountId, AccountKind, Email, Phone, Role, Username};

use super::{CascadeReport, RepositoryError, group_by, map_unique_violation};
use crate::models::{Account, AccountCredentials, ClientDetails, SalesmanDetails};

/// Unique constraints on `storehouse.account` and their user-facing messages.
const ACCOUNT_CONFLICTS: &[(&str, &str)] = &[
    ("account_username_key", "Username is already taken"),
    ("account_email_key", "Email already registered"),
    ("account_phone_key", "Phone number already registered"),
    ("account_single_superadmin", "Superadmin already exists"),
];

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for account queries.
#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: AccountId,
    username: Username,
    full_name: Option<String>,
    email: String,
    phone: Phone,
    address: Option<String>,
    role: Role,
    verified: bool,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for AccountCredentials {
    type Error = RepositoryError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            account: Account {
                id: row.id,
                username: row.username,
                full_name: row.full_name,
                email,
                phone: row.phone,
                address: row.address,
                role: row.role,
                verified: row.verified,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            password_hash: row.password_hash,
        })
    }
}

impl TryFrom<AccountRow> for Account {
    type Error = RepositoryError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        AccountCredentials::try_from(row).map(|credentials| credentials.account)
    }
}

/// Role names of a kind, for `role::text = ANY($n)` filters.
fn role_names(kind: AccountKind) -> Vec<&'static str> {
    kind.roles().iter().map(|role| role.as_str()).collect()
}

// =============================================================================
// Inputs
// =============================================================================

/// Fields for a new account.
#[derive(Debug)]
pub struct NewAccount<'a> {
    pub username: &'a Username,
    pub full_name: Option<&'a str>,
    pub email: &'a Email,
    pub phone: &'a Phone,
    pub address: Option<&'a str>,
    pub role: Role,
    /// Argon2id PHC string.
    pub password_hash: &'a str,
}

/// Partial update of an account. `None` leaves a field unchanged.
#[derive(Debug, Default)]
pub struct AccountChanges {
    pub username: Option<Username>,
    pub full_name: Option<String>,
    pub email: Option<Email>,
    pub phone: Option<Phone>,
    pub address: Option<String>,
    /// Argon2id PHC string of a new password.
    pub password_hash: Option<String>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for account database operations.
pub struct AccountRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AccountRepository<'a> {
    /// Create a new account repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a new account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the username, email or phone is
    /// taken, or a second super admin is created.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, new: &NewAccount<'_>) -> Result<Account, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(
            r"
            INSERT INTO storehouse.account
                (username, full_name, email, phone, address, role, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, username, full_name, email, phone, address, role, verified,
                      password_hash, created_at, updated_at
            ",
        )
        .bind(new.username)
        .bind(new.full_name)
        .bind(new.email.as_str())
        .bind(new.phone)
        .bind(new.address)
        .bind(new.role)
        .bind(new.password_hash)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, ACCOUNT_CONFLICTS))?;

        row.try_into()
    }

    /// List all accounts of a kind, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn list(&self, kind: AccountKind) -> Result<Vec<Account>, RepositoryError> {
        let rows = sqlx::query_as::<_, AccountRow>(
            r"
            SELECT id, username, full_name, email, phone, address, role, verified,
                   password_hash, created_at, updated_at
            FROM storehouse.account
            WHERE role::text = ANY($1)
            ORDER BY created_at DESC
            ",
        )
        .bind(role_names(kind))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// List accounts by id, regardless of kind.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn list_by_ids(&self, ids: &[AccountId]) -> Result<Vec<Account>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(AccountId::as_i32).collect();
        let rows = sqlx::query_as::<_, AccountRow>(
            r"
            SELECT id, username, full_name, email, phone, address, role, verified,
                   password_hash, created_at, updated_at
            FROM storehouse.account
            WHERE id = ANY($1)
            ",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get an account of a kind by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn get_by_id(
        &self,
        kind: AccountKind,
        id: AccountId,
    ) -> Result<Option<Account>, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(
            r"
            SELECT id, username, full_name, email, phone, address, role, verified,
                   password_hash, created_at, updated_at
            FROM storehouse.account
            WHERE id = $1 AND role::text = ANY($2)
            ",
        )
        .bind(id)
        .bind(role_names(kind))
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get an account with its password hash by username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn get_credentials_by_username(
        &self,
        kind: AccountKind,
        username: &Username,
    ) -> Result<Option<AccountCredentials>, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(
            r"
            SELECT id, username, full_name, email, phone, address, role, verified,
                   password_hash, created_at, updated_at
            FROM storehouse.account
            WHERE username = $1 AND role::text = ANY($2)
            ",
        )
        .bind(username)
        .bind(role_names(kind))
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get an account with its password hash by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn get_credentials_by_id(
        &self,
        kind: AccountKind,
        id: AccountId,
    ) -> Result<Option<AccountCredentials>, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(
            r"
            SELECT id, username, full_name, email, phone, address, role, verified,
                   password_hash, created_at, updated_at
            FROM storehouse.account
            WHERE id = $1 AND role::text = ANY($2)
            ",
        )
        .bind(id)
        .bind(role_names(kind))
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get an account of a kind by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn get_by_email(
        &self,
        kind: AccountKind,
        email: &Email,
    ) -> Result<Option<Account>, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(
            r"
            SELECT id, username, full_name, email, phone, address, role, verified,
                   password_hash, created_at, updated_at
            FROM storehouse.account
            WHERE email = $1 AND role::text = ANY($2)
            ",
        )
        .bind(email.as_str())
        .bind(role_names(kind))
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Whether a super admin has been created.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn superadmin_exists(&self) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r"
            SELECT EXISTS (SELECT 1 FROM storehouse.account WHERE role = 'superadmin')
            ",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    /// Apply a partial update. Any change resets `verified` to false.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no account of this kind has the id.
    /// Returns `RepositoryError::Conflict` if a new username, email or phone is taken.
    pub async fn update(
        &self,
        kind: AccountKind,
        id: AccountId,
        changes: &AccountChanges,
    ) -> Result<Account, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(
            r"
            UPDATE storehouse.account
            SET username = COALESCE($3, username),
                full_name = COALESCE($4, full_name),
                email = COALESCE($5, email),
                phone = COALESCE($6, phone),
                address = COALESCE($7, address),
                password_hash = COALESCE($8, password_hash),
                verified = FALSE,
                updated_at = NOW()
            WHERE id = $1 AND role::text = ANY($2)
            RETURNING id, username, full_name, email, phone, address, role, verified,
                      password_hash, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(role_names(kind))
        .bind(changes.username.as_ref())
        .bind(changes.full_name.as_deref())
        .bind(changes.email.as_ref().map(Email::as_str))
        .bind(changes.phone.as_ref())
        .bind(changes.address.as_deref())
        .bind(changes.password_hash.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, ACCOUNT_CONFLICTS))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Mark an account verified.
    ///
    /// Returns `false` if the account was already verified (or does not exist),
    /// so the flag flips at most once per verification.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_verified(&self, id: AccountId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storehouse.account
            SET verified = TRUE, updated_at = NOW()
            WHERE id = $1 AND verified = FALSE
            ",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Replace an account's password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the account does not exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_password_hash(
        &self,
        id: AccountId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storehouse.account
            SET password_hash = $2, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(password_hash)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete an account and everything that references it.
    ///
    /// Salesmen take their products and those products' sales with them;
    /// clients take their purchases. Runs in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no account of this kind has the id.
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn delete(
        &self,
        kind: AccountKind,
        id: AccountId,
    ) -> Result<CascadeReport, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut report = CascadeReport::default();

        match kind {
            AccountKind::Salesman => {
                report.sold_products = sqlx::query(
                    r"
                    DELETE FROM storehouse.sale
                    WHERE product_id IN (
                        SELECT id FROM storehouse.product WHERE salesman_id = $1
                    )
                    ",
                )
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

                report.products = sqlx::query(
                    r"
                    DELETE FROM storehouse.product WHERE salesman_id = $1
                    ",
                )
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            }
            AccountKind::Client => {
                report.sold_products = sqlx::query(
                    r"
                    DELETE FROM storehouse.sale WHERE client_id = $1
                    ",
                )
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            }
            AccountKind::Admin => {}
        }

        let deleted = sqlx::query(
            r"
            DELETE FROM storehouse.account
            WHERE id = $1 AND role::text = ANY($2)
            ",
        )
        .bind(id)
        .bind(role_names(kind))
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if deleted == 0 {
            // Dropping the transaction rolls back the cascade.
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;

        tracing::info!(
            account_id = %id,
            ?kind,
            products = report.products,
            sold_products = report.sold_products,
            "Account deleted"
        );

        Ok(report)
    }

    // =========================================================================
    // Population
    // =========================================================================

    /// Attach each salesman's products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn with_products(
        &self,
        salesmen: Vec<Account>,
    ) -> Result<Vec<SalesmanDetails>, RepositoryError> {
        let ids: Vec<AccountId> = salesmen.iter().map(|s| s.id).collect();
        let products = super::ProductRepository::new(self.pool)
            .list_by_salesmen(&ids)
            .await?;
        let mut by_salesman = group_by(products, |p| p.salesman_id);

        Ok(salesmen
            .into_iter()
            .map(|account| SalesmanDetails {
                products: by_salesman.remove(&account.id).unwrap_or_default(),
                account,
            })
            .collect())
    }

    /// Attach each client's purchases.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn with_purchases(
        &self,
        clients: Vec<Account>,
    ) -> Result<Vec<ClientDetails>, RepositoryError> {
        let ids: Vec<AccountId> = clients.iter().map(|c| c.id).collect();
        let sales = super::SaleRepository::new(self.pool)
            .list_by_clients(&ids)
            .await?;
        let mut by_client = group_by(sales, |s| s.client_id);

        Ok(clients
            .into_iter()
            .map(|account| ClientDetails {
                purchased_products: by_client.remove(&account.id).unwrap_or_default(),
                account,
            })
            .collect())
    }
}
