// SQLite store behind the `database` feature, normalizing the contract
// aggregate into the four tables of migrations/0001_init.sql. Writes
// that touch an aggregate replace its child rows inside a transaction;
// commit_invoice shares the same transaction so invoice creation and
// milestone advancement land together or not at all.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{migrate::MigrateDatabase, Row, Sqlite, SqlitePool};
use sqlx::sqlite::SqliteRow;
use tracing::info;

use crate::domain::{
    CompanyId, Contract, ContractId, ContractStatus, Currency, Engagement, EngineerId,
    Invoice, InvoiceId, InvoiceItem, InvoiceStatus, JobId, Milestone, MilestoneStatus,
    Period, Signature, Timesheet, TimesheetStatus,
};
use crate::error::StoreError;

use super::ContractStore;

pub struct SqliteStore {
    pool: SqlitePool,
}

fn corrupt(reason: impl Into<String>) -> StoreError {
    StoreError::Corrupt {
        reason: reason.into(),
    }
}

fn parse_uuid(value: &str) -> Result<uuid::Uuid, StoreError> {
    uuid::Uuid::parse_str(value).map_err(|e| corrupt(format!("bad uuid {value}: {e}")))
}

fn parse_decimal(value: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(value).map_err(|e| corrupt(format!("bad amount {value}: {e}")))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupt(format!("bad timestamp {value}: {e}")))
}

fn parse_date(value: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| corrupt(format!("bad date {value}: {e}")))
}

impl SqliteStore {
    /// Connect, creating the database file and running migrations when
    /// asked, as the usual bootstrap path does.
    pub async fn connect(database_url: &str, auto_migrate: bool) -> Result<Self, StoreError> {
        if !Sqlite::database_exists(database_url).await? {
            info!(url = database_url, "creating contract database");
            Sqlite::create_database(database_url).await?;
        }

        let pool = SqlitePool::connect(database_url).await?;

        if auto_migrate {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(sqlx::Error::from)?;
            info!("contract database migrations completed");
        }

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn shutdown(&self) {
        self.pool.close().await;
    }

    async fn contract_from_row(&self, row: SqliteRow) -> Result<Contract, StoreError> {
        let id = ContractId(parse_uuid(row.get::<String, _>("id").as_str())?);
        let kind: String = row.get("engagement_kind");

        let engagement = match kind.as_str() {
            "milestone_based" => {
                let agreed_total: Option<String> = row.get("agreed_total");
                let agreed_total = agreed_total
                    .ok_or_else(|| corrupt("milestone-based contract without agreed_total"))?;
                Engagement::MilestoneBased {
                    agreed_total: parse_decimal(&agreed_total)?,
                    milestones: self.load_milestones(id).await?,
                }
            }
            "day_rate" => {
                let day_rate: Option<String> = row.get("day_rate");
                let day_rate =
                    day_rate.ok_or_else(|| corrupt("day-rate contract without day_rate"))?;
                Engagement::DayRate {
                    day_rate: parse_decimal(&day_rate)?,
                    timesheets: self.load_timesheets(id).await?,
                }
            }
            other => return Err(corrupt(format!("unknown engagement kind {other}"))),
        };

        let signature = |name_col: &str, at_col: &str| -> Result<Option<Signature>, StoreError> {
            let name: Option<String> = row.get(name_col);
            let at: Option<String> = row.get(at_col);
            match (name, at) {
                (Some(name), Some(at)) => Ok(Some(Signature {
                    name,
                    signed_at: parse_timestamp(&at)?,
                })),
                (None, None) => Ok(None),
                _ => Err(corrupt("signature name/timestamp pair is incomplete")),
            }
        };

        Ok(Contract {
            id,
            job_id: JobId(parse_uuid(row.get::<String, _>("job_id").as_str())?),
            company_id: CompanyId(parse_uuid(row.get::<String, _>("company_id").as_str())?),
            engineer_id: EngineerId(parse_uuid(row.get::<String, _>("engineer_id").as_str())?),
            currency: Currency::new(row.get::<String, _>("currency")),
            status: ContractStatus::from_str(row.get::<String, _>("status").as_str())
                .map_err(corrupt)?,
            engagement,
            engineer_signature: signature("engineer_sig_name", "engineer_signed_at")?,
            company_signature: signature("company_sig_name", "company_signed_at")?,
            created_at: parse_timestamp(row.get::<String, _>("created_at").as_str())?,
            updated_at: parse_timestamp(row.get::<String, _>("updated_at").as_str())?,
        })
    }

    async fn load_milestones(&self, id: ContractId) -> Result<Vec<Milestone>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, description, amount, status FROM milestones \
             WHERE contract_id = ?1 ORDER BY position ASC",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(Milestone {
                    id: crate::domain::MilestoneId(parse_uuid(
                        row.get::<String, _>("id").as_str(),
                    )?),
                    contract_id: id,
                    description: row.get("description"),
                    amount: parse_decimal(row.get::<String, _>("amount").as_str())?,
                    status: MilestoneStatus::from_str(row.get::<String, _>("status").as_str())
                        .map_err(corrupt)?,
                })
            })
            .collect()
    }

    async fn load_timesheets(&self, id: ContractId) -> Result<Vec<Timesheet>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, engineer_id, period_start, period_end, units_worked, status, \
             submitted_at FROM timesheets WHERE contract_id = ?1 ORDER BY submitted_at ASC",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(Timesheet {
                    id: crate::domain::TimesheetId(parse_uuid(
                        row.get::<String, _>("id").as_str(),
                    )?),
                    contract_id: id,
                    engineer_id: EngineerId(parse_uuid(
                        row.get::<String, _>("engineer_id").as_str(),
                    )?),
                    period: Period {
                        start: parse_date(row.get::<String, _>("period_start").as_str())?,
                        end: parse_date(row.get::<String, _>("period_end").as_str())?,
                    },
                    units_worked: parse_decimal(row.get::<String, _>("units_worked").as_str())?,
                    status: TimesheetStatus::from_str(row.get::<String, _>("status").as_str())
                        .map_err(corrupt)?,
                    submitted_at: parse_timestamp(
                        row.get::<String, _>("submitted_at").as_str(),
                    )?,
                })
            })
            .collect()
    }

    async fn write_contract(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        contract: &Contract,
    ) -> Result<(), StoreError> {
        let (kind, agreed_total, day_rate) = match &contract.engagement {
            Engagement::MilestoneBased { agreed_total, .. } => {
                ("milestone_based", Some(agreed_total.to_string()), None)
            }
            Engagement::DayRate { day_rate, .. } => {
                ("day_rate", None, Some(day_rate.to_string()))
            }
        };

        sqlx::query(
            "INSERT OR REPLACE INTO contracts \
             (id, job_id, company_id, engineer_id, currency, status, engagement_kind, \
              agreed_total, day_rate, engineer_sig_name, engineer_signed_at, \
              company_sig_name, company_signed_at, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        )
        .bind(contract.id.to_string())
        .bind(contract.job_id.to_string())
        .bind(contract.company_id.to_string())
        .bind(contract.engineer_id.to_string())
        .bind(contract.currency.as_str())
        .bind(contract.status.to_string())
        .bind(kind)
        .bind(agreed_total)
        .bind(day_rate)
        .bind(contract.engineer_signature.as_ref().map(|s| s.name.clone()))
        .bind(
            contract
                .engineer_signature
                .as_ref()
                .map(|s| s.signed_at.to_rfc3339()),
        )
        .bind(contract.company_signature.as_ref().map(|s| s.name.clone()))
        .bind(
            contract
                .company_signature
                .as_ref()
                .map(|s| s.signed_at.to_rfc3339()),
        )
        .bind(contract.created_at.to_rfc3339())
        .bind(contract.updated_at.to_rfc3339())
        .execute(&mut **tx)
        .await?;

        // Child rows are replaced wholesale; the aggregate is the unit
        // of persistence.
        sqlx::query("DELETE FROM milestones WHERE contract_id = ?1")
            .bind(contract.id.to_string())
            .execute(&mut **tx)
            .await?;
        sqlx::query("DELETE FROM timesheets WHERE contract_id = ?1")
            .bind(contract.id.to_string())
            .execute(&mut **tx)
            .await?;

        if let Some(milestones) = contract.milestones() {
            for (position, milestone) in milestones.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO milestones (id, contract_id, position, description, amount, status) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )
                .bind(milestone.id.to_string())
                .bind(contract.id.to_string())
                .bind(position as i64)
                .bind(&milestone.description)
                .bind(milestone.amount.to_string())
                .bind(milestone.status.to_string())
                .execute(&mut **tx)
                .await?;
            }
        }

        if let Some(timesheets) = contract.timesheets() {
            for timesheet in timesheets {
                sqlx::query(
                    "INSERT INTO timesheets (id, contract_id, engineer_id, period_start, \
                     period_end, units_worked, status, submitted_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )
                .bind(timesheet.id.to_string())
                .bind(contract.id.to_string())
                .bind(timesheet.engineer_id.to_string())
                .bind(timesheet.period.start.to_string())
                .bind(timesheet.period.end.to_string())
                .bind(timesheet.units_worked.to_string())
                .bind(timesheet.status.to_string())
                .bind(timesheet.submitted_at.to_rfc3339())
                .execute(&mut **tx)
                .await?;
            }
        }

        Ok(())
    }

    async fn write_invoice(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        invoice: &Invoice,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO invoices \
             (id, contract_id, company_id, engineer_id, items, total, issue_date, \
              due_date, status, consumed_milestones) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(invoice.id.to_string())
        .bind(invoice.contract_id.to_string())
        .bind(invoice.company_id.to_string())
        .bind(invoice.engineer_id.to_string())
        .bind(serde_json::to_string(&invoice.items)?)
        .bind(invoice.total.to_string())
        .bind(invoice.issue_date.to_string())
        .bind(invoice.due_date.to_string())
        .bind(invoice.status.to_string())
        .bind(serde_json::to_string(&invoice.consumed_milestones)?)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    fn invoice_from_row(row: SqliteRow) -> Result<Invoice, StoreError> {
        let items: Vec<InvoiceItem> =
            serde_json::from_str(row.get::<String, _>("items").as_str())?;
        let consumed: Vec<crate::domain::MilestoneId> =
            serde_json::from_str(row.get::<String, _>("consumed_milestones").as_str())?;
        Ok(Invoice {
            id: InvoiceId(parse_uuid(row.get::<String, _>("id").as_str())?),
            contract_id: ContractId(parse_uuid(row.get::<String, _>("contract_id").as_str())?),
            company_id: CompanyId(parse_uuid(row.get::<String, _>("company_id").as_str())?),
            engineer_id: EngineerId(parse_uuid(row.get::<String, _>("engineer_id").as_str())?),
            items,
            total: parse_decimal(row.get::<String, _>("total").as_str())?,
            issue_date: parse_date(row.get::<String, _>("issue_date").as_str())?,
            due_date: parse_date(row.get::<String, _>("due_date").as_str())?,
            status: InvoiceStatus::from_str(row.get::<String, _>("status").as_str())
                .map_err(corrupt)?,
            consumed_milestones: consumed,
        })
    }
}

#[async_trait]
impl ContractStore for SqliteStore {
    async fn load_contract(&self, id: ContractId) -> Result<Option<Contract>, StoreError> {
        let row = sqlx::query("SELECT * FROM contracts WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.contract_from_row(row).await?)),
            None => Ok(None),
        }
    }

    async fn save_contract(&self, contract: &Contract) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::write_contract(&mut tx, contract).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_contracts(&self) -> Result<Vec<Contract>, StoreError> {
        let rows = sqlx::query("SELECT * FROM contracts ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;
        let mut contracts = Vec::with_capacity(rows.len());
        for row in rows {
            contracts.push(self.contract_from_row(row).await?);
        }
        Ok(contracts)
    }

    async fn load_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        let row = sqlx::query("SELECT * FROM invoices WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::invoice_from_row).transpose()
    }

    async fn save_invoice(&self, invoice: &Invoice) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::write_invoice(&mut tx, invoice).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn invoices_for_contract(
        &self,
        id: ContractId,
    ) -> Result<Vec<Invoice>, StoreError> {
        let rows =
            sqlx::query("SELECT * FROM invoices WHERE contract_id = ?1 ORDER BY issue_date ASC")
                .bind(id.to_string())
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(Self::invoice_from_row).collect()
    }

    async fn list_invoices(&self) -> Result<Vec<Invoice>, StoreError> {
        let rows = sqlx::query("SELECT * FROM invoices ORDER BY issue_date ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::invoice_from_row).collect()
    }

    async fn commit_invoice(
        &self,
        invoice: &Invoice,
        contract: &Contract,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::write_invoice(&mut tx, invoice).await?;
        Self::write_contract(&mut tx, contract).await?;
        tx.commit().await?;
        Ok(())
    }
}
