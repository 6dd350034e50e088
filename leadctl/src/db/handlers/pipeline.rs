//! Operations spanning both sides of the pipeline.
//!
//! Leads and sales live in separate tables joined only by their shared id. A
//! status change across `SALE_MADE` deletes the row from one table and inserts
//! it into the other inside one transaction, keeping the id, profile, external
//! id and record.

use crate::db::{
    errors::{DbError, Result},
    handlers::{leads::Leads, profiles::Profiles, repository::Repository, sales::Sales},
    models::{
        leads::{LeadCreateDBRequest, LeadDBResponse, LeadStatus},
        pipeline::{SheetRecord, UpsertCounts},
        sales::{SaleCreateDBRequest, SaleDBResponse, SaleStage},
    },
};
use crate::types::{PipelineId, ProfileId, abbrev_uuid};
use sqlx::{Connection, PgConnection};
use tracing::{debug, instrument};

pub struct Pipeline<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Pipeline<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Move a lead into `sales` with stage `NEW`.
    #[instrument(skip(self, comment), fields(lead_id = %abbrev_uuid(&id)), err)]
    pub async fn lead_to_sale(&mut self, id: PipelineId, comment: Option<String>) -> Result<SaleDBResponse> {
        let mut tx = self.db.begin().await?;

        let lead = Leads::new(&mut tx).get_for_update(id).await?.ok_or(DbError::NotFound)?;
        Leads::new(&mut tx).delete(id).await?;

        let sale = Sales::new(&mut tx)
            .create(&SaleCreateDBRequest {
                id: lead.id,
                profile_id: lead.profile_id,
                external_id: lead.external_id,
                record: lead.record,
                stage: SaleStage::New,
                deal_value: None,
                deal_currency: None,
                comment: comment.or(lead.comment),
            })
            .await?;

        tx.commit().await?;
        debug!(profile_id = %abbrev_uuid(&sale.profile_id), "Lead moved to sales");
        Ok(sale)
    }

    /// Move a sale back into `leads` with the given status.
    #[instrument(skip(self, comment), fields(sale_id = %abbrev_uuid(&id), status = status.as_str()), err)]
    pub async fn sale_to_lead(&mut self, id: PipelineId, status: LeadStatus, comment: Option<String>) -> Result<LeadDBResponse> {
        let mut tx = self.db.begin().await?;

        let sale = Sales::new(&mut tx).get_for_update(id).await?.ok_or(DbError::NotFound)?;
        Sales::new(&mut tx).delete(id).await?;

        let lead = Leads::new(&mut tx)
            .create(&LeadCreateDBRequest {
                id: Some(sale.id),
                profile_id: sale.profile_id,
                external_id: sale.external_id,
                record: sale.record,
                status,
                comment: comment.or(sale.comment),
            })
            .await?;

        tx.commit().await?;
        debug!(profile_id = %abbrev_uuid(&lead.profile_id), "Sale moved back to leads");
        Ok(lead)
    }

    /// Refresh or insert one profile's spreadsheet rows and stamp `last_synced_at`.
    ///
    /// A row already converted into a sale keeps living in `sales`; only its record is refreshed.
    #[instrument(skip(self, records), fields(profile_id = %abbrev_uuid(&profile_id), rows = records.len()), err)]
    pub async fn upsert_sheet_records(&mut self, profile_id: ProfileId, records: &[SheetRecord]) -> Result<UpsertCounts> {
        let mut tx = self.db.begin().await?;
        let mut counts = UpsertCounts::default();

        for row in records {
            let refreshed_sale = sqlx::query(
                "UPDATE sales SET record = $3, updated_at = NOW() WHERE profile_id = $1 AND external_id = $2",
            )
            .bind(profile_id)
            .bind(&row.external_id)
            .bind(&row.record)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            if refreshed_sale > 0 {
                counts.updated += 1;
                continue;
            }

            let inserted = sqlx::query_scalar::<_, bool>(
                r#"
                INSERT INTO leads (profile_id, external_id, record, status)
                VALUES ($1, $2, $3, 'LEAD')
                ON CONFLICT (profile_id, external_id)
                DO UPDATE SET record = EXCLUDED.record, updated_at = NOW()
                RETURNING (xmax = 0)
                "#,
            )
            .bind(profile_id)
            .bind(&row.external_id)
            .bind(&row.record)
            .fetch_one(&mut *tx)
            .await?;

            if inserted {
                counts.inserted += 1;
            } else {
                counts.updated += 1;
            }
        }

        Profiles::new(&mut tx).mark_synced(profile_id).await?;
        tx.commit().await?;
        Ok(counts)
    }
}

#[cfg(all(test, feature = "live-db-tests"))]
mod tests {
    use super::*;
    use crate::db::handlers::leads::LeadFilter;
    use crate::db::handlers::sales::SaleFilter;
    use crate::db::models::sales::SaleUpdateDBRequest;
    use crate::test_utils::create_test_profile;
    use rust_decimal::Decimal;
    use serde_json::json;
    use sqlx::PgPool;

    async fn seed_lead(conn: &mut PgConnection, profile_id: ProfileId, external_id: &str) -> LeadDBResponse {
        Leads::new(conn)
            .create(&LeadCreateDBRequest {
                id: None,
                profile_id,
                external_id: Some(external_id.to_string()),
                record: json!({"ID": external_id, "Name": "Initech"}),
                status: LeadStatus::Contacted,
                comment: Some("warm".to_string()),
            })
            .await
            .unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_round_trip_keeps_identity(pool: PgPool) {
        let profile = create_test_profile(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let lead = seed_lead(&mut conn, profile.id, "r1").await;

        let sale = Pipeline::new(&mut conn).lead_to_sale(lead.id, None).await.unwrap();
        assert_eq!(sale.id, lead.id);
        assert_eq!(sale.stage, SaleStage::New);
        assert_eq!(sale.record, lead.record);
        assert_eq!(sale.comment.as_deref(), Some("warm"));
        assert!(Leads::new(&mut conn).get_by_id(lead.id).await.unwrap().is_none());

        Sales::new(&mut conn)
            .update(
                sale.id,
                &SaleUpdateDBRequest {
                    deal_value: Some(Decimal::new(125000, 2)),
                    deal_currency: Some("EUR".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let back = Pipeline::new(&mut conn)
            .sale_to_lead(sale.id, LeadStatus::Other, Some("lost budget".to_string()))
            .await
            .unwrap();
        assert_eq!(back.id, lead.id);
        assert_eq!(back.status, LeadStatus::Other);
        assert_eq!(back.external_id.as_deref(), Some("r1"));
        assert_eq!(back.comment.as_deref(), Some("lost budget"));
        assert!(Sales::new(&mut conn).get_by_id(sale.id).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_missing_rows_are_not_found(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut pipeline = Pipeline::new(&mut conn);
        let id = uuid::Uuid::new_v4();
        assert!(matches!(pipeline.lead_to_sale(id, None).await, Err(DbError::NotFound)));
        assert!(matches!(
            pipeline.sale_to_lead(id, LeadStatus::Lead, None).await,
            Err(DbError::NotFound)
        ));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_upsert_refreshes_leads_and_sales(pool: PgPool) {
        let profile = create_test_profile(&pool).await;
        let mut conn = pool.acquire().await.unwrap();

        let existing = seed_lead(&mut conn, profile.id, "r1").await;
        let converted = seed_lead(&mut conn, profile.id, "r2").await;
        Pipeline::new(&mut conn).lead_to_sale(converted.id, None).await.unwrap();

        let records = vec![
            SheetRecord {
                external_id: "r1".to_string(),
                record: json!({"ID": "r1", "Name": "Initech v2"}),
            },
            SheetRecord {
                external_id: "r2".to_string(),
                record: json!({"ID": "r2", "Name": "Globex v2"}),
            },
            SheetRecord {
                external_id: "r3".to_string(),
                record: json!({"ID": "r3", "Name": "Umbrella"}),
            },
        ];
        let counts = Pipeline::new(&mut conn).upsert_sheet_records(profile.id, &records).await.unwrap();
        assert_eq!(counts, UpsertCounts { inserted: 1, updated: 2 });

        let refreshed = Leads::new(&mut conn).get_by_id(existing.id).await.unwrap().unwrap();
        assert_eq!(refreshed.record["Name"], "Initech v2");
        assert_eq!(refreshed.status, LeadStatus::Contacted);

        let sale = Sales::new(&mut conn).get_by_id(converted.id).await.unwrap().unwrap();
        assert_eq!(sale.record["Name"], "Globex v2");

        let leads = LeadFilter {
            profile_id: Some(profile.id),
            limit: 10,
            ..Default::default()
        };
        assert_eq!(Leads::new(&mut conn).count(&leads).await.unwrap(), 2);
        let sales = SaleFilter {
            profile_id: Some(profile.id),
            limit: 10,
            ..Default::default()
        };
        assert_eq!(Sales::new(&mut conn).count(&sales).await.unwrap(), 1);

        let synced = Profiles::new(&mut conn).get_by_id(profile.id).await.unwrap().unwrap();
        assert!(synced.last_synced_at.is_some());
    }
}
