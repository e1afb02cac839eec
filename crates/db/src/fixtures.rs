use sqlx::Executor;

use crate::connection::DbPool;

/// Canonical seed contract: which states the deterministic dataset covers
/// and how many customers each carries.
const SEED_SEGMENTS: &[SeedSegmentContract] = &[
    SeedSegmentContract {
        state: "CA",
        customers: 4,
        description: "California purchases across electronics, sports, and clothing",
    },
    SeedSegmentContract {
        state: "NY",
        customers: 3,
        description: "New York purchases across electronics, home, and sports",
    },
    SeedSegmentContract {
        state: "TX",
        customers: 3,
        description: "Texas purchases across electronics, home, and clothing",
    },
    SeedSegmentContract {
        state: "WA",
        customers: 2,
        description: "Washington purchases across electronics and sports",
    },
];

const SEED_TOTAL_ROWS: i64 = 12;

const SEED_CATEGORIES: &[&str] = &["Clothing", "Electronics", "Home", "Sports"];

struct SeedSegmentContract {
    state: &'static str,
    customers: i64,
    description: &'static str,
}

#[derive(Clone, Debug)]
pub struct SegmentSeedInfo {
    pub state: &'static str,
    pub customers: i64,
    pub description: &'static str,
}

#[derive(Clone, Debug)]
pub struct SeedResult {
    pub segments_seeded: Vec<SegmentSeedInfo>,
}

#[derive(Clone, Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

/// Deterministic retail dataset for local runs and end-to-end checks.
pub struct RetailSeedDataset;

impl RetailSeedDataset {
    /// SQL fixture content for the retail seed rows.
    pub const SQL: &str = include_str!("../../../config/fixtures/retail_seed_data.sql");

    /// Load the seed rows into the database. Existing rows are cleared
    /// first so reseeding stays idempotent.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, sqlx::Error> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query("DELETE FROM retail")).await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let segments_seeded = SEED_SEGMENTS
            .iter()
            .map(|segment| SegmentSeedInfo {
                state: segment.state,
                customers: segment.customers,
                description: segment.description,
            })
            .collect::<Vec<_>>();

        Ok(SeedResult { segments_seeded })
    }

    /// Verify that the seeded rows match the contract.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, sqlx::Error> {
        let mut checks = Vec::new();

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM retail").fetch_one(pool).await?;
        checks.push(("retail-row-count", total == SEED_TOTAL_ROWS));

        for segment in SEED_SEGMENTS {
            let count: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM retail WHERE State = ?")
                    .bind(segment.state)
                    .fetch_one(pool)
                    .await?;
            let check_name: &'static str = match segment.state {
                "CA" => "retail-state-ca",
                "NY" => "retail-state-ny",
                "TX" => "retail-state-tx",
                _ => "retail-state-wa",
            };
            checks.push((check_name, count == segment.customers));
        }

        let categories: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT Category FROM retail ORDER BY Category")
                .fetch_all(pool)
                .await?;
        checks.push((
            "retail-categories",
            categories.iter().map(String::as_str).eq(SEED_CATEGORIES.iter().copied()),
        ));

        let mispriced: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM retail WHERE Total_Spent <> Price * Quantity",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("retail-spend-consistency", mispriced == 0));

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_present, checks })
    }
}

#[cfg(test)]
mod tests {
    use super::RetailSeedDataset;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn seed_load_and_verify_satisfy_the_contract() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");

        let result = RetailSeedDataset::load(&pool).await.expect("load seed data");
        assert_eq!(result.segments_seeded.len(), 4);

        let verification = RetailSeedDataset::verify(&pool).await.expect("verify seed data");
        assert!(
            verification.all_present,
            "all checks should pass, got: {:?}",
            verification.checks
        );
    }

    #[tokio::test]
    async fn seed_load_is_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");

        RetailSeedDataset::load(&pool).await.expect("first load");
        RetailSeedDataset::load(&pool).await.expect("second load");

        let verification = RetailSeedDataset::verify(&pool).await.expect("verify seed data");
        assert!(verification.all_present, "reseeding should not duplicate rows");
    }

    #[tokio::test]
    async fn verify_flags_missing_rows() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");

        RetailSeedDataset::load(&pool).await.expect("load seed data");
        sqlx::query("DELETE FROM retail WHERE State = 'CA'")
            .execute(&pool)
            .await
            .expect("remove a segment");

        let verification = RetailSeedDataset::verify(&pool).await.expect("verify seed data");
        assert!(!verification.all_present);
        assert!(verification
            .checks
            .iter()
            .any(|(name, passed)| *name == "retail-state-ca" && !passed));
    }
}
