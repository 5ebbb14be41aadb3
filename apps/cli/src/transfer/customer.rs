//! Customer files.

use std::path::Path;

use tracing::{debug, info, warn};

use tally_core::codec::{self, customer_record, CustomerRow, HeaderMap, CUSTOMER_COLUMNS, CUSTOMER_HEADERS};
use tally_db::Database;

use super::{create_writer, line_of, open_reader, ImportReport, ImportResult};

/// Writes every customer, ordered by id.
pub async fn export_customers(db: &Database, path: &Path) -> ImportResult<usize> {
    let customers = db.customers().list().await?;

    let mut writer = create_writer(path)?;
    writer.write_record(CUSTOMER_HEADERS)?;
    for customer in &customers {
        writer.write_record(customer_record(customer))?;
    }
    writer.flush().map_err(csv::Error::from)?;

    info!(path = %path.display(), count = customers.len(), "Customers exported");
    Ok(customers.len())
}

/// Reads customers from a file with a header line. Only `Name` is
/// required; tier and points are taken as written.
pub async fn import_customers(db: &Database, path: &Path) -> ImportResult<ImportReport> {
    let mut reader = open_reader(path)?;
    let map = HeaderMap::resolve(reader.headers()?, CUSTOMER_COLUMNS)?;
    let mut report = ImportReport::default();

    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Unreadable customer row skipped");
                report.skipped += 1;
                continue;
            }
        };
        if codec::is_blank(&record) {
            continue;
        }

        let line = line_of(&record);
        let Some(row) = CustomerRow::from_record(&map, &record) else {
            debug!(line = line, "Customer row without name skipped");
            report.skipped += 1;
            continue;
        };

        match db.customers().insert_imported(&row.into_inner()).await {
            Ok(_) => report.inserted += 1,
            Err(e) => {
                warn!(line = line, error = %e, "Customer row skipped");
                report.skipped += 1;
            }
        }
    }

    info!(
        path = %path.display(),
        inserted = report.inserted,
        skipped = report.skipped,
        "Customers imported"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tally_core::{NewCustomer, Tier};
    use tally_db::DbConfig;

    use crate::transfer::ImportError;

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_export_then_import_round_trip() {
        let source = db().await;
        for (name, phone, tier, points) in [
            ("Ana", Some("0912345678"), Tier::Gold, 640),
            ("Nguyen, Bao", None, Tier::Regular, 0),
        ] {
            source
                .customers()
                .insert(&NewCustomer {
                    name: name.to_string(),
                    phone: phone.map(str::to_string),
                    address: Some("12 \"Green\" Street".to_string()),
                    customer_type: Some("retail".to_string()),
                    tier,
                    points,
                    ..Default::default()
                })
                .await
                .unwrap();
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("customers.csv");
        assert_eq!(export_customers(&source, &path).await.unwrap(), 2);

        let target = db().await;
        let report = import_customers(&target, &path).await.unwrap();
        assert_eq!(report, ImportReport { inserted: 2, skipped: 0 });

        let originals = source.customers().list().await.unwrap();
        let copies = target.customers().list().await.unwrap();
        for (original, copy) in originals.iter().zip(&copies) {
            assert_eq!(copy.name, original.name);
            assert_eq!(copy.phone, original.phone);
            assert_eq!(copy.email, original.email);
            assert_eq!(copy.customer_type, original.customer_type);
            assert_eq!(copy.address, original.address);
            assert_eq!(copy.tier, original.tier);
            assert_eq!(copy.points, original.points);
        }
    }

    #[tokio::test]
    async fn test_unknown_tier_reads_as_regular() {
        let db = db().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("customers.csv");
        fs::write(&path, "FullName,Rank,Points\nChi,Diamond,-5\n,Gold,10\n").unwrap();

        let report = import_customers(&db, &path).await.unwrap();
        assert_eq!(report, ImportReport { inserted: 1, skipped: 1 });

        let chi = &db.customers().list().await.unwrap()[0];
        assert_eq!(chi.tier, Tier::Regular);
        assert_eq!(chi.points, 0);
    }

    #[tokio::test]
    async fn test_loose_phone_numbers_are_kept() {
        let db = db().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("customers.csv");
        fs::write(
            &path,
            "Name,Phone,Email
             Ana,+84 (28) 1234,
             Bao,0901 234 567 ext. 2,bao at example
",
        )
        .unwrap();

        let report = import_customers(&db, &path).await.unwrap();
        assert_eq!(report, ImportReport { inserted: 2, skipped: 0 });

        let customers = db.customers().list().await.unwrap();
        assert_eq!(customers[0].phone.as_deref(), Some("+84 (28) 1234"));
        assert_eq!(customers[1].phone.as_deref(), Some("0901 234 567 ext. 2"));
        assert_eq!(customers[1].email.as_deref(), Some("bao at example"));
    }

    #[tokio::test]
    async fn test_missing_name_column() {
        let db = db().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("customers.csv");
        fs::write(&path, "Phone,Email\n0912345678,a@b.c\n").unwrap();

        assert!(matches!(
            import_customers(&db, &path).await,
            Err(ImportError::MissingColumn(_))
        ));
        assert_eq!(db.customers().count().await.unwrap(), 0);
    }
}
