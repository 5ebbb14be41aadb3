//! Customer records.

use ::csv::StringRecord;

use super::header::{ColumnSpec, HeaderMap};
use super::{non_empty, opt_str};
use crate::number;
use crate::tier::Tier;
use crate::types::{Customer, NewCustomer};

/// Export header line.
pub const CUSTOMER_HEADERS: [&str; 8] = [
    "Id",
    "Name",
    "Phone",
    "Email",
    "CustomerType",
    "Address",
    "Tier",
    "Points",
];

/// Columns understood on import.
pub const CUSTOMER_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::optional("Id", &["Id", "CustomerId"]),
    ColumnSpec::required("Name", &["Name", "CustomerName", "FullName"]),
    ColumnSpec::optional("Phone", &["Phone", "PhoneNumber", "Mobile", "Tel"]),
    ColumnSpec::optional("Email", &["Email", "EmailAddress", "Mail"]),
    ColumnSpec::optional("CustomerType", &["CustomerType", "Type", "Group"]),
    ColumnSpec::optional("Address", &["Address"]),
    ColumnSpec::optional("Tier", &["Tier", "Rank", "Level", "MemberTier"]),
    ColumnSpec::optional("Points", &["Points", "LoyaltyPoints", "Point"]),
];

/// One customer line as read from a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerRow(pub NewCustomer);

impl CustomerRow {
    /// Reads a record. Returns `None` when the name is blank.
    ///
    /// Unknown tiers read as Regular; unparsable or negative points as 0.
    pub fn from_record(map: &HeaderMap, record: &StringRecord) -> Option<CustomerRow> {
        let name = non_empty(map.get(record, "Name"))?;
        Some(CustomerRow(NewCustomer {
            name,
            phone: non_empty(map.get(record, "Phone")),
            email: non_empty(map.get(record, "Email")),
            customer_type: non_empty(map.get(record, "CustomerType")),
            address: non_empty(map.get(record, "Address")),
            tier: Tier::parse_lenient(map.get(record, "Tier")),
            points: number::parse_int_lenient(map.get(record, "Points"))
                .unwrap_or(0)
                .max(0),
        }))
    }

    pub fn into_inner(self) -> NewCustomer {
        self.0
    }
}

/// Export line for a customer, in [`CUSTOMER_HEADERS`] order.
pub fn customer_record(customer: &Customer) -> Vec<String> {
    vec![
        customer.id.to_string(),
        customer.name.clone(),
        opt_str(&customer.phone),
        opt_str(&customer.email),
        opt_str(&customer.customer_type),
        opt_str(&customer.address),
        customer.tier.to_string(),
        customer.points.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_row_defaults() {
        let map = HeaderMap::resolve(
            &StringRecord::from(vec!["Customer Name", "Phone", "Tier", "Points"]),
            CUSTOMER_COLUMNS,
        )
        .unwrap();
        let row = CustomerRow::from_record(&map, &StringRecord::from(vec!["Ana", "", "VIP", "x"]))
            .unwrap()
            .into_inner();

        assert_eq!(row.name, "Ana");
        assert_eq!(row.phone, None);
        assert_eq!(row.tier, Tier::Regular);
        assert_eq!(row.points, 0);
    }

    #[test]
    fn test_customer_rows_compare_by_value() {
        let map = HeaderMap::resolve(&StringRecord::from(vec!["Name", "Phone"]), CUSTOMER_COLUMNS).unwrap();
        let read = |name: &str| CustomerRow::from_record(&map, &StringRecord::from(vec![name, "0901"])).unwrap();

        assert_eq!(read("Ana"), read(" Ana "));
        assert_ne!(read("Ana"), read("Bo"));
        assert_eq!(
            read("Ana"),
            CustomerRow(NewCustomer {
                name: "Ana".to_string(),
                phone: Some("0901".to_string()),
                ..NewCustomer::default()
            })
        );
    }

    #[test]
    fn test_customer_requires_name_column() {
        let err = HeaderMap::resolve(&StringRecord::from(vec!["Phone"]), CUSTOMER_COLUMNS).unwrap_err();
        assert_eq!(err.column, "Name");
    }
}
