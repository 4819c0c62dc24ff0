use serde::{Deserialize, Serialize};

/// The only status that authorizes a redemption
pub const STATUS_COMPLETED: &str = "completed";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(default)]
    pub id: Option<u64>,
    pub unique_id: String,
    pub status: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Invoice {
    pub fn is_completed(&self) -> bool {
        self.status == STATUS_COMPLETED
    }
}

/// Envelope returned by `GET /v1/shops/{shop}/invoices`
#[derive(Debug, Deserialize)]
pub struct InvoicePage {
    pub data: Vec<Invoice>,
}

/// Exact, case-sensitive match on `unique_id`
pub fn find_by_unique_id<'a>(invoices: &'a [Invoice], unique_id: &str) -> Option<&'a Invoice> {
    invoices.iter().find(|inv| inv.unique_id == unique_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_tolerates_extra_fields() {
        let raw = r#"{
            "data": [
                {"id": 7, "unique_id": "INV-1", "status": "completed", "email": "a@b.c", "total": "9.99"},
                {"unique_id": "INV-2", "status": "pending"}
            ],
            "current_page": 1
        }"#;
        let page: InvoicePage = serde_json::from_str(raw).unwrap();
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.data[0].id, Some(7));
        assert!(page.data[0].is_completed());
        assert!(!page.data[1].is_completed());
    }

    #[test]
    fn test_match_is_exact() {
        let invoices = vec![Invoice {
            id: None,
            unique_id: "INV-1".into(),
            status: "completed".into(),
            email: None,
            created_at: None,
        }];
        assert!(find_by_unique_id(&invoices, "INV-1").is_some());
        assert!(find_by_unique_id(&invoices, "inv-1").is_none());
        assert!(find_by_unique_id(&invoices, "INV-").is_none());
        assert!(find_by_unique_id(&invoices, " INV-1").is_none());
    }

    #[test]
    fn test_status_must_be_literal() {
        let mut invoice = Invoice {
            id: None,
            unique_id: "INV-1".into(),
            status: "Completed".into(),
            email: None,
            created_at: None,
        };
        assert!(!invoice.is_completed());
        invoice.status = "completed".into();
        assert!(invoice.is_completed());
    }
}
