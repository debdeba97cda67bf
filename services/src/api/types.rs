//! Request and response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::CollectionRow;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// JSON alternative to a multipart upload; `image` may be a bare base64
/// string or a `data:` URL.
#[derive(Debug, Deserialize)]
pub struct ContributeJson {
    pub image: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributeResponse {
    pub message: String,
    pub file_url: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CollectionsListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub query: Option<String>,
}

impl CollectionsListQuery {
    pub fn page(&self) -> i64 {
        self.page.filter(|p| *p > 0).unwrap_or(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

/// A collection row as returned by the listing and create routes.
#[derive(Debug, Serialize, Deserialize)]
pub struct CollectionItem {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

impl From<CollectionRow> for CollectionItem {
    fn from(row: CollectionRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CollectionsListResponse {
    pub collections: Vec<CollectionItem>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDetail {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub contribution_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct CollectionCreateRequest {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_defaults_and_bounds() {
        let q = CollectionsListQuery::default();
        assert_eq!((q.page(), q.limit(), q.offset()), (1, 10, 0));

        let q = CollectionsListQuery {
            page: Some(3),
            limit: Some(500),
            query: None,
        };
        assert_eq!((q.page(), q.limit(), q.offset()), (3, 100, 200));

        let q = CollectionsListQuery {
            page: Some(-2),
            limit: Some(0),
            query: None,
        };
        assert_eq!((q.page(), q.limit(), q.offset()), (1, 10, 0));
    }

    #[test]
    fn contribute_response_uses_camel_case() {
        let json = serde_json::to_value(ContributeResponse {
            message: "Contribution uploaded".to_owned(),
            file_url: "uploads/1/a.png".to_owned(),
        })
        .unwrap();
        assert_eq!(json["fileUrl"], "uploads/1/a.png");
    }
}
