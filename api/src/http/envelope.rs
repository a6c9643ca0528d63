//! The `{success, data, meta?}` response envelope shared by every `/api/v1`
//! handler, plus the query-parameter parsing shared across list
//! endpoints.

use axum::extract::Query;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, ErrorCode};
use crate::store::{ArticleFilter, ArticleSort, Page, SortDir, SortField};

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
    /// Filled in by `inject_request_id` from the propagated `x-request-id`
    /// header; always `null` at construction time.
    pub request_id: Option<String>,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct PageMeta {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub current_page: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PageMeta {
    pub fn new(total: i64, limit: i64, offset: i64, has_next: bool, has_prev: bool) -> Self {
        let limit = limit.max(1);
        let total_pages = ((total + limit - 1) / limit).max(1);
        let current_page = (offset / limit) + 1;
        Self { total, limit, offset, current_page, total_pages, has_next, has_prev }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data, meta: None, request_id: None, timestamp: chrono::Utc::now().to_rfc3339() }
    }

    pub fn paged(data: T, meta: PageMeta) -> Self {
        Self { success: true, data, meta: Some(meta), request_id: None, timestamp: chrono::Utc::now().to_rfc3339() }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct ArticleListQuery {
    pub source: Option<String>,
    pub category: Option<String>,
    pub keyword: Option<String>,
    #[serde(alias = "q")]
    pub search: Option<String>,
    pub start_date: Option<chrono::DateTime<chrono::Utc>>,
    pub end_date: Option<chrono::DateTime<chrono::Utc>>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub type ArticleListParams = Query<ArticleListQuery>;

impl ArticleListQuery {
    pub fn filter(&self) -> ArticleFilter {
        ArticleFilter {
            source: self.source.clone(),
            category: self.category.clone(),
            keyword: self.keyword.clone(),
            search: self.search.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }

    pub fn sort(&self) -> Result<ArticleSort, AppError> {
        let field = match self.sort_by.as_deref() {
            None | Some("published") => SortField::Published,
            Some("created_at") => SortField::CreatedAt,
            Some("title") => SortField::Title,
            Some(other) => {
                return Err(AppError::new(ErrorCode::InvalidRequest, format!("unknown sort_by: {other}")));
            }
        };
        let dir = match self.sort_order.as_deref() {
            None | Some("desc") => SortDir::Desc,
            Some("asc") => SortDir::Asc,
            Some(other) => {
                return Err(AppError::new(ErrorCode::InvalidRequest, format!("unknown sort_order: {other}")));
            }
        };
        Ok(ArticleSort { field, dir })
    }

    pub fn page(&self) -> Page {
        Page::clamp(self.limit.unwrap_or(20), self.offset.unwrap_or(0))
    }

    /// A stable identity for this query, used as the cache key.
    pub fn cache_hash(&self) -> String {
        crate::cache::keys::hash_filter(&[
            self.source.as_deref().unwrap_or(""),
            self.category.as_deref().unwrap_or(""),
            self.keyword.as_deref().unwrap_or(""),
            self.search.as_deref().unwrap_or(""),
            &self.start_date.map(|d| d.to_rfc3339()).unwrap_or_default(),
            &self.end_date.map(|d| d.to_rfc3339()).unwrap_or_default(),
            self.sort_by.as_deref().unwrap_or(""),
            self.sort_order.as_deref().unwrap_or(""),
            &self.limit.unwrap_or(20).to_string(),
            &self.offset.unwrap_or(0).to_string(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(sort_by: Option<&str>, sort_order: Option<&str>) -> ArticleListQuery {
        ArticleListQuery {
            source: None,
            category: None,
            keyword: None,
            search: None,
            start_date: None,
            end_date: None,
            sort_by: sort_by.map(str::to_string),
            sort_order: sort_order.map(str::to_string),
            limit: None,
            offset: None,
        }
    }

    #[test]
    fn sort_defaults_to_published_desc() {
        let sort = query(None, None).sort().unwrap();
        assert_eq!(sort.field, SortField::Published);
        assert_eq!(sort.dir, SortDir::Desc);
    }

    #[test]
    fn sort_accepts_known_fields_and_directions() {
        let sort = query(Some("title"), Some("asc")).sort().unwrap();
        assert_eq!(sort.field, SortField::Title);
        assert_eq!(sort.dir, SortDir::Asc);
    }

    #[test]
    fn sort_rejects_unknown_field() {
        let err = query(Some("bogus"), None).sort().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);
    }

    #[test]
    fn sort_rejects_unknown_direction() {
        let err = query(None, Some("sideways")).sort().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);
    }

    #[test]
    fn cache_hash_is_stable_and_distinguishes_queries() {
        let mut q1 = query(Some("title"), Some("asc"));
        q1.source = Some("nos.nl".to_string());
        let mut q2 = query(Some("title"), Some("asc"));
        q2.source = Some("nos.nl".to_string());
        assert_eq!(q1.cache_hash(), q2.cache_hash());

        let mut q3 = query(Some("title"), Some("asc"));
        q3.source = Some("nu.nl".to_string());
        assert_ne!(q1.cache_hash(), q3.cache_hash());
    }
}
