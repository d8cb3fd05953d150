use rocket::{
    form,
    http::Status,
    request::{self, FromRequest, Request},
};
use serde::{ser::SerializeMap, Serialize, Serializer};

use crate::error::Error;
use crate::model::mongodb::MongoCollection;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;

/// Which page of a listing to return, taken from the `page` and `limit`
/// query parameters. Pages are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    limit: u32,
}

impl Pagination {
    pub fn new(page: u32, limit: u32) -> Result<Self, Error> {
        if page == 0 {
            return Err(Error::Validation("`page` must be at least 1".to_string()));
        }
        if limit == 0 {
            return Err(Error::Validation("`limit` must be at least 1".to_string()));
        }
        // The database takes the skip as a signed 64-bit integer.
        let skip = u64::from(page - 1) * u64::from(limit);
        if i64::try_from(skip).is_err() {
            return Err(Error::Validation(
                "`page` and `limit` are too large".to_string(),
            ));
        }
        Ok(Self { page, limit })
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// How many items precede this page.
    pub fn skip(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    pub fn to_paginated<T>(self, total: u64, items: Vec<T>) -> Paginated<T> {
        Paginated {
            total,
            page: self.page,
            items,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Read an optional positive integer query parameter.
fn query_u32(req: &Request<'_>, name: &str, default: u32) -> Result<u32, Error> {
    match req.query_value::<u32>(name) {
        None => Ok(default),
        Some(Ok(value)) => Ok(value),
        Some(Err(errors)) => Err(Error::Validation(format!(
            "Invalid `{name}` parameter: {}",
            form_errors(&errors)
        ))),
    }
}

fn form_errors(errors: &form::Errors<'_>) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Pagination {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let pagination = query_u32(req, "page", DEFAULT_PAGE).and_then(|page| {
            query_u32(req, "limit", DEFAULT_LIMIT).and_then(|limit| Pagination::new(page, limit))
        });
        match pagination {
            Ok(pagination) => request::Outcome::Success(pagination),
            Err(e) => request::Outcome::Failure((Status::BadRequest, e)),
        }
    }
}

/// One page of a listing, plus the total number of items across all pages.
///
/// Serializes as `{"total": .., "page": .., "<collection>": [..]}`, where
/// the item key is the name of the collection the items came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Paginated<T> {
    pub total: u64,
    pub page: u32,
    pub items: Vec<T>,
}

impl<T> Paginated<T> {
    /// Convert every item on the page, keeping the page metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            total: self.total,
            page: self.page,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

/// API types that are listed under the name of their backing collection.
pub trait Listed {
    type Source: MongoCollection;
}

impl<T> Serialize for Paginated<T>
where
    T: Serialize + Listed,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("total", &self.total)?;
        map.serialize_entry("page", &self.page)?;
        map.serialize_entry(<T::Source as MongoCollection>::NAME, &self.items)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_counts_previous_pages() {
        assert_eq!(Pagination::default().skip(), 0);
        assert_eq!(Pagination::new(2, 10).unwrap().skip(), 10);
        assert_eq!(Pagination::new(4, 25).unwrap().skip(), 75);
    }

    #[test]
    fn rejects_zero() {
        assert!(matches!(Pagination::new(0, 10), Err(Error::Validation(_))));
        assert!(matches!(Pagination::new(1, 0), Err(Error::Validation(_))));
    }

    #[test]
    fn rejects_unreachable_pages() {
        assert!(matches!(
            Pagination::new(u32::MAX, u32::MAX),
            Err(Error::Validation(_))
        ));
        // The largest pages are still fine with a small limit.
        assert_eq!(
            Pagination::new(u32::MAX, 10).unwrap().skip(),
            u64::from(u32::MAX - 1) * 10
        );
    }

    #[test]
    fn map_keeps_metadata() {
        let page = Pagination::new(2, 3).unwrap().to_paginated(7, vec![1, 2, 3]);
        let mapped = page.map(|n| n * 10);
        assert_eq!(mapped.total, 7);
        assert_eq!(mapped.page, 2);
        assert_eq!(mapped.items, vec![10, 20, 30]);
    }
}
