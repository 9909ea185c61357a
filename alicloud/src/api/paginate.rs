//! Pagination accumulation for page-number and marker style listings

use std::future::Future;

use super::error::ApiError;

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const DEFAULT_MAX_PAGES: usize = 1000;

/// One page of a marker paginated listing
#[derive(Debug, Clone)]
pub struct MarkerPage<T> {
    pub items: Vec<T>,
    pub next_marker: Option<String>,
}

/// Fetches pages `1, 2, ...` until one comes back shorter than `page_size`
pub async fn collect_pages<T, F, Fut>(
    page_size: usize,
    max_pages: usize,
    mut fetch: F,
) -> Result<Vec<T>, ApiError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>, ApiError>>,
{
    let page_size = page_size.max(1);
    let mut all = Vec::new();

    for page in 1..=max_pages {
        let items = fetch(page as u32).await?;
        let count = items.len();
        all.extend(items);
        tracing::debug!(page, count, total = all.len(), "fetched page");
        if count < page_size {
            return Ok(all);
        }
    }

    Err(ApiError::PageLimitExceeded(max_pages))
}

/// Follows continuation markers until the service stops returning one
pub async fn collect_marker_pages<T, F, Fut>(max_pages: usize, mut fetch: F) -> Result<Vec<T>, ApiError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<MarkerPage<T>, ApiError>>,
{
    let mut all = Vec::new();
    let mut marker: Option<String> = None;

    for _ in 0..max_pages {
        let page = fetch(marker.take()).await?;
        all.extend(page.items);
        match page.next_marker.filter(|m| !m.is_empty()) {
            Some(next) => marker = Some(next),
            None => return Ok(all),
        }
    }

    Err(ApiError::PageLimitExceeded(max_pages))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn stops_on_short_page_and_returns_union() {
        let requested = Mutex::new(Vec::new());

        let items = collect_pages(2, DEFAULT_MAX_PAGES, |page| {
            requested.lock().unwrap().push(page);
            async move {
                Ok(match page {
                    1 => vec!["a", "b"],
                    2 => vec!["c", "d"],
                    _ => vec!["e"],
                })
            }
        })
        .await
        .unwrap();

        assert_eq!(items, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(requested.into_inner().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn empty_first_page_yields_nothing() {
        let items: Vec<u32> = collect_pages(50, 10, |_| async { Ok(Vec::new()) })
            .await
            .unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn endless_full_pages_hit_the_cap() {
        let result = collect_pages(1, 5, |page| async move { Ok(vec![page]) }).await;
        assert!(matches!(result, Err(ApiError::PageLimitExceeded(5))));
    }

    #[tokio::test]
    async fn marker_pages_follow_continuation() {
        let seen = Mutex::new(Vec::new());

        let items = collect_marker_pages(DEFAULT_MAX_PAGES, |marker| {
            seen.lock().unwrap().push(marker.clone());
            async move {
                Ok(match marker.as_deref() {
                    None => MarkerPage {
                        items: vec![1, 2],
                        next_marker: Some("m1".to_string()),
                    },
                    Some("m1") => MarkerPage {
                        items: vec![3],
                        next_marker: Some(String::new()),
                    },
                    Some(other) => panic!("unexpected marker {other}"),
                })
            }
        })
        .await
        .unwrap();

        assert_eq!(items, vec![1, 2, 3]);
        assert_eq!(
            seen.into_inner().unwrap(),
            vec![None, Some("m1".to_string())]
        );
    }

    #[tokio::test]
    async fn fetch_errors_propagate() {
        let result: Result<Vec<u32>, _> = collect_marker_pages(10, |_| async {
            Err(ApiError::InvalidRequest("denied".to_string()))
        })
        .await;
        assert!(matches!(result, Err(ApiError::InvalidRequest(_))));
    }
}
