use crate::error::Result;
use crate::response::Response;
use crate::rest::{CanvasClient, RequestDescriptor};
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use url::Url;

/// Relation links parsed from a `Link` header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageLinks {
    pub current: Option<String>,
    pub next: Option<String>,
    pub prev: Option<String>,
    pub first: Option<String>,
    pub last: Option<String>,
}

impl PageLinks {
    /// Parse `<url>; rel="next", <url>; rel="last"` style headers.
    /// Unknown relations and malformed entries are ignored.
    pub fn parse(header: &str) -> Self {
        let mut links = PageLinks::default();

        for part in header.split(',') {
            let part = part.trim();
            let (Some(start), Some(end)) = (part.find('<'), part.find('>')) else {
                continue;
            };
            if end <= start {
                continue;
            }
            let url = part[start + 1..end].trim().to_string();

            for param in part[end + 1..].split(';') {
                let Some(rel) = param.trim().strip_prefix("rel=") else {
                    continue;
                };
                for rel in rel.trim_matches('"').split_whitespace() {
                    let slot = match rel {
                        "current" => &mut links.current,
                        "next" => &mut links.next,
                        "prev" | "previous" => &mut links.prev,
                        "first" => &mut links.first,
                        "last" => &mut links.last,
                        _ => continue,
                    };
                    *slot = Some(url.clone());
                }
            }
        }

        links
    }

    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

/// Forward-only iterator over every item of a paginated collection.
///
/// Holds one decoded page at a time and the URL of the next one. Pages are
/// fetched through the client, so they get the same credential and refresh
/// handling as any other request. After an error the iterator is finished.
pub struct Paginator<'a, T> {
    client: &'a CanvasClient,
    buffer: VecDeque<T>,
    next: Option<String>,
    current: Option<String>,
    pages_fetched: usize,
    done: bool,
}

impl<'a, T> Paginator<'a, T>
where
    T: DeserializeOwned,
{
    /// Start from an already fetched first page, requested from `request_url`
    pub fn from_response(
        client: &'a CanvasClient,
        request_url: &Url,
        first: Response,
    ) -> Result<Self> {
        let mut paginator = Paginator {
            client,
            buffer: VecDeque::new(),
            next: None,
            current: Some(request_url.to_string()),
            pages_fetched: 0,
            done: false,
        };
        paginator.load(first)?;
        Ok(paginator)
    }

    /// Number of pages fetched so far, including the first
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Drain all remaining pages
    pub fn collect_all(self) -> Result<Vec<T>> {
        self.collect()
    }

    fn load(&mut self, response: Response) -> Result<()> {
        let items: Vec<T> = response.json()?;
        let PageLinks { next, current, .. } = response.links();

        self.pages_fetched += 1;
        self.buffer.extend(items);

        // a page pointing at itself would loop forever
        self.next = match next {
            Some(next)
                if same_page(&next, self.current.as_deref())
                    || same_page(&next, current.as_deref()) =>
            {
                None
            }
            other => other,
        };
        tracing::debug!(
            page = self.pages_fetched,
            items = self.buffer.len(),
            has_next = self.next.is_some(),
            "fetched collection page"
        );
        Ok(())
    }

    fn fetch_next(&mut self, url: String) -> Result<()> {
        let response = self.client.execute(&RequestDescriptor::get(url.clone()))?;
        self.current = Some(url);
        self.load(response)
    }
}

fn same_page(link: &str, page: Option<&str>) -> bool {
    let Some(page) = page else {
        return false;
    };
    match (Url::parse(link), Url::parse(page)) {
        (Ok(link), Ok(page)) => link == page,
        _ => link == page,
    }
}

impl<T> Iterator for Paginator<'_, T>
where
    T: DeserializeOwned,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            if self.done {
                return None;
            }
            let Some(url) = self.next.take() else {
                self.done = true;
                return None;
            };
            if let Err(err) = self.fetch_next(url) {
                self.done = true;
                return Some(Err(err));
            }
        }
    }
}
