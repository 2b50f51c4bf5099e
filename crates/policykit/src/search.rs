//! Lazy iteration over paginated listings.
//!
//! Default discovery and name lookup share one shape: walk the pages in
//! order, test each item, stop at the first match. [`Paginated`] fetches the
//! next page only when the current one is used up.

use crate::error::Result;
use crate::types::{Cursor, Page};
use std::vec;

/// Iterator over every item of a paginated listing.
///
/// Yields `Err` once if fetching a page fails, then stops.
pub struct Paginated<T, F>
where
    F: FnMut(&Cursor) -> Result<Page<T>>,
{
    current: vec::IntoIter<T>,
    next: Option<Cursor>,
    fetch: F,
    pages: usize,
    failed: bool,
}

impl<T, F> Paginated<T, F>
where
    F: FnMut(&Cursor) -> Result<Page<T>>,
{
    /// Start from an already fetched first page.
    pub fn new(first: Page<T>, fetch: F) -> Self {
        Self {
            current: first.items.into_iter(),
            next: first.next,
            fetch,
            pages: 1,
            failed: false,
        }
    }

    /// Number of pages fetched so far, including the first.
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// First item matching `predicate`, in listing order.
    ///
    /// Returns `Ok(None)` once every page has been examined without a match.
    pub fn find_first<P>(&mut self, mut predicate: P) -> Result<Option<T>>
    where
        P: FnMut(&T) -> bool,
    {
        for item in self.by_ref() {
            let item = item?;
            if predicate(&item) {
                return Ok(Some(item));
            }
        }
        Ok(None)
    }
}

impl<T, F> Iterator for Paginated<T, F>
where
    F: FnMut(&Cursor) -> Result<Page<T>>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(item) = self.current.next() {
                return Some(Ok(item));
            }
            let cursor = self.next.take()?;
            match (self.fetch)(&cursor) {
                Ok(page) => {
                    self.pages += 1;
                    self.current = page.items.into_iter();
                    self.next = page.next;
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::cell::Cell;

    /// Pages of consecutive numbers, cursors are the page index.
    fn numbered_pages(count: usize, per_page: usize) -> Vec<Page<usize>> {
        (0..count)
            .map(|i| Page {
                items: (i * per_page..(i + 1) * per_page).collect(),
                next: (i + 1 < count).then(|| Cursor::new((i + 1).to_string())),
            })
            .collect()
    }

    fn fetch_from(pages: &[Page<usize>]) -> impl FnMut(&Cursor) -> Result<Page<usize>> + '_ {
        move |cursor| {
            let index: usize = cursor.as_str().parse().unwrap();
            Ok(pages[index].clone())
        }
    }

    #[test]
    fn test_iterates_across_pages_in_order() {
        let pages = numbered_pages(3, 2);
        let all: Vec<usize> = Paginated::new(pages[0].clone(), fetch_from(&pages))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(all, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_find_first_stops_fetching_after_match() {
        let pages = numbered_pages(4, 3);
        let fetched = Cell::new(0);
        let mut search = Paginated::new(pages[0].clone(), |cursor: &Cursor| {
            fetched.set(fetched.get() + 1);
            let index: usize = cursor.as_str().parse().unwrap();
            Ok(pages[index].clone())
        });

        let found = search.find_first(|n| *n == 4).unwrap();
        assert_eq!(found, Some(4));
        assert_eq!(fetched.get(), 1);
        assert_eq!(search.pages(), 2);
    }

    #[test]
    fn test_find_first_returns_first_of_several_matches() {
        let pages = numbered_pages(3, 4);
        let found = Paginated::new(pages[0].clone(), fetch_from(&pages))
            .find_first(|n| n % 5 == 0 && *n > 0)
            .unwrap();
        assert_eq!(found, Some(5));
    }

    #[test]
    fn test_exhaustion_examines_every_page() {
        let pages = numbered_pages(5, 2);
        let mut search = Paginated::new(pages[0].clone(), fetch_from(&pages));
        assert_eq!(search.find_first(|n| *n == 100).unwrap(), None);
        assert_eq!(search.pages(), 5);
    }

    #[test]
    fn test_empty_intermediate_page_is_skipped() {
        let first = Page {
            items: vec![1],
            next: Some(Cursor::new("empty")),
        };
        let mut search = Paginated::new(first, |cursor: &Cursor| {
            Ok(match cursor.as_str() {
                "empty" => Page {
                    items: vec![],
                    next: Some(Cursor::new("last")),
                },
                _ => Page::last(vec![2]),
            })
        });
        assert_eq!(search.find_first(|n| *n == 2).unwrap(), Some(2));
    }

    #[test]
    fn test_fetch_error_is_yielded_once() {
        let first = Page {
            items: vec![1],
            next: Some(Cursor::new("boom")),
        };
        let mut search = Paginated::new(first, |_: &Cursor| {
            Err(Error::transport("list policies", "PASSWORD", "reset", None))
        });
        assert!(search.find_first(|n| *n == 2).is_err());
        assert!(search.next().is_none());
    }
}
