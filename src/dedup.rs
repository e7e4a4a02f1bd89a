use std::collections::HashSet;

/// Why a record was refused admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No URL at all. Checked before uniqueness; the seen-set is not touched.
    MissingUrl,
    /// URL already admitted earlier in the run.
    Duplicate,
}

/// Admission gate keyed by product URL.
///
/// Owned state, constructed at traversal start and passed down; no
/// process-wide set. `&mut self` on `admit` makes two racing calls for
/// the same URL unrepresentable in the sequential core. A shared-crawl
/// variant would wrap the set in a lock behind the same contract.
#[derive(Debug, Default)]
pub struct DedupFilter {
    seen: HashSet<String>,
}

impl DedupFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a URL on first sight. Presence first, uniqueness second:
    /// a missing URL is reported as [`Rejection::MissingUrl`] and never
    /// recorded.
    pub fn admit(&mut self, url: Option<&str>) -> Result<(), Rejection> {
        let url = url.filter(|u| !u.is_empty()).ok_or(Rejection::MissingUrl)?;
        if self.seen.insert(url.to_string()) {
            Ok(())
        } else {
            Err(Rejection::Duplicate)
        }
    }

    /// Seed the set from a durable ledger (resume support).
    pub fn preload<I: IntoIterator<Item = String>>(&mut self, urls: I) {
        self.seen.extend(urls);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_each_distinct_url_once() {
        let mut filter = DedupFilter::new();
        let urls = ["https://a/p/1", "https://a/p/2", "https://a/p/1", "https://a/p/3", "https://a/p/2"];
        let admitted: Vec<bool> = urls
            .iter()
            .map(|u| filter.admit(Some(u)).is_ok())
            .collect();
        assert_eq!(admitted, [true, true, false, true, false]);
        assert_eq!(filter.len(), 3);
    }

    #[test]
    fn duplicate_is_reported_as_duplicate() {
        let mut filter = DedupFilter::new();
        filter.admit(Some("https://a/p/1")).unwrap();
        assert_eq!(filter.admit(Some("https://a/p/1")), Err(Rejection::Duplicate));
    }

    #[test]
    fn missing_url_never_touches_the_set() {
        let mut filter = DedupFilter::new();
        assert_eq!(filter.admit(None), Err(Rejection::MissingUrl));
        assert_eq!(filter.admit(Some("")), Err(Rejection::MissingUrl));
        assert_eq!(filter.len(), 0);
    }

    #[test]
    fn preload_marks_urls_as_seen() {
        let mut filter = DedupFilter::new();
        filter.preload(vec!["https://a/p/1".to_string()]);
        assert_eq!(filter.admit(Some("https://a/p/1")), Err(Rejection::Duplicate));
        assert!(filter.admit(Some("https://a/p/2")).is_ok());
    }
}
