use serde::{Deserialize, Serialize};

const DEFAULT_PER_PAGE: u32 = 20;
const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageParams {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
        }
    }

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> u32 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }

    pub fn limit(&self) -> i64 {
        self.per_page() as i64
    }

    pub fn offset(&self) -> i64 {
        (self.page() as i64 - 1) * self.limit()
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    pub last_page: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, params: PageParams, total: i64) -> Self {
        let per_page = params.per_page();
        let last_page = ((total + per_page as i64 - 1) / per_page as i64).max(1);
        Self {
            items,
            page: params.page(),
            per_page,
            total,
            last_page,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            last_page: self.last_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_clamping() {
        let params = PageParams::default();
        assert_eq!(params.page(), 1);
        assert_eq!(params.per_page(), 20);
        assert_eq!(params.offset(), 0);

        let params = PageParams::new(0, 1000);
        assert_eq!(params.page(), 1);
        assert_eq!(params.per_page(), 100);

        let params = PageParams::new(3, 10);
        assert_eq!(params.offset(), 20);
    }

    #[test]
    fn test_last_page() {
        assert_eq!(Paginated::new(vec![1, 2], PageParams::new(1, 10), 21).last_page, 3);
        assert_eq!(Paginated::<u8>::new(vec![], PageParams::new(1, 10), 0).last_page, 1);
    }
}
