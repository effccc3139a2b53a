const CORS_HEADERS: [(&str, &str); 4] = [
    ("access-control-allow-origin", "*"),
    ("access-control-allow-methods", "GET,POST,OPTIONS"),
    ("access-control-allow-headers", "*"),
    ("access-control-max-age", "3600"),
];

fn apply_cors_headers(headers: &mut axum::http::HeaderMap) {
    for (name, value) in CORS_HEADERS {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
}

/// Slice of the turn log served by one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PageWindow {
    start: usize,
    end: usize,
    next_cursor: Option<usize>,
}

impl PageWindow {
    fn over(total: usize, cursor: Option<usize>, page_size: Option<usize>) -> Result<Self, HttpApiError> {
        let start = cursor.unwrap_or(0);
        if start > total {
            return Err(HttpApiError::invalid_query(
                "cursor is past the last turn",
                Some(format!("cursor={start} turns={total}")),
            ));
        }
        let size = page_size.map_or(DEFAULT_PAGE_SIZE, |size| size.clamp(1, MAX_PAGE_SIZE));
        let end = total.min(start + size);
        Ok(Self {
            start,
            end,
            next_cursor: (end < total).then_some(end),
        })
    }
}
