use std::borrow::Cow;
use std::collections::HashSet;

use crate::drivers::Column;

/// Rewrites text values of selected columns before they are quoted.
pub trait ValueTransform: Send + Sync {
    fn applies_to(&self, table: &str, column: &Column) -> bool;

    fn transform<'v>(&self, value: &'v str) -> Cow<'v, str>;
}

/// Decodes HTML entities left behind by legacy input escaping.
///
/// Columns listed as `table.column` hold intentional HTML and are left alone;
/// binary columns never reach transforms.
#[derive(Debug, Default)]
pub struct DecodeHtmlEntities {
    html_columns: HashSet<String>,
}

impl DecodeHtmlEntities {
    pub fn new<I, S>(html_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { html_columns: html_columns.into_iter().map(Into::into).collect() }
    }
}

impl ValueTransform for DecodeHtmlEntities {
    fn applies_to(&self, table: &str, column: &Column) -> bool {
        !self.html_columns.contains(&format!("{}.{}", table, column.name))
    }

    fn transform<'v>(&self, value: &'v str) -> Cow<'v, str> {
        if value.contains('&') {
            html_escape::decode_html_entities(value)
        } else {
            Cow::Borrowed(value)
        }
    }
}

/// A closure bound to a single column.
pub struct ColumnTransform<F> {
    table: String,
    column: String,
    f: F,
}

impl<F> ColumnTransform<F>
where
    F: Fn(&str) -> String + Send + Sync,
{
    pub fn new(table: impl Into<String>, column: impl Into<String>, f: F) -> Self {
        Self { table: table.into(), column: column.into(), f }
    }
}

impl<F> ValueTransform for ColumnTransform<F>
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn applies_to(&self, table: &str, column: &Column) -> bool {
        self.table == table && self.column == column.name
    }

    fn transform<'v>(&self, value: &'v str) -> Cow<'v, str> {
        Cow::Owned((self.f)(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_entities_outside_html_columns() {
        let decode = DecodeHtmlEntities::new(["tl_content.text"]);
        let headline = Column::new("headline", "TEXT");
        let text = Column::new("text", "TEXT");

        assert!(decode.applies_to("tl_content", &headline));
        assert!(!decode.applies_to("tl_content", &text));
        assert!(decode.applies_to("tl_news", &text));

        assert_eq!(decode.transform("Tom &amp; Jerry &lt;3 &#40;1&#41;"), "Tom & Jerry <3 (1)");
        assert!(matches!(decode.transform("plain"), Cow::Borrowed("plain")));
    }
}
