use anyhow::{anyhow, Result};
use scraper::{ElementRef, Html, Selector};

/// A parsed page. Queries take CSS selectors and return borrowed nodes.
pub struct Dom {
    html: Html,
}

#[derive(Clone, Copy)]
pub struct Node<'a> {
    el: ElementRef<'a>,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector {css:?}: {e:?}"))
}

impl Dom {
    pub fn parse(body: &str) -> Self {
        Self {
            html: Html::parse_document(body),
        }
    }

    pub fn find_all(&self, css: &str) -> Result<Vec<Node<'_>>> {
        let sel = selector(css)?;
        Ok(self.html.select(&sel).map(|el| Node { el }).collect())
    }

    pub fn find(&self, css: &str) -> Result<Option<Node<'_>>> {
        let sel = selector(css)?;
        Ok(self.html.select(&sel).next().map(|el| Node { el }))
    }

    pub fn full_text(&self) -> String {
        self.html.root_element().text().collect()
    }
}

impl<'a> Node<'a> {
    pub fn find_all(&self, css: &str) -> Result<Vec<Node<'a>>> {
        let sel = selector(css)?;
        Ok(self.el.select(&sel).map(|el| Node { el }).collect())
    }

    pub fn find(&self, css: &str) -> Result<Option<Node<'a>>> {
        let sel = selector(css)?;
        Ok(self.el.select(&sel).next().map(|el| Node { el }))
    }

    /// Every descendant text node, concatenated as-is.
    pub fn full_text(&self) -> String {
        self.el.text().collect()
    }

    /// `full_text` with surrounding whitespace removed.
    pub fn text(&self) -> String {
        self.full_text().trim().to_string()
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.el.value().attr(name)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
        <div class="item" data-mount="mft"><h3> First <span>new</span></h3><a href="/a">go</a></div>
        <div class="item"><h3>Second</h3></div>
    </body></html>"#;

    #[test]
    fn find_and_read() {
        let dom = Dom::parse(PAGE);
        let items = dom.find_all("div.item").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].find("h3").unwrap().unwrap().text(), "First new");
        assert_eq!(items[0].attr("data-mount"), Some("mft"));
        assert!(items[1].find("a").unwrap().is_none());
        assert!(!items[1].has_attr("data-mount"));
    }

    #[test]
    fn invalid_selector_is_an_error() {
        let dom = Dom::parse(PAGE);
        assert!(dom.find_all("div[").is_err());
    }
}
