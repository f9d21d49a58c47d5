//! HTML parsing for rutor-style result pages.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::{ListingError, ListingRow};

/// CSS selectors used to walk a result table.
struct RowSelectors {
    row: Selector,
    cell: Selector,
    anchor: Selector,
    download: Selector,
    magnet: Selector,
    seeders: Selector,
    leechers: Selector,
}

impl RowSelectors {
    fn new() -> Result<Self, ListingError> {
        let parse = |s: &str| {
            Selector::parse(s).map_err(|e| ListingError::Parse(format!("selector {}: {}", s, e)))
        };

        Ok(Self {
            row: parse("tr.gai, tr.tum")?,
            cell: parse("td")?,
            anchor: parse("a")?,
            download: parse("a.downgif")?,
            magnet: parse(r#"a[href^="magnet:"]"#)?,
            seeders: parse("span.green")?,
            leechers: parse("span.red")?,
        })
    }
}

/// Parse a search result page into listing rows.
///
/// Rows keep document order. Rows with fewer than five cells are skipped,
/// and parsing stops once `max_results` rows have been collected.
pub fn parse_listing_page(
    html: &str,
    base_url: &Url,
    max_results: usize,
) -> Result<Vec<ListingRow>, ListingError> {
    let selectors = RowSelectors::new()?;
    let document = Html::parse_document(html);
    let mut rows = Vec::new();

    for row in document.select(&selectors.row) {
        if rows.len() >= max_results {
            break;
        }

        let cells: Vec<ElementRef> = row.select(&selectors.cell).collect();
        if cells.len() < 5 {
            continue;
        }

        rows.push(parse_row(&cells, &selectors, base_url));
    }

    Ok(rows)
}

fn parse_row(cells: &[ElementRef], selectors: &RowSelectors, base_url: &Url) -> ListingRow {
    let links = cells[1];

    let download_url = links
        .select(&selectors.download)
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| absolute_url(base_url, href));

    let magnet = links
        .select(&selectors.magnet)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string);

    let title_link = links.select(&selectors.anchor).last();
    let title = title_link.map(element_text).unwrap_or_default();
    let page_url = title_link
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| absolute_url(base_url, href))
        .unwrap_or_else(|| base_url.to_string());

    let seeders = peer_count(cells[4], &selectors.seeders);
    let leechers = peer_count(cells[4], &selectors.leechers);

    ListingRow::new(title, page_url)
        .with_date(element_text(cells[0]))
        .with_download_url(download_url)
        .with_pointer(magnet)
        .with_size(element_text(cells[2]))
        .with_peers(seeders, leechers)
}

/// Text content with whitespace (including `&nbsp;`) collapsed.
fn element_text(element: ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn peer_count(cell: ElementRef, selector: &Selector) -> u32 {
    cell.select(selector)
        .next()
        .map(element_text)
        .and_then(|text| text.parse().ok())
        .unwrap_or(0)
}

/// Resolve relative and protocol-relative hrefs against the site URL.
fn absolute_url(base_url: &Url, href: &str) -> Option<String> {
    base_url.join(href).ok().map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const HASH_B: &str = "BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";

    fn base() -> Url {
        Url::parse("https://rutor.info").unwrap()
    }

    fn result_row(class: &str, id: u32, title: &str, magnet: Option<&str>, seeds: &str) -> String {
        let magnet_link = magnet
            .map(|m| format!(r#"<a href="{}"><img src="/m.png"></a>"#, m))
            .unwrap_or_default();
        format!(
            r#"<tr class="{class}">
                <td>01&nbsp;Янв&nbsp;24</td>
                <td><a class="downgif" href="//d.rutor.info/download/{id}"><img src="/d.gif"></a>
                    {magnet_link}
                    <a href="/torrent/{id}/slug">{title}</a></td>
                <td align="right">1.37&nbsp;GB</td>
                <td align="right">5</td>
                <td align="center"><span class="green"><img src="/s.gif">&nbsp;{seeds}</span>&nbsp;<span class="red">&nbsp;4</span></td>
            </tr>"#
        )
    }

    fn page(rows: &[String]) -> String {
        format!(
            r#"<html><body><div id="index"><table>
                <tr class="backgr"><td>Добавлен</td><td>Название</td><td>Размер</td><td>Пиры</td></tr>
                {}
            </table></div></body></html>"#,
            rows.join("\n")
        )
    }

    #[test]
    fn test_parse_single_row() {
        let magnet = format!("magnet:?xt=urn:btih:{}&dn=test", HASH_A);
        let html = page(&[result_row("gai", 1, "Some Movie (2024) WEB-DL", Some(&magnet), "12")]);

        let rows = parse_listing_page(&html, &base(), 50).unwrap();
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!(row.date(), "01 Янв 24");
        assert_eq!(row.title(), "Some Movie (2024) WEB-DL");
        assert_eq!(row.page_url(), "https://rutor.info/torrent/1/slug");
        assert_eq!(row.download_url(), Some("https://d.rutor.info/download/1"));
        assert_eq!(row.content_pointer(), Some(magnet.as_str()));
        assert_eq!(row.size(), "1.37 GB");
        assert_eq!(row.seeders(), 12);
        assert_eq!(row.leechers(), 4);
        assert_eq!(row.content_hash(), HASH_A);
    }

    #[test]
    fn test_parse_preserves_document_order() {
        let html = page(&[
            result_row("gai", 1, "First", None, "1"),
            result_row("tum", 2, "Second", None, "2"),
            result_row("gai", 3, "Third", None, "3"),
        ]);

        let rows = parse_listing_page(&html, &base(), 50).unwrap();
        let titles: Vec<&str> = rows.iter().map(|r| r.title()).collect();
        assert_eq!(titles, vec!["First", "Second", "Third"]);
    }

    #[test]
    fn test_parse_stops_at_max_results() {
        let rows: Vec<String> = (0..10)
            .map(|i| result_row("gai", i, &format!("Title {}", i), None, "1"))
            .collect();
        let html = page(&rows);

        let parsed = parse_listing_page(&html, &base(), 3).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[2].title(), "Title 2");
    }

    #[test]
    fn test_parse_skips_short_rows() {
        let short = r#"<tr class="gai"><td>01 Jan 24</td><td colspan="2"><a href="/torrent/9">Short</a></td><td>1 GB</td></tr>"#;
        let html = page(&[short.to_string(), result_row("tum", 2, "Full", None, "7")]);

        let rows = parse_listing_page(&html, &base(), 50).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title(), "Full");
    }

    #[test]
    fn test_parse_hash_is_lowercased() {
        let magnet = format!("magnet:?xt=urn:btih:{}", HASH_B);
        let html = page(&[result_row("gai", 1, "Upper", Some(&magnet), "1")]);

        let rows = parse_listing_page(&html, &base(), 50).unwrap();
        assert_eq!(rows[0].content_hash(), HASH_B.to_lowercase());
    }

    #[test]
    fn test_parse_missing_magnet_and_bad_counts() {
        let html = page(&[result_row("gai", 1, "No Magnet", None, "n/a")]);

        let rows = parse_listing_page(&html, &base(), 50).unwrap();
        assert!(rows[0].content_pointer().is_none());
        assert_eq!(rows[0].content_hash(), "");
        assert_eq!(rows[0].seeders(), 0);
    }

    #[test]
    fn test_parse_page_without_results() {
        let rows = parse_listing_page(&page(&[]), &base(), 50).unwrap();
        assert!(rows.is_empty());
    }
}
