use crate::error::CrawlError;
use crate::models::RawRace;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

static ROW_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}/\d{1,2}").expect("row date regex"));
static HEADER_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})월\s*(\d{1,2})일").expect("header date regex"));
static CARD_DISTANCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(풀코스|하프|울트라|\d+\.?\d*\s*km|\d+\.?\d*k)").expect("card distance regex")
});
static CARD_LOCATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"지역:\s*([\w가-힣]+)").expect("card location regex"));
static CARD_ORGANIZER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"주최:\s*([\w가-힣]+)").expect("card organizer regex"));

/// Promotional card shown between listings ("Hosting a race?").
const PROMO_PHRASE: &str = "대회를 주최하시나요";
/// Cards with less text than this are icons / spacers.
const MIN_CARD_TEXT_CHARS: usize = 6;

fn selector(css: &str) -> Result<Selector, CrawlError> {
    Selector::parse(css).map_err(|e| CrawlError::Selector(format!("{css}: {e:?}")))
}

fn cell_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Resolve an href against the page it came from.
fn absolute_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("javascript:") || href == "#" {
        return None;
    }
    base.join(href).ok().map(String::from)
}

// ── Table listing (roadrun.co.kr) ─────────────────────────────────────────────

/// Rows whose first cell starts with a `M/D` date.
///
/// Layout: date | name+distance | location | organizer ☎ phone
pub fn parse_schedule_table(html: &str, base: &Url) -> Result<Vec<RawRace>, CrawlError> {
    let doc = Html::parse_document(html);
    let tr_sel = selector("tr")?;
    let td_sel = selector("td")?;
    let a_sel = selector("a")?;

    let mut rows = Vec::new();

    for tr in doc.select(&tr_sel) {
        let cells: Vec<ElementRef<'_>> = tr.select(&td_sel).collect();
        let Some(first) = cells.first() else { continue };

        let date = cell_text(*first);
        if !ROW_DATE_RE.is_match(&date) || cells.len() < 2 {
            continue;
        }

        let name_cell = cells[1];
        let link = name_cell
            .select(&a_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| absolute_link(base, href));

        rows.push(RawRace {
            date,
            title: cell_text(name_cell),
            distance: None,
            location: cells.get(2).map(|c| cell_text(*c)).unwrap_or_default(),
            organizer: cells.get(3).map(|c| cell_text(*c)).unwrap_or_default(),
            link,
        });
    }

    debug!("schedule table: {} candidate rows", rows.len());
    Ok(rows)
}

// ── Date-grouped cards (gorunning.kr) ─────────────────────────────────────────

/// Walk each `h3` date header's following siblings up to the next `h3`,
/// collecting race cards that link to a `/races/` detail page.
pub fn parse_grouped_cards(html: &str, base: &Url) -> Result<Vec<RawRace>, CrawlError> {
    let doc = Html::parse_document(html);
    let header_sel = selector("h3")?;
    let card_sel = selector("div.mb-2")?;
    let a_sel = selector("a")?;

    let mut rows = Vec::new();

    for header in doc.select(&header_sel) {
        let header_text = cell_text(header);
        let Some(c) = HEADER_DATE_RE.captures(&header_text) else { continue };
        let date = format!("{}월 {}일", &c[1], &c[2]);

        let Some(parent) = header.parent() else { continue };

        // A card wrapping another card is read once, as the outer one.
        let inside_card = |card: &ElementRef<'_>| {
            card.ancestors()
                .take_while(|node| node.id() != parent.id())
                .filter_map(ElementRef::wrap)
                .any(|el| card_sel.matches(&el))
        };

        for sibling in header.next_siblings().filter_map(ElementRef::wrap) {
            if sibling.value().name() == "h3" {
                break;
            }

            let cards = std::iter::once(sibling)
                .filter(|el| card_sel.matches(el))
                .chain(sibling.select(&card_sel))
                .filter(|card| !inside_card(card));

            for card in cards {
                if let Some(raw) = parse_card(card, &date, &a_sel, base) {
                    rows.push(raw);
                }
            }
        }
    }

    debug!("grouped cards: {} candidate cards", rows.len());
    Ok(rows)
}

fn parse_card(card: ElementRef<'_>, date: &str, a_sel: &Selector, base: &Url) -> Option<RawRace> {
    let href = card.select(a_sel).next()?.value().attr("href")?;
    if !href.contains("/races/") {
        return None;
    }

    let lines = text_lines(card);
    let text = lines.join(" ");
    if text.chars().count() < MIN_CARD_TEXT_CHARS || text.contains(PROMO_PHRASE) {
        return None;
    }

    let name = lines.first()?.clone();

    let mut distances: Vec<&str> = Vec::new();
    for m in CARD_DISTANCE_RE.find_iter(&text) {
        if !distances.contains(&m.as_str()) {
            distances.push(m.as_str());
        }
    }

    let capture = |re: &Regex| {
        re.captures(&text)
            .map(|c| c[1].to_string())
            .unwrap_or_default()
    };

    Some(RawRace {
        date: date.to_string(),
        title: name,
        distance: Some(distances.join(", ")),
        location: capture(&CARD_LOCATION_RE),
        organizer: capture(&CARD_ORGANIZER_RE),
        link: absolute_link(base, href),
    })
}

/// Text split into lines. Block elements, `<br>` and newlines end a line;
/// inline markup such as `<b>` stays inside it.
fn text_lines(el: ElementRef<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    push_lines(el, &mut lines, &mut current);
    flush_line(&mut lines, &mut current);
    lines
}

fn push_lines(el: ElementRef<'_>, lines: &mut Vec<String>, current: &mut String) {
    for node in el.children() {
        if let Some(text) = node.value().as_text() {
            let mut parts = text.split('\n');
            if let Some(first) = parts.next() {
                current.push_str(first);
            }
            for part in parts {
                flush_line(lines, current);
                current.push_str(part);
            }
            continue;
        }

        let Some(child) = ElementRef::wrap(node) else { continue };
        match child.value().name() {
            "script" | "style" | "template" | "noscript" | "svg" => {}
            "br" => flush_line(lines, current),
            "p" | "div" | "li" | "ul" | "ol" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
            | "header" | "footer" | "section" | "article" => {
                flush_line(lines, current);
                push_lines(child, lines, current);
                flush_line(lines, current);
            }
            _ => push_lines(child, lines, current),
        }
    }
}

fn flush_line(lines: &mut Vec<String>, current: &mut String) {
    let line = current.split_whitespace().collect::<Vec<_>>().join(" ");
    if !line.is_empty() {
        lines.push(line);
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    const SCHEDULE_HTML: &str = r#"
        <html><body>
        <table>
          <tr><td>날짜</td><td>대회명</td><td>장소</td><td>주최</td></tr>
          <tr>
            <td>3/17<br>(일)</td>
            <td><a href="view.php?no=101">서울마라톤</a><br>풀코스, 10km</td>
            <td>광화문</td>
            <td>서울시 ☎ 02-1234-5678</td>
          </tr>
          <tr>
            <td>04/06</td>
            <td>벚꽃런 5km</td>
          </tr>
          <tr><td colspan="4">광고</td></tr>
        </table>
        </body></html>"#;

    #[test]
    fn test_schedule_table_rows() {
        let rows = parse_schedule_table(SCHEDULE_HTML, &base("http://roadrun.co.kr/schedule/list.php")).unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].date, "3/17(일)");
        assert_eq!(rows[0].title, "서울마라톤풀코스, 10km");
        assert_eq!(rows[0].distance, None);
        assert_eq!(rows[0].location, "광화문");
        assert_eq!(rows[0].organizer, "서울시 ☎ 02-1234-5678");
        assert_eq!(
            rows[0].link.as_deref(),
            Some("http://roadrun.co.kr/schedule/view.php?no=101")
        );
    }

    #[test]
    fn test_schedule_table_tolerates_missing_cells() {
        let rows = parse_schedule_table(SCHEDULE_HTML, &base("http://roadrun.co.kr/schedule/list.php")).unwrap();
        assert_eq!(rows[1].title, "벚꽃런 5km");
        assert_eq!(rows[1].location, "");
        assert_eq!(rows[1].organizer, "");
        assert_eq!(rows[1].link, None);
    }

    #[test]
    fn test_schedule_table_empty_page() {
        let rows = parse_schedule_table("<html><body><p>점검중</p></body></html>", &base("http://roadrun.co.kr/")).unwrap();
        assert!(rows.is_empty());
    }

    const CARDS_HTML: &str = r#"
        <html><body><main>
          <h3>01월 18일 (일)</h3>
          <div class="group">
            <div class="mb-2 flex justify-between items-start">
              <a href="/races/101/">
                <p>2026 대구마라톤</p>
                <p>풀코스 · 10km · 5km · 10km</p>
                <p>지역: 대구 주최: 대구시</p>
              </a>
            </div>
            <div class="mb-2 flex">
              <a href="/races/host/"><p>대회를 주최하시나요? 등록해보세요</p></a>
            </div>
          </div>
          <div class="mb-2 flex">
            <a href="https://gorunning.kr/races/102/">
              <span>한강 나이트런</span>
              <span>하프</span>
            </a>
          </div>
          <div class="mb-2"><a href="/about/">러닝 크루 모집 안내</a></div>
          <h3>1월 25일 (일)</h3>
          <div><div class="mb-2"><a href="/races/103/">x</a></div></div>
          <div><div class="mb-2"><a href="/races/104/"><b>제주 트레일 챌린지</b></a></div></div>
          <h3>공지사항</h3>
          <div><div class="mb-2"><a href="/races/105/">헤더 없는 대회입니다</a></div></div>
        </main></body></html>"#;

    #[test]
    fn test_grouped_cards() {
        let rows = parse_grouped_cards(CARDS_HTML, &base("https://gorunning.kr/races/")).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(names, vec!["2026 대구마라톤", "한강 나이트런", "제주 트레일 챌린지"]);

        let daegu = &rows[0];
        assert_eq!(daegu.date, "01월 18일");
        assert_eq!(daegu.distance.as_deref(), Some("풀코스, 10km, 5km"));
        assert_eq!(daegu.location, "대구");
        assert_eq!(daegu.organizer, "대구시");
        assert_eq!(daegu.link.as_deref(), Some("https://gorunning.kr/races/101/"));

        assert_eq!(rows[1].date, "01월 18일");
        assert_eq!(rows[1].distance.as_deref(), Some("하프"));
        assert_eq!(rows[1].location, "");

        assert_eq!(rows[2].date, "1월 25일");
        assert_eq!(rows[2].distance.as_deref(), Some(""));
    }

    #[test]
    fn test_card_name_keeps_inline_markup() {
        let html = r#"<h3>3월 1일</h3>
            <div class="mb-2"><a href="/races/7/"><p>제10회 <b>대구</b> 국제마라톤</p><p>풀코스</p></a></div>
            <div class="mb-2"><a href="/races/8/">춘천 <em>호반</em> 마라톤<br>하프</a></div>"#;
        let rows = parse_grouped_cards(html, &base("https://gorunning.kr/races/")).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(names, vec!["제10회 대구 국제마라톤", "춘천 호반 마라톤"]);
        assert_eq!(rows[0].distance.as_deref(), Some("풀코스"));
        assert_eq!(rows[1].distance.as_deref(), Some("하프"));
    }

    #[test]
    fn test_nested_card_is_read_once() {
        let html = r#"<h3>3월 1일</h3>
            <div class="mb-2"><div class="mb-2"><a href="/races/9/"><p>경주 벚꽃 마라톤</p><p>10km</p></a></div></div>
            <div><div class="mb-2"><div class="mb-2"><a href="/races/10/"><p>영덕 대게 마라톤</p></a></div></div></div>"#;
        let rows = parse_grouped_cards(html, &base("https://gorunning.kr/races/")).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(names, vec!["경주 벚꽃 마라톤", "영덕 대게 마라톤"]);
    }

    #[test]
    fn test_absolute_link() {
        let b = base("http://roadrun.co.kr/schedule/list.php");
        assert_eq!(absolute_link(&b, "#"), None);
        assert_eq!(absolute_link(&b, "javascript:void(0)"), None);
        assert_eq!(
            absolute_link(&b, "/races/1"),
            Some("http://roadrun.co.kr/races/1".to_string())
        );
    }
}
