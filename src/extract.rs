//! Field extraction from a rendered operator page

use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

use crate::error::ScrapeError;
use crate::types::{ComplaintLevel, PageStats};

/// Element that only exists once the complaint widget has rendered
pub const LANDMARK_SELECTOR: &str = ".social";

static LANDMARK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(LANDMARK_SELECTOR).expect("valid landmark selector"));
static HISTOGRAMS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.histograms").expect("valid histogram selector"));
static REGION_NAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("label").expect("valid region name selector"));
static REGION_SHARE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.region").expect("valid region share selector"));

/// Keywords per level, highest priority first. The site is Russian; the
/// English forms cover translated pages.
const LEVEL_KEYWORDS: &[(ComplaintLevel, &[&str])] = &[
    (ComplaintLevel::High, &["много", "much"]),
    (ComplaintLevel::Moderate, &["умеренно", "moderate"]),
    (ComplaintLevel::Low, &["мало", "little"]),
];

const DAY_MARKERS: &[&str] = &["сутк", "day"];
const HOUR_MARKERS: &[&str] = &["час", "hour"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CountKind {
    Hourly,
    Daily,
}

/// Parse a complaint counter, treating anything unparseable as 0
pub fn parse_count(text: &str) -> u32 {
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    digits.parse().unwrap_or(0)
}

/// Classify the complaint level from the widget text. First match wins.
pub fn classify_level(text: &str) -> ComplaintLevel {
    let lower = text.to_lowercase();
    LEVEL_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(level, _)| *level)
        .unwrap_or(ComplaintLevel::Unknown)
}

/// Collapse runs of whitespace and trim
fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(element: ElementRef<'_>) -> String {
    normalize_text(&element.text().collect::<String>())
}

/// Positions in `lower` where a count marker starts a word
fn marker_hits(lower: &str) -> Vec<(usize, CountKind)> {
    let mut hits = Vec::new();
    for (markers, kind) in [(DAY_MARKERS, CountKind::Daily), (HOUR_MARKERS, CountKind::Hourly)] {
        for marker in markers {
            for (pos, _) in lower.match_indices(*marker) {
                // "сейчас" and "today" are not labels
                let starts_word = lower[..pos]
                    .chars()
                    .next_back()
                    .map_or(true, |c| !c.is_alphabetic());
                if starts_word {
                    hits.push((pos, kind));
                }
            }
        }
    }
    hits
}

/// Count kind named in `label`, taking the marker closest to the number:
/// the last one when the label precedes it, the first when it follows.
fn count_kind(label: &str, precedes: bool) -> Option<CountKind> {
    let hits = marker_hits(&label.to_lowercase());
    let nearest = if precedes {
        hits.iter().max_by_key(|(pos, _)| *pos)
    } else {
        hits.iter().min_by_key(|(pos, _)| *pos)
    };
    nearest.map(|(_, kind)| *kind)
}

/// Split the widget at its `<em>` elements into the text around them and
/// their contents. There is always one more segment than there are counts.
fn split_at_counts(landmark: ElementRef<'_>) -> (Vec<String>, Vec<String>) {
    let mut segments = Vec::new();
    let mut counts = Vec::new();
    let mut segment = String::new();

    for node in landmark.descendants() {
        if let Some(element) = ElementRef::wrap(node) {
            if element.value().name() == "em" {
                segments.push(std::mem::take(&mut segment));
                counts.push(element_text(element));
            }
        } else if let Some(text) = node.value().as_text() {
            let inside_em = node
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(|a| a.value().name() == "em");
            if !inside_em {
                segment.push_str(text);
            }
        }
    }
    segments.push(segment);

    (segments, counts)
}

/// Read (hourly, daily) counts from the widget.
///
/// Counts are bound to their labels ("за час <em>", "<em> за сутки") when
/// both kinds are found. Labels are taken to lead their numbers if the text
/// before the first `<em>` names a kind, and to follow them otherwise.
/// Without both labels the first `<em>` is hourly and the second daily,
/// which is how the page has historically been laid out.
pub fn extract_counts(landmark: ElementRef<'_>) -> (u32, u32) {
    let (segments, counts) = split_at_counts(landmark);
    let leading = count_kind(&segments[0], true).is_some();

    let kinds: Vec<Option<CountKind>> = (0..counts.len())
        .map(|i| {
            if leading {
                count_kind(&segments[i], true)
            } else {
                count_kind(&segments[i + 1], false)
            }
        })
        .collect();
    let find = |kind: CountKind| {
        kinds
            .iter()
            .position(|k| *k == Some(kind))
            .map(|i| counts[i].as_str())
    };

    if let (Some(hourly), Some(daily)) = (find(CountKind::Hourly), find(CountKind::Daily)) {
        return (parse_count(hourly), parse_count(daily));
    }

    let hourly = counts.first().map(|t| parse_count(t)).unwrap_or(0);
    let daily = counts.get(1).map(|t| parse_count(t)).unwrap_or(0);
    (hourly, daily)
}

/// Read the optional region histogram as "name percentage" lines.
/// A page without the panel simply has no regions.
pub fn extract_regions(document: &Html) -> Vec<String> {
    let Some(panel) = document.select(&HISTOGRAMS).next() else {
        return Vec::new();
    };

    let names: Vec<String> = panel.select(&REGION_NAME).map(element_text).collect();
    let shares: Vec<String> = panel.select(&REGION_SHARE).map(element_text).collect();

    names
        .iter()
        .zip(shares.iter())
        .map(|(name, share)| format!("{} {}", name, share))
        .collect()
}

/// Extract all fields from a rendered operator page
pub fn parse_page(html: &str) -> Result<PageStats, ScrapeError> {
    let document = Html::parse_document(html);

    let landmark = document
        .select(&LANDMARK)
        .next()
        .ok_or_else(|| ScrapeError::MissingLandmark {
            selector: LANDMARK_SELECTOR.to_string(),
        })?;

    let (hourly_complaints, daily_complaints) = extract_counts(landmark);
    let complaint_level = classify_level(&landmark.text().collect::<String>());
    let regions = extract_regions(&document);

    Ok(PageStats {
        hourly_complaints,
        daily_complaints,
        complaint_level,
        regions,
    })
}
