//! Pulls raw attendance counts out of a saved ERP attendance page or a CSV
//! export. Column positions are sniffed from header text, since the portal
//! shuffles them between releases.

use std::path::Path;

use anyhow::Context;

use crate::models::{ComponentRecord, RawData, SubjectRecord};

const CODE_HEADERS: &[&str] = &["course code", "subject code", "code"];
const NAME_HEADERS: &[&str] = &["course name", "subject name", "course", "subject"];
const COMPONENT_HEADERS: &[&str] = &["ltps", "component", "type", "category"];
const CONDUCTED_HEADERS: &[&str] = &["conducted", "held", "total classes", "delivered"];
const ATTENDED_HEADERS: &[&str] = &["attended", "present", "presents"];
const CARRY_HEADERS: &[&str] = &["tcbr", "carry", "carried forward"];

pub fn from_html_file(path: &Path) -> anyhow::Result<RawData> {
    let html = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    from_html(&html)
}

pub fn from_csv_file(path: &Path) -> anyhow::Result<RawData> {
    let reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    from_csv(reader)
}

/// Scans every `<table>` on the page and keeps the first one whose header row
/// carries the attendance columns. Anything else (navigation, layout tables)
/// is passed over.
pub fn from_html(html: &str) -> anyhow::Result<RawData> {
    let mut pos = 0usize;
    while let Some((start, end)) = next_tag_block(html, "<table", "</table>", pos) {
        let table = &html[start..end];
        pos = end;

        let rows = table_rows(table);
        if rows.is_empty() {
            continue;
        }
        let Some(columns) = Columns::sniff(&rows[0]) else {
            continue;
        };

        let mut raw = RawData::new();
        for row in &rows[1..] {
            columns.absorb_row(row, &mut raw);
        }
        return Ok(raw);
    }
    anyhow::bail!("no attendance table found in the page");
}

pub fn from_csv<R: std::io::Read>(mut reader: csv::Reader<R>) -> anyhow::Result<RawData> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        course_code: String,
        course_name: String,
        component: String,
        conducted: u32,
        attended: u32,
        #[serde(default)]
        carry_forward: u32,
    }

    let mut raw = RawData::new();
    for result in reader.deserialize::<CsvRow>() {
        let row = result.context("malformed attendance CSV row")?;
        insert_component(
            &mut raw,
            row.course_code.trim(),
            row.course_name.trim(),
            row.component.trim(),
            ComponentRecord {
                conducted: row.conducted,
                attended: row.attended,
                carry_forward: row.carry_forward,
            },
        );
    }
    Ok(raw)
}

/// Resolved cell positions for one table.
struct Columns {
    code: usize,
    name: Option<usize>,
    component: Option<usize>,
    conducted: usize,
    attended: usize,
    carry: Option<usize>,
}

impl Columns {
    /// A table qualifies only if code, conducted, and attended columns can
    /// all be located; name, component, and carry-forward are optional. The
    /// name lookup skips the code column, since "Subject" would otherwise
    /// match "Subject Code" first.
    fn sniff(headers: &[String]) -> Option<Self> {
        let code = find_column(headers, CODE_HEADERS, &[])?;
        Some(Self {
            code,
            name: find_column(headers, NAME_HEADERS, &[code]),
            component: find_column(headers, COMPONENT_HEADERS, &[code]),
            conducted: find_column(headers, CONDUCTED_HEADERS, &[code])?,
            attended: find_column(headers, ATTENDED_HEADERS, &[code])?,
            carry: find_column(headers, CARRY_HEADERS, &[code]),
        })
    }

    /// One data row into the grouped map. Rows whose numeric cells do not
    /// parse (footers, separators) are dropped silently.
    fn absorb_row(&self, cells: &[String], raw: &mut RawData) {
        let Some(code) = cells.get(self.code).map(|c| c.trim()) else {
            return;
        };
        if code.is_empty() {
            return;
        }
        let (Some(conducted), Some(attended)) = (
            cell_number(cells, self.conducted),
            cell_number(cells, self.attended),
        ) else {
            return;
        };
        let carry = self.carry.and_then(|i| cell_number(cells, i)).unwrap_or(0);

        let name = self
            .name
            .and_then(|i| cells.get(i))
            .map(|s| s.trim())
            .unwrap_or("");
        let label = self
            .component
            .and_then(|i| cells.get(i))
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .unwrap_or("Overall");

        insert_component(
            raw,
            code,
            name,
            label,
            ComponentRecord {
                conducted,
                attended,
                carry_forward: carry,
            },
        );
    }
}

fn insert_component(
    raw: &mut RawData,
    code: &str,
    name: &str,
    label: &str,
    record: ComponentRecord,
) {
    let subject = raw.entry(code.to_string()).or_insert_with(SubjectRecord::default);
    // The portal truncates names in some views; keep the longest variant seen.
    if name.len() > subject.course_name.len() {
        subject.course_name = name.to_string();
    }
    subject.components.insert(label.to_string(), record);
}

/// First header matching any needle, tried in needle priority order so that
/// "course name" beats the looser "course".
fn find_column(headers: &[String], needles: &[&str], exclude: &[usize]) -> Option<usize> {
    let lower: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
    needles.iter().find_map(|needle| {
        lower
            .iter()
            .enumerate()
            .find(|(i, header)| !exclude.contains(i) && header.contains(*needle))
            .map(|(i, _)| i)
    })
}

fn cell_number(cells: &[String], index: usize) -> Option<u32> {
    cells.get(index)?.trim().parse::<u32>().ok()
}

/// All `<tr>` blocks of a table as cleaned cell texts (`<th>` and `<td>`
/// both count, so the header row comes out like any other).
fn table_rows(table: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut pos = 0usize;
    while let Some((start, end)) = next_tag_block(table, "<tr", "</tr>", pos) {
        let tr = &table[start..end];
        pos = end;

        let mut cells = Vec::new();
        let mut cell_pos = 0usize;
        loop {
            let th = next_tag_block(tr, "<th", "</th>", cell_pos);
            let td = next_tag_block(tr, "<td", "</td>", cell_pos);
            let block = match (th, td) {
                (Some(a), Some(b)) => {
                    if a.0 < b.0 {
                        a
                    } else {
                        b
                    }
                }
                (Some(a), None) => a,
                (None, Some(b)) => b,
                (None, None) => break,
            };
            cells.push(inner_text(&tr[block.0..block.1]));
            cell_pos = block.1;
        }
        if !cells.is_empty() {
            rows.push(cells);
        }
    }
    rows
}

/// Case-insensitive search for the next `open...close` block at or after
/// `from`. Returns byte offsets spanning the whole block.
fn next_tag_block(s: &str, open: &str, close: &str, from: usize) -> Option<(usize, usize)> {
    let lc = s.to_ascii_lowercase();
    let start = lc.get(from..)?.find(open)? + from;
    let open_end = s[start..].find('>')? + start + 1;
    let end_rel = lc[open_end..].find(close)?;
    Some((start, open_end + end_rel + close.len()))
}

/// Text content of a tag block: open tag dropped, nested tags stripped,
/// entities and whitespace normalized.
fn inner_text(block: &str) -> String {
    let inner = match (block.find('>'), block.rfind('<')) {
        (Some(open_end), Some(close_start)) if close_start > open_end => {
            &block[open_end + 1..close_start]
        }
        _ => "",
    };
    let mut out = String::with_capacity(inner.len());
    let mut in_tag = false;
    for ch in inner.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    normalize_ws(&out.replace("&nbsp;", " ").replace("&amp;", "&"))
}

fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
        <table class="nav"><tr><td>Home</td><td>Logout</td></tr></table>
        <table class="attendance">
          <tr>
            <th>Course Code</th><th>Course Name</th><th>LTPS</th>
            <th>Conducted</th><th>Attended</th><th>TCBR</th>
          </tr>
          <tr>
            <td>CS2001</td><td>Data Structures</td><td>Lecture</td>
            <td>40</td><td>32</td><td>2</td>
          </tr>
          <tr>
            <td>CS2001</td><td>Data Structures &amp; Algorithms</td><td>Practical</td>
            <td>20</td><td>18</td><td>0</td>
          </tr>
          <tr>
            <td>MA2001</td><td>Linear&nbsp;Algebra</td><td>Lecture</td>
            <td>36</td><td>30</td><td>1</td>
          </tr>
          <tr><td colspan="6">End of records</td></tr>
        </table>
        </body></html>
    "#;

    #[test]
    fn extracts_grouped_components_from_the_page() {
        let raw = from_html(PAGE).unwrap();
        assert_eq!(raw.len(), 2);

        let cs = &raw["CS2001"];
        assert_eq!(cs.components.len(), 2);
        let lecture = &cs.components["Lecture"];
        assert_eq!(lecture.conducted, 40);
        assert_eq!(lecture.attended, 32);
        assert_eq!(lecture.carry_forward, 2);

        let ma = &raw["MA2001"];
        assert_eq!(ma.course_name, "Linear Algebra");
        assert_eq!(ma.components["Lecture"].carry_forward, 1);
    }

    #[test]
    fn longest_course_name_variant_wins() {
        let raw = from_html(PAGE).unwrap();
        assert_eq!(raw["CS2001"].course_name, "Data Structures & Algorithms");
    }

    #[test]
    fn non_numeric_rows_are_dropped() {
        let raw = from_html(PAGE).unwrap();
        assert!(!raw.contains_key("End of records"));
    }

    #[test]
    fn page_without_attendance_table_is_an_error() {
        let err = from_html("<table><tr><td>just layout</td></tr></table>").unwrap_err();
        assert!(err.to_string().contains("no attendance table"));
    }

    #[test]
    fn header_synonyms_are_recognized() {
        let page = r#"
            <table>
              <tr><th>Subject Code</th><th>Subject</th><th>Held</th><th>Present</th></tr>
              <tr><td>PH1001</td><td>Physics</td><td>10</td><td>9</td></tr>
            </table>
        "#;
        let raw = from_html(page).unwrap();
        let ph = &raw["PH1001"];
        assert_eq!(ph.course_name, "Physics");
        // No component column: a single catch-all bucket.
        assert_eq!(ph.components["Overall"].conducted, 10);
        assert_eq!(ph.components["Overall"].carry_forward, 0);
    }

    #[test]
    fn csv_rows_group_by_course_code() {
        let data = "\
course_code,course_name,component,conducted,attended,carry_forward
CS2001,Data Structures,Lecture,40,32,2
CS2001,Data Structures,Practical,20,18,0
MA2001,Linear Algebra,Lecture,36,30,1
";
        let raw = from_csv(csv::Reader::from_reader(data.as_bytes())).unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw["CS2001"].components.len(), 2);
        assert_eq!(raw["MA2001"].components["Lecture"].attended, 30);
    }

    #[test]
    fn malformed_csv_surfaces_an_error() {
        let data = "\
course_code,course_name,component,conducted,attended
CS2001,Data Structures,Lecture,forty,32
";
        assert!(from_csv(csv::Reader::from_reader(data.as_bytes())).is_err());
    }
}
