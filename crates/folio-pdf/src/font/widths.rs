//! Compression of CID width tables into `/W` array entries

/// One entry of a CIDFont `/W` array
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidthEntry {
    /// `first last width`: every code in the range shares one width
    Range { first: u32, last: u32, width: u16 },
    /// `first [w0 w1 ...]`: consecutive codes starting at `first`
    List { first: u32, widths: Vec<u16> },
}

/// Compress `(code, width)` pairs into `/W` entries
///
/// Consecutive codes sharing a width for two or more codes become a
/// [`WidthEntry::Range`]; the remaining codes of a consecutive run are
/// grouped into [`WidthEntry::List`] entries. Input order does not matter.
///
/// # Example
/// ```ignore
/// let entries = compress_widths(&[(65, 600), (66, 600), (97, 500)]);
/// assert_eq!(format_widths(&entries), "65 66 600 97 [500]");
/// ```
pub fn compress_widths(widths: &[(u32, u16)]) -> Vec<WidthEntry> {
    let mut sorted = widths.to_vec();
    sorted.sort_by_key(|(code, _)| *code);
    sorted.dedup_by_key(|(code, _)| *code);

    let mut entries = Vec::new();
    let mut i = 0;
    while i < sorted.len() {
        let mut run_end = i;
        while run_end + 1 < sorted.len() && sorted[run_end + 1].0 == sorted[run_end].0 + 1 {
            run_end += 1;
        }
        compress_run(&sorted[i..=run_end], &mut entries);
        i = run_end + 1;
    }
    entries
}

/// Compress one run of consecutive codes
fn compress_run(run: &[(u32, u16)], entries: &mut Vec<WidthEntry>) {
    let mut pending: Option<(u32, Vec<u16>)> = None;
    let mut j = 0;
    while j < run.len() {
        let (code, width) = run[j];
        let mut k = j;
        while k + 1 < run.len() && run[k + 1].1 == width {
            k += 1;
        }

        if k > j {
            if let Some((first, widths)) = pending.take() {
                entries.push(WidthEntry::List { first, widths });
            }
            entries.push(WidthEntry::Range {
                first: code,
                last: run[k].0,
                width,
            });
        } else {
            pending.get_or_insert_with(|| (code, Vec::new())).1.push(width);
        }
        j = k + 1;
    }
    if let Some((first, widths)) = pending {
        entries.push(WidthEntry::List { first, widths });
    }
}

/// Expand `/W` entries back into `(code, width)` pairs
pub fn expand_widths(entries: &[WidthEntry]) -> Vec<(u32, u16)> {
    let mut widths = Vec::new();
    for entry in entries {
        match entry {
            WidthEntry::Range { first, last, width } => {
                widths.extend((*first..=*last).map(|code| (code, *width)));
            }
            WidthEntry::List { first, widths: list } => {
                widths.extend(
                    list.iter()
                        .enumerate()
                        .map(|(i, width)| (first + i as u32, *width)),
                );
            }
        }
    }
    widths
}

/// Render entries as the body of a `/W` array
pub fn format_widths(entries: &[WidthEntry]) -> String {
    entries
        .iter()
        .map(|entry| match entry {
            WidthEntry::Range { first, last, width } => format!("{first} {last} {width}"),
            WidthEntry::List { first, widths } => {
                let list: Vec<String> = widths.iter().map(|w| w.to_string()).collect();
                format!("{first} [{}]", list.join(" "))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
