//! Human-readable rendering of volume listings.

use unicode_width::UnicodeWidthStr;

use btrmount_protocol::VolumeRecord;

const HEADERS: [&str; 5] = ["INSTANCE", "STATE", "MOUNT POINT", "LABEL", "DEVICES"];
const EMPTY_LISTING: &str = "No volumes are mounted.\n";
const UNKNOWN: &str = "-";

/// Renders a listing as an aligned table, one row per volume.
#[must_use]
pub(crate) fn render_listing(records: &[VolumeRecord]) -> String {
    if records.is_empty() {
        return EMPTY_LISTING.to_owned();
    }

    let rows: Vec<[String; 5]> = records.iter().map(row).collect();
    let mut widths = HEADERS.map(UnicodeWidthStr::width);
    for cells in &rows {
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.width());
        }
    }

    let mut output = String::new();
    push_row(&mut output, &HEADERS.map(str::to_owned), &widths);
    for cells in &rows {
        push_row(&mut output, cells, &widths);
    }
    output
}

fn row(record: &VolumeRecord) -> [String; 5] {
    let options = &record.options;
    let mut mount_point = options
        .mount_point
        .clone()
        .unwrap_or_else(|| UNKNOWN.to_owned());
    if let Some(subvolume) = describe_subvolume(options.subvol_name.as_deref(), options.subvol_id)
    {
        mount_point.push_str(&format!(" ({subvolume})"));
    }
    [
        record
            .instance
            .map_or_else(|| UNKNOWN.to_owned(), |instance| instance.to_string()),
        record
            .state
            .map_or_else(|| UNKNOWN.to_owned(), |state| state.to_string()),
        printable(&mount_point),
        record
            .label
            .as_deref()
            .map_or_else(|| UNKNOWN.to_owned(), printable),
        if options.devices.is_empty() {
            UNKNOWN.to_owned()
        } else {
            printable(&options.devices.join(", "))
        },
    ]
}

fn describe_subvolume(name: Option<&str>, id: Option<u64>) -> Option<String> {
    match (name, id) {
        (Some(name), _) => Some(format!("subvol {name}")),
        (None, Some(id)) => Some(format!("subvol id {id}")),
        (None, None) => None,
    }
}

/// Escapes control characters so that a value never breaks the table.
fn printable(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch.is_control() {
            escaped.extend(ch.escape_default());
        } else {
            escaped.push(ch);
        }
    }
    escaped
}

fn push_row(output: &mut String, cells: &[String; 5], widths: &[usize; 5]) {
    let mut line = String::new();
    for (index, (cell, width)) in cells.iter().zip(widths).enumerate() {
        if index > 0 {
            line.push_str("  ");
        }
        line.push_str(cell);
        let padding = width.saturating_sub(cell.width());
        line.extend(std::iter::repeat_n(' ', padding));
    }
    output.push_str(line.trim_end());
    output.push('\n');
}
