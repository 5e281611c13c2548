/// Create an OSC8 hyperlink for terminal output
pub fn osc8_link(url: &str, text: &str) -> String {
    format!("\x1b]8;;{}\x1b\\{}\x1b]8;;\x1b\\", url, text)
}

/// Current local time as written into the header row
pub fn snapshot_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M").to_string()
}
