use crate::core::Kit;

pub const KEY_BINDINGS: &[(&str, &str)] = &[
    ("Up / Down", "select a row, scroll"),
    ("PgUp / PgDn", "scroll a page"),
    ("Enter", "open the selected row"),
    ("Tab", "focus the next tab menu"),
    ("Left / Right", "switch tab in the focused menu"),
    ("Backspace, Alt+Left", "back"),
    ("Alt+Right", "forward"),
    ("Esc", "close the top modal or floating view"),
    ("r", "retry a failed request"),
    ("a", "abort a slow request"),
    ("f", "toggle log auto-refresh"),
    ("Ctrl+R", "reload"),
    ("?", "this help"),
    ("q", "quit"),
];

/// Plain modal listing the keys. It has no history entry, so Esc drops it
/// without moving back.
pub fn show_help(kit: &mut Kit) {
    let Some(modal) = kit.open_modal("Help") else {
        return;
    };
    kit.heading(modal, "Keys");
    let width = KEY_BINDINGS.iter().map(|(keys, _)| keys.len()).max().unwrap_or(0);
    let text = KEY_BINDINGS
        .iter()
        .map(|(keys, action)| format!("{keys:<width$}  {action}"))
        .collect::<Vec<_>>()
        .join("\n");
    kit.paragraph(modal, text);
}
