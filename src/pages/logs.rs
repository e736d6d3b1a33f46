use strum::IntoEnumIterator;

use crate::core::{Kit, TabMenuBuilder};
use crate::protocol::{api::url_logs, Location, LogStreamKind};

/// One tab per server log. The job server log is shown when the location
/// does not pick one.
pub fn view_logs(kit: &mut Kit) {
    let view = kit.open_view("Logs", Location::new(url_logs()));
    kit.heading(view, "Logs");

    let mut tabs = TabMenuBuilder::new();
    let mut default_tab = 0;
    for (index, kind) in LogStreamKind::iter().enumerate() {
        if kind == LogStreamKind::Jobs {
            default_tab = index;
        }
        tabs = tabs.add_tab(kind.tab_name(), move |kit, content| {
            kit.add_log_stream(content, kind);
        });
    }
    tabs.default_tab(default_tab).build_and_append_to(kit, view);
}
