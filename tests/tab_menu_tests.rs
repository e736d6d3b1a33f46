// Tab selection lives in the location and comes back after a reload.

mod common;

use std::{cell::RefCell, rc::Rc};

use common::{kit_at, kit_with, last, router};
use simkit::core::{runtime::Router, KitConfig, TabMenuBuilder};
use simkit::protocol::Location;

type Log = Rc<RefCell<Vec<String>>>;

/// "/t" with tabs X, Y, Z; every built tab and every change event is logged.
fn tabs_page(built: Log, changed: Log) -> Router {
    router(move |kit, _| {
        let view = kit.open_view("Tabs", Location::new("/t"));
        let mut tabs = TabMenuBuilder::new();
        for name in ["X", "Y", "Z"] {
            let built = Rc::clone(&built);
            tabs = tabs.add_tab(name, move |kit, content| {
                built.borrow_mut().push(name.to_string());
                kit.paragraph(content, format!("tab {name}"));
            });
        }
        let changed = Rc::clone(&changed);
        tabs.on_active_tab_changed(move |_, name| changed.borrow_mut().push(name.to_string()))
            .build_and_append_to(kit, view);
    })
}

#[test]
fn test_tab_x_then_y_then_reload_selects_y() {
    let built: Log = Rc::default();
    let changed: Log = Rc::default();
    let (mut kit, _) = kit_with("/t", KitConfig::default(), tabs_page(built.clone(), changed.clone()));
    assert_eq!(kit.location().to_string(), "/t#X");
    assert_eq!(*built.borrow(), ["X"]);

    let view = kit.current_view().unwrap();
    let menu = kit.tab_menus_in(view)[0];
    kit.select_tab(menu, 1);
    assert_eq!(kit.location().to_string(), "/t#Y");
    assert_eq!(*changed.borrow(), ["X", "Y"]);

    built.borrow_mut().clear();
    kit.reload();
    kit.pump();
    assert_eq!(*built.borrow(), ["Y"]);
    assert_eq!(kit.location().to_string(), "/t#Y");

    let view = kit.current_view().unwrap();
    let menu = kit.tab_menus_in(view)[0];
    assert_eq!(kit.document().tab_menu(menu).unwrap().active, Some(1));
}

#[test]
fn test_switching_tab_replaces_content_without_new_entry() {
    let built: Log = Rc::default();
    let (mut kit, _) = kit_with("/t", KitConfig::default(), tabs_page(built, Rc::default()));
    let view = kit.current_view().unwrap();
    let menu = kit.tab_menus_in(view)[0];
    let content = kit.document().tab_menu(menu).unwrap().content.unwrap();

    kit.select_tab(menu, 2);
    let children = kit.document().children(content).to_vec();
    assert_eq!(children.len(), 1);
    assert_eq!(kit.tab_location(menu, 0).unwrap().to_string(), "/t#X");

    // Still a single entry: back has nowhere to go.
    kit.back();
    assert!(!kit.pump());
    assert_eq!(kit.location().to_string(), "/t#Z");
}

#[test]
fn test_unknown_token_falls_back_to_default() {
    let built: Log = Rc::default();
    let (kit, _) = kit_with("/t#Nope", KitConfig::default(), tabs_page(built.clone(), Rc::default()));
    assert_eq!(*built.borrow(), ["X"]);
    assert_eq!(kit.location().to_string(), "/t#X");
}

#[test]
fn test_nested_menus_restore_both_levels() {
    let (mut kit, transport) = kit_at("/problems#All%20problems#Private");
    assert_eq!(last(&transport).1.url, "/api/problems/visibility=/private");

    let view = kit.current_view().unwrap();
    let menus = kit.tab_menus_in(view);
    assert_eq!(menus.len(), 2);
    kit.select_tab(menus[1], 1);
    assert_eq!(kit.location().to_string(), "/problems#All%20problems#Public");

    kit.reload();
    kit.pump();
    assert_eq!(last(&transport).1.url, "/api/problems/visibility=/public");
    assert_eq!(kit.location().to_string(), "/problems#All%20problems#Public");
}
