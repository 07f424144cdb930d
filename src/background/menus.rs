//! Context-menu registration and click mapping

use crate::host::{HostEvent, MenuContext, MenuItem, TabTarget};
use crate::messages::{CaptureKind, CaptureRequest};

pub const MENU_SAVE_PAGE: &str = "novatrek-save-page";
pub const MENU_SAVE_SELECTION: &str = "novatrek-save-selection";
pub const MENU_SAVE_LINK: &str = "novatrek-save-link";
pub const MENU_SAVE_IMAGE: &str = "novatrek-save-image";

/// The four static menu items, one per capture kind.
///
/// Registration is idempotent on the shim side; duplicate-ID errors from
/// repeated install events are tolerated there.
pub fn context_menu_items() -> Vec<MenuItem> {
    vec![
        MenuItem {
            id: MENU_SAVE_PAGE.to_string(),
            title: "Save page to NovaTrek".to_string(),
            contexts: vec![MenuContext::Page],
        },
        MenuItem {
            id: MENU_SAVE_SELECTION.to_string(),
            title: "Save selection to NovaTrek".to_string(),
            contexts: vec![MenuContext::Selection],
        },
        MenuItem {
            id: MENU_SAVE_LINK.to_string(),
            title: "Save link to NovaTrek".to_string(),
            contexts: vec![MenuContext::Link],
        },
        MenuItem {
            id: MENU_SAVE_IMAGE.to_string(),
            title: "Save image to NovaTrek".to_string(),
            contexts: vec![MenuContext::Image],
        },
    ]
}

fn kind_for_menu(menu_id: &str) -> Option<CaptureKind> {
    match menu_id {
        MENU_SAVE_PAGE => Some(CaptureKind::Page),
        MENU_SAVE_SELECTION => Some(CaptureKind::Text),
        MENU_SAVE_LINK => Some(CaptureKind::Link),
        MENU_SAVE_IMAGE => Some(CaptureKind::Image),
        _ => None,
    }
}

/// Map a menu click to a capture request.
///
/// Returns `None` when the click can't be resolved to a tab URL and title;
/// such clicks are dropped without a message.
pub fn capture_for_menu_click(event: &HostEvent) -> Option<CaptureRequest> {
    let HostEvent::MenuClicked {
        menu_id,
        tab,
        selection_text,
        link_url,
        src_url,
    } = event
    else {
        return None;
    };

    let kind = kind_for_menu(menu_id)?;
    let TabTarget {
        url: Some(url),
        title: Some(title),
        ..
    } = tab
    else {
        tracing::debug!("Dropping {menu_id} click without a resolvable tab");
        return None;
    };

    Some(CaptureRequest {
        url: url.clone(),
        title: title.clone(),
        kind,
        selected_text: selection_text.clone(),
        link_url: link_url.clone(),
        image_url: src_url.clone(),
        notes: None,
        tags: None,
        trip_id: None,
    })
}
