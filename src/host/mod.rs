//! Host-browser surface: commands the core issues and events the shim reports
//!
//! The browser shim owns the actual tabs, badge, menus and notifications;
//! this module is the typed protocol between it and the coordination core.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::messages::{Request, TabId};
use crate::popup::PopupViewModel;

/// Browser contexts a menu item is shown in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuContext {
    Page,
    Selection,
    Link,
    Image,
}

/// A context-menu item the shim should register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: String,
    pub title: String,
    pub contexts: Vec<MenuContext>,
}

/// Active-tab metadata as reported by the host's tab query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabMetadata {
    pub url: String,
    pub title: String,
}

/// The tab a context-menu click happened in; any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TabTarget {
    pub tab_id: Option<TabId>,
    pub url: Option<String>,
    pub title: Option<String>,
}

/// Popup full-save form fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PopupForm {
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
    pub trip_id: Option<String>,
}

/// Commands sent from the core to the browser shim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HostCommand {
    SetBadge { text: String, color: String },
    Notify { title: String, body: String },
    CloseTab { tab_id: TabId },
    OpenPopup,
    ClosePopup,
    InjectContentScript { tab_id: TabId },
    RegisterContextMenus { items: Vec<MenuItem> },
    ShowQuickSaveButton { tab_id: TabId },
    PopupView { view: PopupViewModel },
}

/// Events reported by the browser shim to the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HostEvent {
    /// Extension installed or updated.
    Installed,
    /// A tab finished a navigation.
    TabCompleted { tab_id: TabId, url: String },
    TabClosed {
        tab_id: TabId,
    },
    /// Content script came up in a page and snapshotted its text.
    PageLoaded {
        tab_id: TabId,
        url: String,
        #[serde(default)]
        text: String,
    },
    /// The auth-callback token element appeared in a page.
    AuthElement {
        tab_id: TabId,
        token: String,
        user_id: String,
    },
    /// An in-page `postMessage` was observed.
    PageMessage {
        tab_id: TabId,
        payload: serde_json::Value,
    },
    /// A custom DOM event was observed.
    PageEvent {
        tab_id: TabId,
        name: String,
        #[serde(default)]
        detail: serde_json::Value,
    },
    MenuClicked {
        menu_id: String,
        #[serde(default)]
        tab: TabTarget,
        #[serde(default)]
        selection_text: Option<String>,
        #[serde(default)]
        link_url: Option<String>,
        #[serde(default)]
        src_url: Option<String>,
    },
    /// The floating quick-save button was clicked.
    QuickSaveClicked {
        tab_id: TabId,
        url: String,
        title: String,
    },
    PopupOpened {
        #[serde(default)]
        tab: Option<TabMetadata>,
    },
    PopupVisibility {
        visible: bool,
    },
    PopupSubmit {
        form: PopupForm,
    },
    PopupQuickSave,
    PopupLogout,
    /// Raw RPC from a page or popup script.
    Message {
        #[serde(default)]
        tab_id: Option<TabId>,
        request: Request,
    },
}

/// Command channel to the browser shim.
#[async_trait]
pub trait HostShell: Send + Sync {
    async fn dispatch(&self, command: HostCommand) -> anyhow::Result<()>;
}
