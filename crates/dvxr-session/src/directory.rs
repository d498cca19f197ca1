//! Computer discovery and the selection affordances.

use dvxr_api::ServiceClient;
use dvxr_common::error::DvError;
use dvxr_common::models::{AccessToken, ComputerDescriptor};

use crate::platform::DirectoryPanel;
use crate::ui::Affordance;

/// Shown instead of affordances when the account has no computers.
pub const NO_COMPUTERS_NOTICE: &str = "No computers available for this user. Try connecting to a different Desktop Vision account, or connect a streamer app.";

/// Result of one directory fetch. A failed fetch is an empty listing that
/// remembers why.
#[derive(Debug, Default)]
pub struct ComputerListing {
    pub computers: Vec<ComputerDescriptor>,
    pub failure: Option<DvError>,
}

/// Fetch the computers visible to `token`, in server order.
///
/// Never fails; errors become an empty listing and a log line.
pub async fn list_computers(api: &ServiceClient, token: &AccessToken) -> ComputerListing {
    match api.list_computers(token).await {
        Ok(computers) => {
            tracing::info!(uid = %token.uid, count = computers.len(), "Computers listed");
            ComputerListing { computers, failure: None }
        }
        Err(e) => {
            let e = DvError::directory(e);
            tracing::warn!(uid = %token.uid, "Listing computers failed: {e}");
            ComputerListing { computers: Vec::new(), failure: Some(e) }
        }
    }
}

/// Numbers directory requests so only the latest reply is applied, and
/// holds the computer to connect to once that reply is in.
#[derive(Debug, Default)]
pub struct ListingTracker {
    issued: u64,
    connect_to: Option<String>,
}

impl ListingTracker {
    /// Issue a request id. A `connect_to` replaces any pending target; `None`
    /// carries the pending target over to this request.
    pub fn begin(&mut self, connect_to: Option<String>) -> u64 {
        self.issued += 1;
        if connect_to.is_some() {
            self.connect_to = connect_to;
        }
        self.issued
    }

    pub fn is_latest(&self, request: u64) -> bool {
        request == self.issued
    }

    /// Consume the pending connect target.
    pub fn take_connect(&mut self) -> Option<String> {
        self.connect_to.take()
    }

    pub fn connect_pending(&self) -> bool {
        self.connect_to.is_some()
    }
}

/// Find a computer by id. `None` means the selection is stale.
pub fn resolve<'a>(computers: &'a [ComputerDescriptor], id: &str) -> Option<&'a ComputerDescriptor> {
    computers.iter().find(|c| c.id == id)
}

/// What the directory panel should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryView {
    Computers(Vec<Affordance>),
    Empty { notice: &'static str },
}

impl DirectoryView {
    pub fn project(computers: &[ComputerDescriptor]) -> Self {
        if computers.is_empty() {
            return Self::Empty { notice: NO_COMPUTERS_NOTICE };
        }
        Self::Computers(
            computers
                .iter()
                .map(|c| Affordance {
                    computer_id: c.id.clone(),
                    label: format!("Stream {}", c.display_name),
                })
                .collect(),
        )
    }
}

/// Replace the panel contents with the projection of `computers`.
pub fn render(panel: &mut dyn DirectoryPanel, computers: &[ComputerDescriptor]) {
    panel.clear();
    match DirectoryView::project(computers) {
        DirectoryView::Computers(affordances) => {
            for affordance in &affordances {
                panel.add_affordance(affordance);
            }
        }
        DirectoryView::Empty { notice } => panel.add_notice(notice),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{DirectoryItem, FakeDirectoryPanel, PlatformLog};

    fn computer(id: &str, name: &str) -> ComputerDescriptor {
        ComputerDescriptor {
            id: id.into(),
            display_name: name.into(),
            channel_name: format!("ch-{id}"),
        }
    }

    #[test]
    fn unknown_id_is_not_found() {
        let computers = vec![computer("A", "Office")];
        assert!(resolve(&computers, "B").is_none());
        assert_eq!(resolve(&computers, "A").map(|c| c.display_name.as_str()), Some("Office"));
        assert!(resolve(&[], "A").is_none());
    }

    #[test]
    fn only_the_latest_request_is_current() {
        let mut tracker = ListingTracker::default();
        let first = tracker.begin(Some("A".into()));
        let second = tracker.begin(None);

        assert!(!tracker.is_latest(first));
        assert!(tracker.is_latest(second));
        assert_eq!(tracker.take_connect().as_deref(), Some("A"));
        assert!(!tracker.connect_pending());

        tracker.begin(Some("B".into()));
        tracker.begin(Some("C".into()));
        assert_eq!(tracker.take_connect().as_deref(), Some("C"));
    }

    #[test]
    fn no_computers_renders_a_single_notice() {
        let log = PlatformLog::default();
        let mut panel = FakeDirectoryPanel::new(log.clone());

        render(&mut panel, &[]);

        assert_eq!(log.directory(), vec![DirectoryItem::Notice(NO_COMPUTERS_NOTICE.into())]);
    }

    #[test]
    fn rerender_replaces_previous_affordances() {
        let log = PlatformLog::default();
        let mut panel = FakeDirectoryPanel::new(log.clone());
        render(&mut panel, &[computer("old", "Old PC")]);

        render(
            &mut panel,
            &[computer("1", "Home PC"), computer("2", "Laptop"), computer("3", "Studio")],
        );

        let labels: Vec<_> = log
            .directory()
            .into_iter()
            .map(|item| match item {
                DirectoryItem::Affordance(a) => a.label,
                DirectoryItem::Notice(n) => panic!("unexpected notice {n}"),
            })
            .collect();
        assert_eq!(labels, vec!["Stream Home PC", "Stream Laptop", "Stream Studio"]);
    }

    #[test]
    fn projection_keeps_server_order_and_ids() {
        let view = DirectoryView::project(&[computer("b", "B"), computer("a", "A")]);
        let DirectoryView::Computers(affordances) = view else {
            panic!("expected affordances");
        };
        let ids: Vec<_> = affordances.iter().map(|a| a.computer_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }
}
