//! End-to-end orchestration against the fake service and an in-memory platform.

mod support;

use dvxr_client::Orchestrator;
use dvxr_session::Applied;
use dvxr_session::platform::{AdapterKind, MediaStream, VideoSource};
use dvxr_session::testing::{self, DirectoryItem, FakeTransport, FakeXr, PlatformLog};
use dvxr_session::ui::Affordance;
use serde_json::{Value, json};

use support::{FakeService, Fault, within};

fn token() -> Value {
    json!({ "uid": "u1", "access_token": "tok", "expires_in": 3600 })
}

fn home_pc() -> Value {
    json!([{ "id": "42", "computerName": "Home PC", "channel_name": "ch1" }])
}

struct Client {
    orchestrator: Orchestrator,
    log: PlatformLog,
    transport: FakeTransport,
}

fn client(service: &FakeService, transport: FakeTransport, href: &str) -> Client {
    let log = PlatformLog::default();
    let platform = testing::platform(&log, &transport, &FakeXr::available(), href);
    let orchestrator = Orchestrator::new(service.config(), platform).unwrap();
    Client { orchestrator, log, transport }
}

/// Exchange the code carried by the page URL.
async fn sign_in(c: &mut Client) {
    c.orchestrator.exchange_token().unwrap();
    assert_eq!(within(c.orchestrator.next_event()).await, Some(Applied::Authenticated));
}

#[tokio::test]
async fn popup_login_to_live_surface() {
    let service = FakeService::start("abc", token(), home_pc()).await;
    let mut c = client(&service, FakeTransport::auto(), "https://app.example/xr");
    assert!(c.log.buttons().unwrap().request_code);

    c.orchestrator.request_authorization_code().unwrap();
    assert_eq!(c.log.popups().len(), 1);
    assert!(
        c.orchestrator
            .handshake()
            .deliver_json(&json!({ "code": "abc", "computerId": "42" }))
    );
    assert_eq!(within(c.orchestrator.next_event()).await, Some(Applied::Authorized));
    assert!(c.log.buttons().unwrap().exchange_token);
    assert_eq!(c.log.closed_windows(), vec![true]);

    sign_in(&mut c).await;
    let token = c.orchestrator.state().auth.access_token.clone().unwrap();
    assert_eq!(token.uid, "u1");
    assert_eq!(token.access_token, "tok");
    assert_eq!(token.extra.get("expires_in"), Some(&json!(3600)));
    assert!(c.log.buttons().unwrap().connect_selected);

    c.orchestrator.connect_selected().unwrap();
    let Some(Applied::Listed { count: 1, connecting: Some(session) }) =
        within(c.orchestrator.next_event()).await
    else {
        panic!("expected the listing to start a connection");
    };
    let Some(Applied::SurfaceBuilt(status)) = within(c.orchestrator.next_event()).await else {
        panic!("expected a surface");
    };

    assert_eq!(service.connects(), vec![json!({ "channel_name": "ch1" })]);
    assert_eq!(c.transport.room_options()[0].as_value(), &json!({ "room": "ch1" }));
    assert_eq!(status.session, Some(session));
    assert_eq!(status.source, VideoSource::Stream(MediaStream { id: "stream-ch1".into() }));
    for kind in [AdapterKind::Keyboard, AdapterKind::Pointer, AdapterKind::Touch, AdapterKind::Xr] {
        assert_eq!(c.log.listeners(kind), vec![status.node], "{kind} listeners");
    }
    assert_eq!(
        c.log.directory(),
        vec![DirectoryItem::Affordance(Affordance {
            computer_id: "42".into(),
            label: "Stream Home PC".into(),
        })]
    );
}

#[tokio::test]
async fn superseded_connection_never_reaches_the_scene() {
    let computers = json!([
        { "id": "1", "computerName": "Office", "channel_name": "ch-1" },
        { "id": "2", "computerName": "Studio", "channel_name": "ch-2" },
    ]);
    let service = FakeService::start("abc", token(), computers).await;
    let mut c = client(&service, FakeTransport::gated(), "https://app.example/?code=abc");
    sign_in(&mut c).await;

    c.orchestrator.fetch_computers().unwrap();
    assert_eq!(
        within(c.orchestrator.next_event()).await,
        Some(Applied::Listed { count: 2, connecting: None })
    );

    let first = c.orchestrator.connect("1").unwrap();
    let second = c.orchestrator.connect("2").unwrap();
    let opened = within(c.transport.wait_for_opened(2)).await;
    let by_room = |room: &str| {
        opened
            .iter()
            .find(|conn| conn.options().as_value()["room"] == room)
            .cloned()
            .unwrap()
    };

    by_room("ch-1").release("office");
    assert_eq!(
        within(c.orchestrator.next_event()).await,
        Some(Applied::StaleDiscarded { session: first })
    );
    assert!(by_room("ch-1").is_closed());
    assert!(c.log.scene_nodes().is_empty());

    by_room("ch-2").release("studio");
    let Some(Applied::SurfaceBuilt(status)) = within(c.orchestrator.next_event()).await else {
        panic!("expected a surface");
    };
    assert_eq!(status.session, Some(second));
    assert_eq!(status.source, VideoSource::Stream(MediaStream { id: "studio".into() }));
    assert_eq!(c.log.listeners(AdapterKind::Pointer), vec![status.node]);
    assert!(c.log.disposed().is_empty());
}

#[tokio::test]
async fn rejected_code_is_still_scrubbed() {
    let service = FakeService::start("abc", token(), home_pc()).await;
    let mut c = client(
        &service,
        FakeTransport::auto(),
        "https://app.example/?oauth=desktopvision&code=wrong&computer_id=42",
    );

    c.orchestrator.exchange_token().unwrap();
    assert_eq!(within(c.orchestrator.next_event()).await, Some(Applied::AuthFailed));

    assert_eq!(service.exchanges(), vec!["wrong"]);
    assert!(c.orchestrator.state().auth.authorization_code.is_none());
    assert!(c.orchestrator.state().auth.access_token.is_none());
    assert_eq!(c.log.location().unwrap().as_str(), "https://app.example/");
    assert!(c.log.buttons().unwrap().request_code);
    assert_eq!(c.log.notices()[0].code, "AUTH_FAILURE");
}

#[tokio::test]
async fn empty_directory_shows_one_notice() {
    let service = FakeService::start("abc", token(), json!([])).await;
    let mut c = client(&service, FakeTransport::auto(), "https://app.example/?code=abc");
    sign_in(&mut c).await;

    c.orchestrator.fetch_computers().unwrap();
    assert_eq!(
        within(c.orchestrator.next_event()).await,
        Some(Applied::Listed { count: 0, connecting: None })
    );

    let directory = c.log.directory();
    assert_eq!(directory.len(), 1);
    assert!(matches!(&directory[0], DirectoryItem::Notice(text) if text.starts_with("No computers available")));
}

#[tokio::test]
async fn stale_deep_link_selection_is_reported() {
    let service = FakeService::start("abc", token(), home_pc()).await;
    let mut c = client(&service, FakeTransport::auto(), "https://app.example/?code=abc&computer_id=99");
    sign_in(&mut c).await;

    c.orchestrator.connect_selected().unwrap();
    assert_eq!(
        within(c.orchestrator.next_event()).await,
        Some(Applied::Listed { count: 1, connecting: None })
    );

    assert_eq!(c.log.notices().last().unwrap().code, "COMPUTER_NOT_FOUND");
    assert!(service.connects().is_empty());
    assert!(c.transport.opened().is_empty());
}

#[tokio::test]
async fn refused_negotiation_never_opens_a_transport() {
    let service = FakeService::start_faulty("abc", token(), home_pc(), Fault::Connect).await;
    let mut c = client(&service, FakeTransport::auto(), "https://app.example/?code=abc&computer_id=42");
    sign_in(&mut c).await;

    c.orchestrator.connect_selected().unwrap();
    let Some(Applied::Listed { count: 1, connecting: Some(session) }) =
        within(c.orchestrator.next_event()).await
    else {
        panic!("expected the listing to start a connection");
    };
    assert_eq!(
        within(c.orchestrator.next_event()).await,
        Some(Applied::ConnectFailed { session })
    );

    assert_eq!(service.connects().len(), 1);
    assert!(c.transport.opened().is_empty());
    assert!(c.log.scene_nodes().is_empty());
    assert_eq!(c.log.notices().last().unwrap().code, "NEGOTIATION_FAILURE");
    assert!(c.orchestrator.state().current.is_none());
}

#[tokio::test]
async fn failed_directory_shows_empty_panel_and_skips_connect() {
    let service = FakeService::start_faulty("abc", token(), home_pc(), Fault::Directory).await;
    let mut c = client(&service, FakeTransport::auto(), "https://app.example/?code=abc&computer_id=42");
    sign_in(&mut c).await;

    c.orchestrator.connect_selected().unwrap();
    assert_eq!(
        within(c.orchestrator.next_event()).await,
        Some(Applied::Listed { count: 0, connecting: None })
    );

    let directory = c.log.directory();
    assert_eq!(directory.len(), 1);
    assert!(matches!(&directory[0], DirectoryItem::Notice(_)));
    assert_eq!(c.log.notices().last().unwrap().code, "DIRECTORY_FAILURE");
    assert!(service.connects().is_empty());
    assert!(c.transport.opened().is_empty());
}
