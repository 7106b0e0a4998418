use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use reqwest::header::ACCEPT;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::{
    catalog::NameCatalog,
    document::PlayerDocument,
    error::{ConnectionError, Error, Result},
    player::Player,
    util::get_error,
};

pub const URL: &str = "https://api.clashofclans.com";
pub const API_VERSION: &str = "v1";

const TOKEN_VAR: &str = "COC_API_TOKEN";
const BASE_URL_VAR: &str = "COC_API_BASE_URL";

/// Base URL used when none is given to the builder. `COC_API_BASE_URL`
/// overrides it, e.g. to go through a local proxy.
pub fn base_url() -> String {
    if let Ok(env) = std::env::var(BASE_URL_VAR) {
        return env;
    }
    URL.to_string()
}

pub fn get_token() -> Result<String> {
    std::env::var(TOKEN_VAR).map_err(|_| Error::TokenNotFound(TOKEN_VAR.to_string()))
}

/// Performs the actual HTTP round-trip. Holds the credentials.
struct Endpoint {
    client: reqwest::blocking::Client,
    token: String,
    base_url: Url,
    api_version: String,
}

impl Endpoint {
    fn player_url(&self, tag: &str) -> std::result::Result<Url, ConnectionError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ConnectionError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend([self.api_version.as_str(), "players", tag]);
        Ok(url)
    }

    fn fetch(&self, tag: &str) -> Result<PlayerDocument> {
        let url = self.player_url(tag)?;
        debug!(%url, "fetching player");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .bearer_auth(&self.token)
            .send()
            .map_err(ConnectionError::from)?;
        let status = response.status();
        let text = response.text().map_err(ConnectionError::from)?;
        debug!(%status, tag, "player endpoint responded");

        if !(status.is_success() || status.is_redirection()) {
            let err = match serde_json::from_str::<Value>(&text) {
                Ok(body) => {
                    let (reason, message) = get_error(&body);
                    ConnectionError::Status {
                        status,
                        reason: reason.unwrap_or_default(),
                        message: message.unwrap_or_default(),
                    }
                }
                Err(_) => ConnectionError::Status {
                    status,
                    reason: status.canonical_reason().unwrap_or_default().to_string(),
                    message: text,
                },
            };
            warn!(%status, tag, "player request rejected: {err}");
            return Err(err.into());
        }

        let value: Value = serde_json::from_str(&text).map_err(ConnectionError::from)?;
        PlayerDocument::from_value(value)
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("token", &"<redacted>")
            .field("base_url", &self.base_url.as_str())
            .field("api_version", &self.api_version)
            .finish()
    }
}

/// The stored result of the last successful fetch.
#[derive(Debug)]
struct Snapshot {
    tag: String,
    player: Player,
    fetched_at: DateTime<Utc>,
}

/// Client bound to one player at a time.
///
/// The current player can be read from any thread while another one changes
/// the tag; readers keep whatever [`Player`] they already hold and the new
/// document is swapped in only once it has been fetched.
///
/// ```no_run
/// use coc_players::{CocClient, NameCatalog};
///
/// # fn main() -> coc_players::Result<()> {
/// let catalog = NameCatalog::from_json(r#"{"troops": ["Barbarian", "Wizard"]}"#).unwrap();
/// let client = CocClient::builder("<token>", "#ABC123").catalog(catalog).build()?;
///
/// let player = client.player();
/// println!("{} has barbarians at level {}", player.name()?, player.troop_level("Barbarian")?);
///
/// client.set_player_tag("#XYZ789")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CocClient {
    endpoint: Endpoint,
    catalog: Arc<NameCatalog>,
    current: RwLock<Arc<Snapshot>>,
    refresh_lock: Mutex<()>,
}

impl CocClient {
    /// Fetches `player_tag` with `token` against the default base URL and an
    /// empty catalog.
    pub fn new(token: impl Into<String>, player_tag: impl Into<String>) -> Result<Self> {
        Self::builder(token, player_tag).build()
    }

    /// Like [`CocClient::new`], with the token taken from `COC_API_TOKEN`.
    pub fn from_env(player_tag: impl Into<String>) -> Result<Self> {
        Self::new(get_token()?, player_tag)
    }

    pub fn builder(token: impl Into<String>, player_tag: impl Into<String>) -> ClientBuilder {
        ClientBuilder {
            token: token.into(),
            player_tag: player_tag.into(),
            base_url: None,
            api_version: API_VERSION.to_string(),
            catalog: NameCatalog::default(),
            client: None,
        }
    }

    /// Fetches a player document without touching the stored one.
    pub fn fetch(&self, tag: &str) -> Result<PlayerDocument> {
        self.endpoint.fetch(tag)
    }

    /// Switches to another player. On failure the previous player stays in
    /// place.
    pub fn set_player_tag(&self, tag: impl Into<String>) -> Result<()> {
        let tag = tag.into();
        let _guard = self.refresh_lock.lock();
        let document = self.endpoint.fetch(&tag)?;
        self.replace(tag, document);
        Ok(())
    }

    /// Fetches the current player again.
    pub fn refresh(&self) -> Result<()> {
        let _guard = self.refresh_lock.lock();
        let tag = self.current.read().tag.clone();
        let document = self.endpoint.fetch(&tag)?;
        self.replace(tag, document);
        Ok(())
    }

    pub fn player(&self) -> Player {
        self.current.read().player.clone()
    }

    pub fn player_tag(&self) -> String {
        self.current.read().tag.clone()
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.current.read().fetched_at
    }

    pub fn catalog(&self) -> &NameCatalog {
        &self.catalog
    }

    fn replace(&self, tag: String, document: PlayerDocument) {
        let snapshot = Snapshot {
            tag,
            player: Player::new(document, self.catalog.clone()),
            fetched_at: Utc::now(),
        };
        debug!(tag = %snapshot.tag, "stored new player document");
        *self.current.write() = Arc::new(snapshot);
    }
}

pub struct ClientBuilder {
    token: String,
    player_tag: String,
    base_url: Option<String>,
    api_version: String,
    catalog: NameCatalog,
    client: Option<reqwest::blocking::Client>,
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("token", &"<redacted>")
            .field("player_tag", &self.player_tag)
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("catalog", &self.catalog)
            .finish()
    }
}

impl ClientBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn catalog(mut self, catalog: NameCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn http_client(mut self, client: reqwest::blocking::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Builds the client and fetches the initial player.
    pub fn build(self) -> Result<CocClient> {
        let base_url = self.base_url.unwrap_or_else(base_url);
        let base_url = Url::parse(&base_url).map_err(ConnectionError::from)?;
        let client = match self.client {
            Some(client) => client,
            None => reqwest::blocking::Client::builder()
                .build()
                .map_err(ConnectionError::from)?,
        };
        let endpoint = Endpoint {
            client,
            token: self.token,
            base_url,
            api_version: self.api_version,
        };

        let document = endpoint.fetch(&self.player_tag)?;
        let catalog = Arc::new(self.catalog);
        let snapshot = Snapshot {
            tag: self.player_tag,
            player: Player::new(document, catalog.clone()),
            fetched_at: Utc::now(),
        };

        Ok(CocClient {
            endpoint,
            catalog,
            current: RwLock::new(Arc::new(snapshot)),
            refresh_lock: Mutex::new(()),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::{Read, Write},
        net::{TcpListener, TcpStream},
        sync::mpsc,
        thread,
    };

    use super::*;
    use crate::catalog::Category;

    const ASH: &str = r##"{"name":"Ash","tag":"#ABC123","expLevel":150,"troops":[{"name":"Barbarian","level":8,"maxLevel":9,"village":"home"}]}"##;
    const ASH_WITH_CLAN: &str = r##"{"name":"Ash","tag":"#ABC123","expLevel":150,"trophies":4000,"clan":{"tag":"#CLAN","name":"Ashes","clanLevel":3,"badgeUrls":{"small":"s","medium":"m","large":"l"}}}"##;
    const BOB: &str = r##"{"name":"Bob","tag":"#BOB","expLevel":20}"##;
    const NOT_FOUND: &str = r#"{"reason":"notFound","message":"Player not found"}"#;

    /// Serves one canned response per connection and reports each request
    /// head back to the test.
    struct TestServer {
        base_url: String,
        requests: mpsc::Receiver<String>,
    }

    impl TestServer {
        fn start(responses: Vec<(u16, &'static str)>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let base_url = format!("http://{}", listener.local_addr().unwrap());
            let (tx, requests) = mpsc::channel();
            thread::spawn(move || {
                for (status, body) in responses {
                    let (mut stream, _) = listener.accept().unwrap();
                    let _ = tx.send(read_head(&mut stream));
                    let response = format!(
                        "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(response.as_bytes());
                }
            });
            Self { base_url, requests }
        }

        fn next_request(&self) -> String {
            self.requests.recv().unwrap()
        }
    }

    fn read_head(stream: &mut TcpStream) -> String {
        let mut head = Vec::new();
        let mut chunk = [0; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            head.extend_from_slice(&chunk[..n]);
        }
        String::from_utf8_lossy(&head).into_owned()
    }

    fn header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
        head.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }

    fn catalog() -> NameCatalog {
        NameCatalog::new().with_names(Category::Troop, ["Barbarian", "Wizard"])
    }

    fn local_http() -> reqwest::blocking::Client {
        reqwest::blocking::Client::builder().no_proxy().build().unwrap()
    }

    fn connect(server: &TestServer, tag: &str) -> Result<CocClient> {
        CocClient::builder("T", tag)
            .base_url(&server.base_url)
            .http_client(local_http())
            .catalog(catalog())
            .build()
    }

    #[test]
    fn sends_encoded_tag_and_auth_headers() {
        let server = TestServer::start(vec![(200, ASH)]);
        connect(&server, "#ABC123").unwrap();

        let head = server.next_request();
        assert!(head.starts_with("GET /v1/players/%23ABC123 HTTP/1.1\r\n"), "{head}");
        assert_eq!(header(&head, "authorization"), Some("Bearer T"));
        assert_eq!(header(&head, "accept"), Some("application/json"));
    }

    #[test]
    fn end_to_end_lookup() {
        let server = TestServer::start(vec![(200, ASH)]);
        let client = connect(&server, "#ABC123").unwrap();
        let player = client.player();

        assert_eq!(player.name().unwrap(), "Ash");
        assert_eq!(player.troop_level("Barbarian").unwrap(), 8);
        assert!(matches!(
            player.troop_level("Wizard").unwrap_err(),
            Error::ItemNotUnlocked { ref name, ref player, .. } if name == "Wizard" && player == "Ash"
        ));
        assert!(matches!(
            player.troop_level("Wizzard").unwrap_err(),
            Error::IllegalName { ref name, .. } if name == "Wizzard"
        ));
    }

    #[test]
    fn fetch_preserves_body() {
        let server = TestServer::start(vec![(200, ASH), (200, ASH_WITH_CLAN)]);
        let client = connect(&server, "#ABC123").unwrap();

        let document = client.fetch("#ABC123").unwrap();
        let expected: Value = serde_json::from_str(ASH_WITH_CLAN).unwrap();
        assert_eq!(Value::Object(document.into_inner()), expected);
        // The stored player is untouched by a plain fetch.
        assert!(client.player().clan().unwrap().is_none());
    }

    #[test]
    fn error_status_carries_reason_and_message() {
        let server = TestServer::start(vec![(404, NOT_FOUND)]);
        let err = connect(&server, "#NOPE").unwrap_err();
        match err {
            Error::Connection(ConnectionError::Status {
                status,
                reason,
                message,
            }) => {
                assert_eq!(status.as_u16(), 404);
                assert_eq!(reason, "notFound");
                assert_eq!(message, "Player not found");
            }
            err => panic!("unexpected error: {err}"),
        }
    }

    #[test]
    fn error_body_that_is_not_json() {
        let server = TestServer::start(vec![(503, "upstream down")]);
        match connect(&server, "#ABC123").unwrap_err() {
            Error::Connection(ConnectionError::Status {
                status,
                reason,
                message,
            }) => {
                assert_eq!(status.as_u16(), 503);
                assert_eq!(reason, "Service Unavailable");
                assert_eq!(message, "upstream down");
            }
            err => panic!("unexpected error: {err}"),
        }
    }

    #[test]
    fn redirection_statuses_count_as_success() {
        let server = TestServer::start(vec![(300, ASH), (399, BOB)]);
        let client = connect(&server, "#ABC123").unwrap();
        assert_eq!(client.player().name().unwrap(), "Ash");

        client.set_player_tag("#BOB").unwrap();
        assert_eq!(client.player().name().unwrap(), "Bob");
    }

    #[test]
    fn first_client_error_status_fails() {
        let server = TestServer::start(vec![(
            400,
            r#"{"reason":"badRequest","message":"Invalid tag"}"#,
        )]);
        match connect(&server, "ABC").unwrap_err() {
            Error::Connection(ConnectionError::Status { status, reason, .. }) => {
                assert_eq!(status.as_u16(), 400);
                assert_eq!(reason, "badRequest");
            }
            err => panic!("unexpected error: {err}"),
        }
    }

    #[test]
    fn undecodable_success_body() {
        let server = TestServer::start(vec![(200, "<html>")]);
        assert!(matches!(
            connect(&server, "#ABC123").unwrap_err(),
            Error::Connection(ConnectionError::Json(_))
        ));
    }

    #[test]
    fn success_body_missing_required_fields() {
        let server = TestServer::start(vec![(200, r#"{"name":"Ash"}"#)]);
        assert!(matches!(
            connect(&server, "#ABC123").unwrap_err(),
            Error::DocumentShape { .. }
        ));
    }

    #[test]
    fn transport_failure() {
        let addr = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let err = CocClient::builder("T", "#ABC123")
            .base_url(format!("http://{addr}"))
            .http_client(local_http())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Connection(ConnectionError::Http(_))));
    }

    #[test]
    fn malformed_base_url() {
        let err = CocClient::builder("T", "#ABC123")
            .base_url("not a url")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Connection(ConnectionError::Url(_))));
    }

    #[test]
    fn base_url_without_path_segments() {
        let err = CocClient::builder("T", "#ABC123")
            .base_url("mailto:someone@example.com")
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Connection(ConnectionError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn set_player_tag_replaces_document() {
        let server = TestServer::start(vec![(200, ASH_WITH_CLAN), (200, ASH), (200, BOB)]);
        let client = connect(&server, "#ABC123").unwrap();
        server.next_request();

        client.set_player_tag("#ABC123").unwrap();
        client.set_player_tag("#BOB").unwrap();
        assert!(server.next_request().starts_with("GET /v1/players/%23ABC123 "));
        assert!(server.next_request().starts_with("GET /v1/players/%23BOB "));

        let player = client.player();
        assert_eq!(client.player_tag(), "#BOB");
        assert_eq!(player.name().unwrap(), "Bob");
        assert!(player.clan().unwrap().is_none());
        assert!(player.trophies().is_err());
        assert!(player.document().get("troops").is_none());
    }

    #[test]
    fn failed_set_player_tag_keeps_previous_player() {
        let server = TestServer::start(vec![(200, ASH), (404, NOT_FOUND)]);
        let client = connect(&server, "#ABC123").unwrap();
        let fetched_at = client.fetched_at();

        let err = client.set_player_tag("#NOPE").unwrap_err();
        assert!(matches!(err, Error::Connection(ConnectionError::Status { .. })));
        assert_eq!(client.player_tag(), "#ABC123");
        assert_eq!(client.player().name().unwrap(), "Ash");
        assert_eq!(client.fetched_at(), fetched_at);
    }

    #[test]
    fn held_snapshot_survives_swap() {
        let server = TestServer::start(vec![(200, ASH), (200, BOB)]);
        let client = connect(&server, "#ABC123").unwrap();
        let before = client.player();

        client.set_player_tag("#BOB").unwrap();
        assert_eq!(before.name().unwrap(), "Ash");
        assert_eq!(client.player().name().unwrap(), "Bob");
    }

    #[test]
    fn readers_never_see_a_mixed_document() {
        let server = TestServer::start(vec![(200, ASH), (200, BOB)]);
        let client = connect(&server, "#ABC123").unwrap();

        thread::scope(|scope| {
            let reader = scope.spawn(|| {
                for _ in 0..1000 {
                    let player = client.player();
                    match player.name().unwrap() {
                        "Ash" => assert_eq!(player.exp_level().unwrap(), 150),
                        "Bob" => assert_eq!(player.exp_level().unwrap(), 20),
                        name => panic!("unexpected player {name}"),
                    }
                }
            });
            client.set_player_tag("#BOB").unwrap();
            reader.join().unwrap();
        });
        assert_eq!(client.player().name().unwrap(), "Bob");
    }

    #[test]
    fn refresh_refetches_current_tag() {
        let server = TestServer::start(vec![(200, ASH), (200, ASH_WITH_CLAN)]);
        let client = connect(&server, "#ABC123").unwrap();
        client.refresh().unwrap();

        server.next_request();
        assert!(server.next_request().starts_with("GET /v1/players/%23ABC123 "));
        assert_eq!(client.player().trophies().unwrap(), 4000);
    }

    #[test]
    fn base_url_path_prefix_is_kept() {
        let server = TestServer::start(vec![(200, ASH)]);
        CocClient::builder("T", "#ABC123")
            .base_url(format!("{}/proxy/", server.base_url))
            .http_client(local_http())
            .api_version("v2")
            .build()
            .unwrap();
        assert!(
            server
                .next_request()
                .starts_with("GET /proxy/v2/players/%23ABC123 ")
        );
    }

    #[test]
    fn debug_output_hides_token() {
        let server = TestServer::start(vec![(200, ASH)]);
        let client = CocClient::builder("secret-token", "#ABC123")
            .base_url(&server.base_url)
            .http_client(local_http())
            .build()
            .unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("<redacted>"));
    }
}
