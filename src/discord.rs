// Discord OAuth2 (authorization code flow) and member linking

use crate::db::{get_member, get_member_by_discord_id, link_discord_id, Member};
use crate::remote::{check_status, RemoteError};
use anyhow::Result;
use rusqlite::Connection;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

const SERVICE: &str = "discord";
pub const API_BASE: &str = "https://discord.com/api";
pub const SCOPES: [&str; 3] = ["identify", "guilds", "guilds.members.read"];

#[derive(Debug, Clone, Default)]
pub struct DiscordSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub guild_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DiscordGuild {
    pub id: String,
    pub name: String,
}

/// URL the member is sent to. `state` is echoed back by Discord.
pub fn authorize_url(settings: &DiscordSettings, state: &str) -> String {
    format!(
        "{}/oauth2/authorize?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
        API_BASE,
        urlencoding::encode(&settings.client_id),
        urlencoding::encode(&settings.redirect_uri),
        urlencoding::encode(&SCOPES.join(" ")),
        urlencoding::encode(state),
    )
}

pub fn in_guild(guilds: &[DiscordGuild], guild_id: &str) -> bool {
    guilds.iter().any(|g| g.id == guild_id)
}

pub struct DiscordClient {
    settings: DiscordSettings,
    client: reqwest::blocking::Client,
}

impl DiscordClient {
    pub fn new(settings: DiscordSettings, timeout: Duration) -> Result<Self, RemoteError> {
        if settings.client_id.is_empty() {
            return Err(RemoteError::NotConfigured { service: SERVICE, field: "client_id" });
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RemoteError::http(SERVICE))?;
        Ok(DiscordClient { settings, client })
    }

    pub fn authorize_url(&self, state: &str) -> String {
        authorize_url(&self.settings, state)
    }

    /// Token request for an authorization code, sent as a urlencoded form
    pub fn token_request(&self, code: &str) -> Result<reqwest::blocking::Request, RemoteError> {
        if self.settings.client_secret.is_empty() {
            return Err(RemoteError::NotConfigured { service: SERVICE, field: "client_secret" });
        }

        let form = [
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
        ];

        self.client
            .post(format!("{}/oauth2/token", API_BASE))
            .form(&form)
            .build()
            .map_err(RemoteError::http(SERVICE))
    }

    pub fn exchange_code(&self, code: &str) -> Result<TokenResponse, RemoteError> {
        let request = self.token_request(code)?;
        let resp = self.client.execute(request).map_err(RemoteError::http(SERVICE))?;

        check_status(SERVICE, resp)?.json().map_err(RemoteError::http(SERVICE))
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str, token: &str) -> Result<T, RemoteError> {
        let resp = self
            .client
            .get(format!("{}{}", API_BASE, path))
            .bearer_auth(token)
            .send()
            .map_err(RemoteError::http(SERVICE))?;

        check_status(SERVICE, resp)?.json().map_err(RemoteError::http(SERVICE))
    }

    pub fn fetch_user(&self, token: &str) -> Result<DiscordUser, RemoteError> {
        self.get_json("/users/@me", token)
    }

    pub fn fetch_guilds(&self, token: &str) -> Result<Vec<DiscordGuild>, RemoteError> {
        self.get_json("/users/@me/guilds", token)
    }

    /// True when no guild is configured or the user belongs to it
    pub fn is_in_guild(&self, token: &str) -> Result<bool, RemoteError> {
        if self.settings.guild_id.is_empty() {
            return Ok(true);
        }
        Ok(in_guild(&self.fetch_guilds(token)?, &self.settings.guild_id))
    }
}

/// Outcome of a login callback
#[derive(Debug, Clone, PartialEq)]
pub enum LinkOutcome {
    /// A member already carried this Discord id
    AlreadyLinked(Member),
    /// The Discord id was attached to the requested member
    Linked(Member),
    /// The requested member is already linked to another Discord account
    MemberTaken,
    NotInGuild,
    UnknownMember,
}

/// Resolve a Discord user to a member, linking `member_id` when the account
/// is not yet attached to anyone.
pub fn link_member(
    conn: &Connection,
    user: &DiscordUser,
    member_id: Option<&str>,
    in_guild: bool,
) -> Result<LinkOutcome> {
    if !in_guild {
        return Ok(LinkOutcome::NotInGuild);
    }

    if let Some(member) = get_member_by_discord_id(conn, &user.id)? {
        return Ok(LinkOutcome::AlreadyLinked(member));
    }

    let Some(member_id) = member_id else {
        return Ok(LinkOutcome::UnknownMember);
    };

    let Some(member) = get_member(conn, member_id)? else {
        return Ok(LinkOutcome::UnknownMember);
    };
    if member.discord_id.as_deref().is_some_and(|id| !id.is_empty() && id != user.id) {
        warn!(member_id, discord_user = %user.username, "member already linked to another discord account");
        return Ok(LinkOutcome::MemberTaken);
    }

    if !link_discord_id(conn, member_id, &user.id)? {
        return Ok(LinkOutcome::MemberTaken);
    }

    info!(member_id, discord_user = %user.username, "member linked to discord");
    match get_member(conn, member_id)? {
        Some(member) => Ok(LinkOutcome::Linked(member)),
        None => Ok(LinkOutcome::UnknownMember),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{setup_database, upsert_members, Gender};

    fn settings() -> DiscordSettings {
        DiscordSettings {
            client_id: "123".to_string(),
            client_secret: "shh".to_string(),
            redirect_uri: "http://localhost:3000/auth/callback".to_string(),
            guild_id: "999".to_string(),
        }
    }

    fn user(id: &str) -> DiscordUser {
        DiscordUser {
            id: id.to_string(),
            username: "nora".to_string(),
            global_name: None,
            avatar: None,
        }
    }

    #[test]
    fn test_authorize_url_is_encoded() {
        let url = authorize_url(&settings(), "a b");
        assert!(url.starts_with("https://discord.com/api/oauth2/authorize?client_id=123"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fauth%2Fcallback"));
        assert!(url.contains("scope=identify%20guilds%20guilds.members.read"));
        assert!(url.contains("response_type=code"));
        assert!(url.ends_with("state=a%20b"));
    }

    #[test]
    fn test_guild_membership() {
        let guilds: Vec<DiscordGuild> =
            serde_json::from_str(r#"[{"id": "1", "name": "Autre"}, {"id": "999", "name": "Skali", "owner": false}]"#)
                .unwrap();
        assert!(in_guild(&guilds, "999"));
        assert!(!in_guild(&guilds, "2"));
    }

    #[test]
    fn test_token_request_is_form_encoded() {
        let client = DiscordClient::new(settings(), Duration::from_secs(5)).unwrap();
        let request = client.token_request("c0de&x").unwrap();

        assert_eq!(request.url().as_str(), "https://discord.com/api/oauth2/token");
        assert_eq!(
            request.headers()[reqwest::header::CONTENT_TYPE],
            "application/x-www-form-urlencoded"
        );
        let body = std::str::from_utf8(request.body().and_then(|b| b.as_bytes()).unwrap()).unwrap();
        assert!(body.contains("grant_type=authorization_code"));
        assert!(body.contains("code=c0de%26x"));
        assert!(body.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fauth%2Fcallback"));

        let mut no_secret = settings();
        no_secret.client_secret.clear();
        let client = DiscordClient::new(no_secret, Duration::from_secs(5)).unwrap();
        assert!(matches!(
            client.token_request("x").err().unwrap(),
            RemoteError::NotConfigured { field: "client_secret", .. }
        ));
    }

    #[test]
    fn test_client_requires_id() {
        let err = DiscordClient::new(DiscordSettings::default(), Duration::from_secs(5)).err().unwrap();
        assert!(matches!(err, RemoteError::NotConfigured { field: "client_id", .. }));
    }

    #[test]
    fn test_link_member_flow() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        upsert_members(&conn, &[Member::new("m1", "Nora", "Petit", Gender::Female)]).unwrap();

        assert_eq!(link_member(&conn, &user("42"), Some("m1"), false).unwrap(), LinkOutcome::NotInGuild);
        assert_eq!(link_member(&conn, &user("42"), None, true).unwrap(), LinkOutcome::UnknownMember);
        assert_eq!(link_member(&conn, &user("42"), Some("ghost"), true).unwrap(), LinkOutcome::UnknownMember);

        match link_member(&conn, &user("42"), Some("m1"), true).unwrap() {
            LinkOutcome::Linked(m) => assert_eq!(m.discord_id.as_deref(), Some("42")),
            other => panic!("expected linked, got {:?}", other),
        }

        match link_member(&conn, &user("42"), None, true).unwrap() {
            LinkOutcome::AlreadyLinked(m) => assert_eq!(m.id, "m1"),
            other => panic!("expected already linked, got {:?}", other),
        }
    }

    #[test]
    fn test_linked_member_cannot_be_taken_over() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        upsert_members(&conn, &[Member::new("m1", "Nora", "Petit", Gender::Female)]).unwrap();
        assert!(link_discord_id(&conn, "m1", "owner-111").unwrap());

        assert_eq!(
            link_member(&conn, &user("intruder-222"), Some("m1"), true).unwrap(),
            LinkOutcome::MemberTaken
        );

        let member = get_member(&conn, "m1").unwrap().unwrap();
        assert_eq!(member.discord_id.as_deref(), Some("owner-111"));
        assert_eq!(get_member_by_discord_id(&conn, "intruder-222").unwrap(), None);
    }
}
