// src/services/cred_holder.rs
//! Hand-off to a credential holder application.
//!
//! User data is stored at a user-data holder first; the holder app is then
//! opened with the verifier's proposal URL and the id of the stored data.

use chrono::Utc;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum HolderError {
    #[error("user data holder request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("user data holder bad save response, status {status}: {body}")]
    BadStatus { status: u16, body: String },
    #[error("user data holder save response body is not correct")]
    BadBody,
    #[error("user data must be a JSON object with subject.id.type and subject.id.key")]
    BadUserData,
}

#[derive(Deserialize)]
struct SavedData {
    id: String,
}

/// Result of [`CredHolder::start_verification`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    /// URL to open the holder app at
    pub open_url: Url,
    /// Session tag stored with the user data
    pub client_session: String,
}

pub struct CredHolder {
    credential_holder_url: Url,
    user_data_holder_url: Url,
    client: Client,
}

impl CredHolder {
    pub fn new(credential_holder_url: Url, user_data_holder_url: Url) -> Self {
        Self {
            credential_holder_url,
            user_data_holder_url,
            client: Client::new(),
        }
    }

    /// Stores `data` tagged with a fresh client session and builds the
    /// holder URL.
    ///
    /// # Arguments
    /// * `proposal_url` - Verifier proposal the holder app should load
    /// * `data` - User data, at least `{ "subject": { "id": { "type", "key" } } }`
    ///
    /// # Returns
    /// The holder URL with `proposalURL` and `sdid` query parameters, and
    /// the client session that was attached to the stored data
    pub async fn start_verification(
        &self,
        proposal_url: &Url,
        data: Value,
    ) -> Result<Verification, HolderError> {
        let mut data = match data {
            Value::Object(map) if has_subject_id(&map) => map,
            _ => return Err(HolderError::BadUserData),
        };
        let client_session = format!("{}-{}", Uuid::new_v4(), Utc::now().timestamp_millis());
        data.insert("clientSession".into(), Value::String(client_session.clone()));

        let secret_id = self.save_data(&Value::Object(data)).await?;
        debug!("user data stored for client session {}", client_session);

        let mut open_url = self.credential_holder_url.clone();
        open_url
            .query_pairs_mut()
            .append_pair("proposalURL", proposal_url.as_str())
            .append_pair("sdid", &secret_id);
        Ok(Verification {
            open_url,
            client_session,
        })
    }

    async fn save_data(&self, data: &Value) -> Result<String, HolderError> {
        let response = self
            .client
            .post(self.user_data_holder_url.clone())
            .json(data)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HolderError::BadStatus {
                status: status.as_u16(),
                body,
            });
        }
        let saved: SavedData = response.json().await.map_err(|_| HolderError::BadBody)?;
        Ok(saved.id)
    }
}

fn has_subject_id(data: &Map<String, Value>) -> bool {
    let id = data.get("subject").and_then(|subject| subject.get("id"));
    ["type", "key"]
        .iter()
        .all(|field| id.and_then(|id| id.get(*field)).is_some_and(Value::is_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_data() -> Value {
        json!({
            "subject": { "id": { "type": "ethereum:address", "key": "0x5bd3a1e95c3d5b362fa9bbbbd541aa93f38ec3c0" } },
            "redirectURL": "https://verifier.test/done"
        })
    }

    #[tokio::test]
    async fn test_start_verification() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/user-data")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::PartialJson(json!({
                "subject": { "id": { "type": "ethereum:address" } }
            })))
            .with_status(200)
            .with_body(r#"{"id":"secret-42"}"#)
            .create_async()
            .await;

        let holder = CredHolder::new(
            Url::parse("https://holder.test/open").unwrap(),
            Url::parse(&format!("{}/user-data", server.url())).unwrap(),
        );
        let proposal = Url::parse("https://verifier.test/proposal?id=7").unwrap();
        let verification = holder.start_verification(&proposal, user_data()).await.unwrap();

        let query: Vec<(String, String)> = verification
            .open_url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            query,
            vec![
                ("proposalURL".to_string(), proposal.to_string()),
                ("sdid".to_string(), "secret-42".to_string())
            ]
        );
        let (uuid, millis) = verification.client_session.rsplit_once('-').unwrap();
        assert!(Uuid::parse_str(uuid).is_ok());
        assert!(millis.parse::<i64>().is_ok());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_bad_holder_responses() {
        let mut server = mockito::Server::new_async().await;
        let _mock1 = server
            .mock("POST", "/fails")
            .with_status(503)
            .with_body("down")
            .create_async()
            .await;
        let _mock2 = server
            .mock("POST", "/garbage")
            .with_status(200)
            .with_body(r#"{"secret":"x"}"#)
            .create_async()
            .await;

        let proposal = Url::parse("https://verifier.test/proposal").unwrap();
        let holder_at = |path: &str| {
            CredHolder::new(
                Url::parse("https://holder.test/").unwrap(),
                Url::parse(&format!("{}{}", server.url(), path)).unwrap(),
            )
        };

        let err = holder_at("/fails").start_verification(&proposal, user_data()).await.unwrap_err();
        assert!(matches!(err, HolderError::BadStatus { status: 503, .. }));

        let err = holder_at("/garbage").start_verification(&proposal, user_data()).await.unwrap_err();
        assert!(matches!(err, HolderError::BadBody));

        let err = holder_at("/garbage")
            .start_verification(&proposal, json!({ "subject": {} }))
            .await
            .unwrap_err();
        assert!(matches!(err, HolderError::BadUserData));
    }
}
