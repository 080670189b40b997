//! Wire types for the subset of the Reddit JSON API the bot uses.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub expires_in: Option<u64>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Listing<T> {
    pub data: ListingData<T>,
}

#[derive(Debug, Deserialize)]
pub struct ListingData<T> {
    #[serde(default = "Vec::new")]
    pub children: Vec<Thing<T>>,
}

#[derive(Debug, Deserialize)]
pub struct Thing<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub struct MessageData {
    pub name: String,
    pub author: Option<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmissionData {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub title: String,
}

/// Comment listing entries; `more` placeholders carry none of these fields.
#[derive(Debug, Default, Deserialize)]
pub struct CommentData {
    pub author: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentResponse {
    pub json: CommentJson,
}

#[derive(Debug, Deserialize)]
pub struct CommentJson {
    #[serde(default)]
    pub errors: Vec<Vec<serde_json::Value>>,
    pub data: Option<CommentJsonData>,
}

#[derive(Debug, Deserialize)]
pub struct CommentJsonData {
    #[serde(default = "Vec::new")]
    pub things: Vec<Thing<CreatedComment>>,
}

#[derive(Debug, Deserialize)]
pub struct CreatedComment {
    pub name: String,
}
