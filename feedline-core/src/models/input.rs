//! Input DTOs with garde validation for controller commands.
//!
//! These structs validate user-supplied data before anything is signed
//! or sent.

use crate::error::FeedResult;
use garde::Validate;
use serde::Deserialize;

/// Validation constants
const MAX_POST_LENGTH: usize = 10000;
const MAX_USERNAME_LENGTH: usize = 100;
const MAX_AVATAR_URL_LENGTH: usize = 2048;
const MAX_DESCRIPTION_LENGTH: usize = 500;
const MAX_PUBKEY_LENGTH: usize = 4096;

fn validate_not_blank(value: &str, _ctx: &()) -> garde::Result {
    if value.trim().is_empty() {
        return Err(garde::Error::new("must not be blank"));
    }
    Ok(())
}

fn validate_no_control_chars(value: &str, _ctx: &()) -> garde::Result {
    if value.chars().any(|c| c.is_control()) {
        return Err(garde::Error::new("contains invalid characters"));
    }
    Ok(())
}

/// Empty means "no avatar"; otherwise it must be an http(s) URL
fn validate_avatar_url(value: &str, _ctx: &()) -> garde::Result {
    if value.is_empty() {
        return Ok(());
    }
    match url::Url::parse(value) {
        Ok(u) if u.scheme() == "http" || u.scheme() == "https" => Ok(()),
        Ok(_) => Err(garde::Error::new("avatar URL must use http or https")),
        Err(_) => Err(garde::Error::new("avatar URL is not a valid URL")),
    }
}

fn validate_base64_key(value: &str, _ctx: &()) -> garde::Result {
    let valid = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='));
    if !valid {
        return Err(garde::Error::new("public key must be base64"));
    }
    Ok(())
}

/// Text of a new post
#[derive(Debug, Deserialize, Validate)]
#[garde(context(()))]
pub struct PostDraft {
    #[garde(length(min = 1, max = MAX_POST_LENGTH), custom(validate_not_blank))]
    pub body: String,
}

/// Fields published with a profile update
#[derive(Debug, Deserialize, Validate)]
#[garde(context(()))]
pub struct ProfileUpdate {
    #[garde(
        length(min = 1, max = MAX_USERNAME_LENGTH),
        custom(validate_not_blank),
        custom(validate_no_control_chars)
    )]
    pub username: String,
    #[garde(length(max = MAX_AVATAR_URL_LENGTH), custom(validate_avatar_url))]
    pub avatar: String,
    #[garde(length(max = MAX_DESCRIPTION_LENGTH))]
    pub description: String,
}

/// Identity to follow
#[derive(Debug, Deserialize, Validate)]
#[garde(context(()))]
pub struct FollowTarget {
    #[garde(
        length(min = 1, max = MAX_PUBKEY_LENGTH),
        custom(validate_not_blank),
        custom(validate_base64_key)
    )]
    pub pubkey: String,
}

/// Helper trait to turn garde reports into [`crate::FeedError::Validation`]
pub trait ValidateExt {
    fn validate_input(&self) -> FeedResult<()>;
}

impl<T: Validate<Context = ()>> ValidateExt for T {
    fn validate_input(&self) -> FeedResult<()> {
        self.validate()?;
        Ok(())
    }
}
